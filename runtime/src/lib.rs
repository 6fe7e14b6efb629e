//! # Admission Runtime
//!
//! Concurrency-safe execution of admission decisions.
//!
//! `admission-core` decides; this crate makes those decisions safe under concurrent
//! gate traffic. Every scan and cancellation of a ticket runs its read-decide-write
//! sequence while holding that ticket's lock, and commits with a version-checked write.
//!
//! ## Core Components
//!
//! - **[`ScanCoordinator`]**: entry point for `attempt_scan` and `cancel_ticket`
//! - **[`locks::TicketLocks`]**: sharded per-ticket async locks with a timeout
//! - **[`retry`]**: jittered exponential backoff for lost conditional writes
//! - **[`BroadcastPublisher`]**: post-commit notifications over a broadcast channel
//! - **[`metrics`]**: Prometheus counters and histograms
//!
//! ## Example
//!
//! ```
//! use admission_core::environment::SystemClock;
//! use admission_core::notify::NoopPublisher;
//! use admission_core::types::{EventDay, TerminalId, TicketId, TicketType};
//! use admission_core::TicketTypeRegistry;
//! use admission_runtime::{AdmissionEnvironment, CoordinatorConfig, ScanCoordinator};
//! use admission_testing::{InMemoryAuditLog, InMemoryTicketStore, fixtures};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryTicketStore::new();
//! store.insert(fixtures::ticket("T-1", TicketType::TwoDay));
//!
//! let env = AdmissionEnvironment::new(
//!     Arc::new(store),
//!     Arc::new(TicketTypeRegistry::builtin()),
//!     Arc::new(InMemoryAuditLog::new()),
//!     Arc::new(NoopPublisher),
//!     Arc::new(SystemClock),
//! );
//! let coordinator = ScanCoordinator::new(env, &CoordinatorConfig::default());
//!
//! let gate = TerminalId::new("north-1");
//! let id = TicketId::new("T-1");
//! let first = coordinator.attempt_scan(&id, EventDay::Day1, &gate).await?;
//! let second = coordinator.attempt_scan(&id, EventDay::Day1, &gate).await?;
//! assert!(first.is_valid());
//! assert_eq!(second.code(), "ALREADY_SCANNED");
//! # Ok::<(), admission_runtime::AdmissionError>(())
//! # });
//! ```

/// Request and response shapes for terminals and the admin console
pub mod api;

/// Coordinator configuration from the environment
pub mod config;

/// Scan coordinator
pub mod coordinator;

/// Per-ticket async locks
pub mod locks;

/// Prometheus metrics for observability
pub mod metrics;

/// Broadcast notification publisher
pub mod publisher;

/// Retry logic with exponential backoff
pub mod retry;

pub use api::{
    CancelErrorCode, CancelRequest, CancelResponse, ReasonCode, ScanRequest, ScanResponse,
};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::{AdmissionEnvironment, AdmissionError, CancelError, ScanCoordinator};
pub use publisher::BroadcastPublisher;
