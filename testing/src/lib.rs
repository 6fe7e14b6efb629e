//! # Admission Testing
//!
//! Testing utilities for the admission engine.
//!
//! This crate provides:
//! - In-memory collaborators ([`InMemoryTicketStore`], [`InMemoryAuditLog`],
//!   [`RecordingPublisher`]) with fault injection
//! - A fixed clock for deterministic timestamps
//! - Ticket fixtures built from the built-in policies
//! - proptest strategies for domain values
//!
//! ## Example
//!
//! ```
//! use admission_testing::{InMemoryTicketStore, fixtures, test_clock};
//! use admission_core::environment::Clock;
//! use admission_core::types::TicketType;
//!
//! let store = InMemoryTicketStore::new();
//! store.insert(fixtures::ticket("T-1", TicketType::FullPass));
//! assert_eq!(test_clock().now(), test_clock().now());
//! ```

pub mod audit;
pub mod store;

use chrono::{DateTime, Utc};
use admission_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use admission_testing::mocks::FixedClock;
    /// use admission_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Ticket fixtures.
pub mod fixtures {
    use super::mocks::test_clock;
    use admission_core::environment::Clock;
    use admission_core::registry::{TicketTypeConfig, TicketTypeRegistry};
    use admission_core::types::{EventDay, Ticket, TicketId, TicketType};

    /// Issue an `ACTIVE` ticket with the built-in policy for `ticket_type`.
    ///
    /// Every built-in type is registered, so the fallback policy is never used; it
    /// exists only to keep this helper infallible.
    #[must_use]
    pub fn ticket(ticket_id: &str, ticket_type: TicketType) -> Ticket {
        let registry = TicketTypeRegistry::builtin();
        let fallback = TicketTypeConfig::new(Vec::<EventDay>::new(), 0);
        let policy = registry.policy_for(ticket_type).unwrap_or(&fallback);
        Ticket::issue(TicketId::new(ticket_id), ticket_type, policy, test_clock().now())
    }

    /// Issue an `ACTIVE` ticket with an explicit policy.
    #[must_use]
    pub fn ticket_with_policy(
        ticket_id: &str,
        ticket_type: TicketType,
        policy: &TicketTypeConfig,
    ) -> Ticket {
        Ticket::issue(TicketId::new(ticket_id), ticket_type, policy, test_clock().now())
    }
}

/// Property-based testing strategies.
pub mod properties {
    use admission_core::types::{EventDay, TicketType};
    use proptest::prelude::*;

    /// Any admission day.
    pub fn event_day() -> impl Strategy<Value = EventDay> {
        prop::sample::select(EventDay::ALL.to_vec())
    }

    /// Any ticket type.
    pub fn ticket_type() -> impl Strategy<Value = TicketType> {
        prop::sample::select(TicketType::ALL.to_vec())
    }

    /// A sequence of scan attempts.
    pub fn scan_days(max_len: usize) -> impl Strategy<Value = Vec<EventDay>> {
        prop::collection::vec(event_day(), 0..=max_len)
    }
}

/// Install a `tracing` subscriber for test output (idempotent).
///
/// Honours `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use audit::{InMemoryAuditLog, RecordingPublisher};
pub use mocks::{FixedClock, test_clock};
pub use store::InMemoryTicketStore;
