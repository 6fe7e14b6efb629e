//! # Admission Core
//!
//! Domain types and decision logic for ticket admission control.
//!
//! This crate is the functional core of the engine. Everything here is either a plain
//! value or a pure function; I/O lives behind the collaborator traits and is driven by
//! the coordinator in `admission-runtime`.
//!
//! ## Core Concepts
//!
//! - **Ticket**: an admission credential with an append-only scan history
//! - **Registry**: the read-only policy (allowed days, admission cap) per ticket type
//! - **Decision**: the pure verdict of [`validation::decide`]
//! - **Lifecycle**: `ACTIVE → CANCELLED`, with "used" derived from the scan history
//! - **Collaborators**: [`store::TicketStore`], [`audit::AuditLog`],
//!   [`notify::EventPublisher`], [`environment::Clock`]
//!
//! ## Example
//!
//! ```
//! use admission_core::registry::TicketTypeRegistry;
//! use admission_core::types::{EventDay, Ticket, TicketId, TicketType};
//! use admission_core::validation::{DenialReason, decide};
//! use chrono::Utc;
//!
//! let registry = TicketTypeRegistry::builtin();
//! let policy = registry.policy_for(TicketType::SingleDay).unwrap();
//! let ticket = Ticket::issue(TicketId::new("T-1"), TicketType::SingleDay, policy, Utc::now());
//!
//! assert!(decide(Some(&ticket), EventDay::Day2).is_valid());
//! assert_eq!(
//!     decide(Some(&ticket), EventDay::Day1).denial_reason(),
//!     Some(DenialReason::NotValidForDay)
//! );
//! ```

pub mod audit;
pub mod lifecycle;
pub mod notify;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use registry::{RegistryError, TicketTypeConfig, TicketTypeRegistry};
pub use types::{
    ActorId, EventDay, InvalidTicket, ScanEvent, TerminalId, Ticket, TicketId, TicketStatus,
    TicketType,
};
pub use validation::{Decision, DenialReason, decide};

/// Environment module - injected dependencies that are not collaborators in their own
/// right.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use admission_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
