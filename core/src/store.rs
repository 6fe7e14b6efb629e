//! Ticket store trait: the durable, keyed persistence collaborator.
//!
//! The store is an abstract key-value store keyed by [`TicketId`] that supports atomic
//! conditional writes. Every record carries a [`Version`]; a write succeeds only if the
//! caller presents the version it loaded. This is what lets several coordinator
//! processes share one store without lost updates.
//!
//! # Implementations
//!
//! - `InMemoryTicketStore` (in `admission-testing`): fast, deterministic, with fault
//!   injection for tests
//!
//! # Example
//!
//! ```no_run
//! use admission_core::store::{StoreError, TicketStore};
//! use admission_core::types::TicketId;
//!
//! async fn example<S: TicketStore>(store: &S) -> Result<(), StoreError> {
//!     let id = TicketId::new("T-123");
//!     if let Some(record) = store.load(&id).await? {
//!         let ticket = record.ticket;
//!         // ... mutate ...
//!         store.compare_and_swap(ticket, record.version).await?;
//!     }
//!     Ok(())
//! }
//! ```

use crate::types::{Ticket, TicketId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Record version for optimistic concurrency control.
///
/// A freshly inserted record is at [`Version::INITIAL`]; every successful
/// conditional write moves it to [`Version::next`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a record that has never been rewritten.
    pub const INITIAL: Self = Self(0);

    /// Create a version with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after one more write.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticket together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedTicket {
    /// Ticket state
    pub ticket: Ticket,
    /// Version to present on the next conditional write
    pub version: Version,
}

/// Errors from the ticket store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional write lost: the record changed since it was loaded.
    #[error("Concurrency conflict on ticket {ticket_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Ticket whose write was rejected
        ticket_id: TicketId,
        /// Version presented by the writer
        expected: Version,
        /// Version currently stored
        actual: Version,
    },

    /// Conditional write against a record that does not exist.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// Backend unavailable or the operation failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this is a lost conditional write.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable ticket persistence.
///
/// Implementations must be `Send + Sync`. Methods return boxed futures so the trait
/// stays dyn-compatible (`Arc<dyn TicketStore>`).
pub trait TicketStore: Send + Sync {
    /// Load a ticket and its current version. Absent tickets are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: backend failure
    /// - `Serialization`: stored record could not be decoded
    fn load<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Option<VersionedTicket>>;

    /// Replace a ticket if its stored version still equals `expected`.
    ///
    /// Returns the new version. The write is atomic: a subsequent `load` sees either
    /// the whole new record or the old one.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: the stored version differs from `expected`
    /// - `NotFound`: no record exists for this ticket
    /// - `Unavailable`: backend failure (the write did not take effect)
    fn compare_and_swap(&self, ticket: Ticket, expected: Version) -> StoreFuture<'_, Version>;
}
