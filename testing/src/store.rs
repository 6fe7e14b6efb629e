//! In-memory ticket store with fault injection.

use admission_core::store::{StoreError, StoreFuture, TicketStore, Version, VersionedTicket};
use admission_core::types::{Ticket, TicketId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct Faults {
    fail_loads: AtomicUsize,
    fail_writes: AtomicUsize,
    conflicting_writes: AtomicUsize,
    load_delay: RwLock<Option<Duration>>,
}

/// Take one pending fault, if any.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// `HashMap`-backed [`TicketStore`] for tests and single-process deployments.
///
/// Conditional writes are atomic under the internal write lock. Faults can be queued
/// to exercise the coordinator's failure paths:
///
/// - [`fail_next_loads`](Self::fail_next_loads) / [`fail_next_writes`](Self::fail_next_writes):
///   return `Unavailable` without touching state
/// - [`conflict_next_writes`](Self::conflict_next_writes): simulate a writer in another
///   process by bumping the stored version and rejecting the write
/// - [`set_load_delay`](Self::set_load_delay): make loads slow
///
/// # Example
///
/// ```
/// use admission_testing::{fixtures, InMemoryTicketStore};
/// use admission_core::types::TicketType;
///
/// let store = InMemoryTicketStore::new();
/// store.insert(fixtures::ticket("T-1", TicketType::TwoDay));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryTicketStore {
    records: Arc<RwLock<HashMap<TicketId, (Ticket, Version)>>>,
    faults: Arc<Faults>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ticket at [`Version::INITIAL`], replacing any existing record.
    pub fn insert(&self, ticket: Ticket) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticket.ticket_id().clone(), (ticket, Version::INITIAL));
    }

    /// Current state of a ticket.
    #[must_use]
    pub fn get(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ticket_id)
            .map(|(ticket, _)| ticket.clone())
    }

    /// Current version of a ticket.
    #[must_use]
    pub fn version(&self, ticket_id: &TicketId) -> Option<Version> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ticket_id)
            .map(|(_, version)| *version)
    }

    /// Whether a record exists.
    #[must_use]
    pub fn contains(&self, ticket_id: &TicketId) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ticket_id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful conditional writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the next `n` loads with `Unavailable`.
    pub fn fail_next_loads(&self, n: usize) {
        self.faults.fail_loads.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes with `Unavailable`.
    pub fn fail_next_writes(&self, n: usize) {
        self.faults.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Reject the next `n` writes as if another process had written first.
    pub fn conflict_next_writes(&self, n: usize) {
        self.faults.conflicting_writes.store(n, Ordering::SeqCst);
    }

    /// Delay every load by `delay` (`None` to clear).
    pub fn set_load_delay(&self, delay: Option<Duration>) {
        *self
            .faults
            .load_delay
            .write()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    fn write(&self, ticket: Ticket, expected: Version) -> Result<Version, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let ticket_id = ticket.ticket_id().clone();
        let Some((stored, version)) = records.get_mut(&ticket_id) else {
            return Err(StoreError::NotFound(ticket_id));
        };

        if take(&self.faults.conflicting_writes) {
            *version = version.next();
        }

        if *version != expected {
            return Err(StoreError::ConcurrencyConflict {
                ticket_id,
                expected,
                actual: *version,
            });
        }

        *stored = ticket;
        *version = version.next();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(*version)
    }
}

impl TicketStore for InMemoryTicketStore {
    fn load<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Option<VersionedTicket>> {
        Box::pin(async move {
            let delay = *self
                .faults
                .load_delay
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if take(&self.faults.fail_loads) {
                return Err(StoreError::Unavailable("injected load failure".to_string()));
            }

            Ok(self
                .records
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(ticket_id)
                .map(|(ticket, version)| VersionedTicket {
                    ticket: ticket.clone(),
                    version: *version,
                }))
        })
    }

    fn compare_and_swap(&self, ticket: Ticket, expected: Version) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            if take(&self.faults.fail_writes) {
                return Err(StoreError::Unavailable("injected write failure".to_string()));
            }
            self.write(ticket, expected)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::fixtures;
    use admission_core::types::TicketType;

    #[tokio::test]
    async fn load_returns_none_for_unknown_ticket() {
        let store = InMemoryTicketStore::new();
        let id = TicketId::new("missing");
        assert!(store.load(&id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn compare_and_swap_checks_version() {
        let store = InMemoryTicketStore::new();
        let ticket = fixtures::ticket("T-1", TicketType::TwoDay);
        store.insert(ticket.clone());

        let v1 = store.compare_and_swap(ticket.clone(), Version::INITIAL).await.unwrap();
        assert_eq!(v1, Version::new(1));

        let stale = store.compare_and_swap(ticket, Version::INITIAL).await.unwrap_err();
        assert!(stale.is_conflict());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn injected_faults_are_consumed_once() {
        let store = InMemoryTicketStore::new();
        let ticket = fixtures::ticket("T-2", TicketType::SingleDay);
        store.insert(ticket.clone());

        store.fail_next_writes(1);
        assert!(matches!(
            store.compare_and_swap(ticket.clone(), Version::INITIAL).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.compare_and_swap(ticket, Version::INITIAL).await.is_ok());
    }

    #[tokio::test]
    async fn injected_conflict_bumps_version() {
        let store = InMemoryTicketStore::new();
        let ticket = fixtures::ticket("T-3", TicketType::SingleDay);
        store.insert(ticket.clone());

        store.conflict_next_writes(1);
        let err = store.compare_and_swap(ticket.clone(), Version::INITIAL).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.version(ticket.ticket_id()), Some(Version::new(1)));
        assert!(store.compare_and_swap(ticket, Version::new(1)).await.is_ok());
    }

    #[tokio::test]
    async fn write_to_missing_record_is_not_found() {
        let store = InMemoryTicketStore::new();
        let ticket = fixtures::ticket("ghost", TicketType::SingleDay);
        let err = store.compare_and_swap(ticket, Version::INITIAL).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.is_empty());
    }
}
