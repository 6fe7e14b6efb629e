//! Per-ticket exclusivity.
//!
//! [`TicketLocks`] hands out one async mutex per ticket id, so the read-decide-write
//! sequence for a ticket is serialized while different tickets never contend. The table
//! is split into shards to keep the bookkeeping lock short, and entries are held weakly:
//! once nobody holds or waits for a ticket's mutex it is reclaimed.
//!
//! Acquisition is bounded by a timeout. The returned [`TicketGuard`] releases the mutex
//! when dropped, on every exit path.

use admission_core::types::TicketId;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Minimum shard size before dead entries are swept.
const SWEEP_FLOOR: usize = 64;

/// Errors from lock acquisition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The ticket stayed locked for longer than the configured timeout.
    #[error("Timed out after {waited:?} waiting for exclusive access to ticket {ticket_id}")]
    Timeout {
        /// Contended ticket
        ticket_id: TicketId,
        /// How long the caller waited
        waited: Duration,
    },
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<TicketId, Weak<AsyncMutex<()>>>,
    sweep_at: usize,
}

impl Shard {
    fn handle(&mut self, ticket_id: &TicketId) -> Arc<AsyncMutex<()>> {
        if let Some(existing) = self.entries.get(ticket_id).and_then(Weak::upgrade) {
            return existing;
        }

        if self.entries.len() >= self.sweep_at.max(SWEEP_FLOOR) {
            self.entries.retain(|_, lock| lock.strong_count() > 0);
            self.sweep_at = self.entries.len() * 2;
        }

        let lock = Arc::new(AsyncMutex::new(()));
        self.entries.insert(ticket_id.clone(), Arc::downgrade(&lock));
        lock
    }

    fn live(&self) -> usize {
        self.entries
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}

/// Sharded table of per-ticket async mutexes.
#[derive(Debug)]
pub struct TicketLocks {
    shards: Box<[Mutex<Shard>]>,
    timeout: Duration,
}

impl TicketLocks {
    /// Create a table with `shards` shards (at least one) and an acquisition timeout.
    #[must_use]
    pub fn new(shards: usize, timeout: Duration) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(Shard::default())).collect();
        Self { shards, timeout }
    }

    /// Acquire exclusive access to `ticket_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if the ticket is still held by another caller
    /// when the timeout elapses.
    pub async fn acquire(&self, ticket_id: &TicketId) -> Result<TicketGuard, LockError> {
        let lock = self.handle(ticket_id);
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(
                    ticket_id = %ticket_id,
                    waited_us = started.elapsed().as_micros(),
                    "Acquired ticket lock"
                );
                Ok(TicketGuard {
                    _guard: guard,
                    ticket_id: ticket_id.clone(),
                    acquired_at: Instant::now(),
                })
            }
            Err(_) => Err(LockError::Timeout {
                ticket_id: ticket_id.clone(),
                waited: started.elapsed(),
            }),
        }
    }

    /// Number of tickets currently held or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).live())
            .sum()
    }

    fn handle(&self, ticket_id: &TicketId) -> Arc<AsyncMutex<()>> {
        let mut hasher = DefaultHasher::new();
        ticket_id.hash(&mut hasher);
        let len = self.shards.len() as u64;
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() % len) as usize;

        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle(ticket_id)
    }
}

/// Exclusive access to one ticket. Released on drop.
#[derive(Debug)]
pub struct TicketGuard {
    _guard: OwnedMutexGuard<()>,
    ticket_id: TicketId,
    acquired_at: Instant,
}

impl TicketGuard {
    /// Ticket this guard protects.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        crate::metrics::record_lock_hold(self.acquired_at.elapsed());
    }
}
