//! In-memory audit sink and recording publisher.

use admission_core::audit::{AuditAction, AuditEntry, AuditError, AuditLog};
use admission_core::notify::{AdmissionEvent, EventPublisher, PublishError};
use admission_core::types::TicketId;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Audit sink that keeps every entry in memory.
///
/// Call [`set_failing`](Self::set_failing) to make every append fail, or
/// [`set_stalled`](Self::set_stalled) to make appends never complete. Both let tests
/// check that audit outages never change a decision.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
    failing: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl InMemoryAuditLog {
    /// Create an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make appends fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make appends hang forever (`true`) or behave normally (`false`).
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Snapshot of every recorded entry, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries concerning one ticket.
    #[must_use]
    pub fn entries_for(&self, ticket_id: &TicketId) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| &entry.ticket_id == ticket_id)
            .collect()
    }

    /// Number of entries with the given action.
    #[must_use]
    pub fn count(&self, action: AuditAction) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(
        &self,
        entry: AuditEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + '_>> {
        Box::pin(async move {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(AuditError::Unavailable("injected audit failure".to_string()));
            }
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry);
            Ok(())
        })
    }
}

/// Publisher that records events for later assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<AdmissionEvent>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingPublisher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make publishing fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of published events.
    #[must_use]
    pub fn events(&self) -> Vec<AdmissionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: AdmissionEvent) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Failed("injected publish failure".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
