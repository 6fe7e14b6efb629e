//! Audit trail: write-only record of every admission attempt and lifecycle action.
//!
//! Entries are appended and never read back by the engine. A failed append must not
//! change an admission decision; callers log the failure and move on.

use crate::types::{ActorId, TerminalId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A scan was admitted and committed
    ScanAdmitted,
    /// A scan was denied by a business rule
    ScanDenied,
    /// A ticket was cancelled
    TicketCancelled,
    /// A cancellation request was refused
    CancelRefused,
}

/// Who triggered the action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditSource {
    /// A gate terminal
    Terminal(TerminalId),
    /// An operator
    Operator(ActorId),
}

/// One immutable audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id
    pub entry_id: Uuid,
    /// Ticket the action concerns
    pub ticket_id: TicketId,
    /// What happened
    pub action: AuditAction,
    /// True reason code or operator-supplied reason
    pub reason: String,
    /// Terminal or operator responsible
    pub source: AuditSource,
    /// When it happened
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry with a fresh id.
    #[must_use]
    pub fn new(
        ticket_id: TicketId,
        action: AuditAction,
        reason: impl Into<String>,
        source: AuditSource,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            ticket_id,
            action,
            reason: reason.into(),
            source,
            recorded_at,
        }
    }
}

/// Errors from the audit sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The sink could not accept the entry.
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only audit sink.
pub trait AuditLog: Send + Sync {
    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Unavailable`] if the entry could not be recorded.
    fn append(
        &self,
        entry: AuditEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + '_>>;
}
