//! Outbound admission events for downstream collaborators (notifications, reporting).
//!
//! Events are emitted only after the state change they describe has been durably
//! committed. Publishing never blocks and never fails the operation that produced the
//! event: a dropped notification is logged, the admission stands.

use crate::types::{ActorId, EventDay, TerminalId, TicketId, TicketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A committed state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdmissionEvent {
    /// A scan was admitted and persisted.
    TicketAdmitted {
        /// Admitted ticket
        ticket_id: TicketId,
        /// Its category
        ticket_type: TicketType,
        /// Day consumed
        day: EventDay,
        /// Terminal that scanned it
        terminal_id: TerminalId,
        /// Admissions left after this one
        remaining_scans: u32,
        /// Commit time
        at: DateTime<Utc>,
    },
    /// A ticket was cancelled and persisted.
    TicketCancelled {
        /// Cancelled ticket
        ticket_id: TicketId,
        /// Operator-supplied reason
        reason: String,
        /// Operator
        actor: ActorId,
        /// Commit time
        at: DateTime<Utc>,
    },
}

impl AdmissionEvent {
    /// Ticket the event concerns.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        match self {
            Self::TicketAdmitted { ticket_id, .. } | Self::TicketCancelled { ticket_id, .. } => {
                ticket_id
            }
        }
    }

    /// Short event name for logs.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TicketAdmitted { .. } => "ticket_admitted",
            Self::TicketCancelled { .. } => "ticket_cancelled",
        }
    }
}

/// Errors from publishing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Nobody is listening.
    #[error("No subscribers for {0}")]
    NoSubscribers(&'static str),

    /// The channel is closed or the backend refused the event.
    #[error("Publish failed: {0}")]
    Failed(String),
}

/// Fire-and-forget publisher of committed events.
///
/// `publish` must not block; delivery happens asynchronously on the consumer's side.
pub trait EventPublisher: Send + Sync {
    /// Hand an event to the outbound channel.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the event could not be enqueued. Callers log and
    /// ignore it.
    fn publish(&self, event: AdmissionEvent) -> Result<(), PublishError>;
}

/// Publisher that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: AdmissionEvent) -> Result<(), PublishError> {
        Ok(())
    }
}
