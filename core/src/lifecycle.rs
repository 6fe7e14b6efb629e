//! Ticket lifecycle: `ACTIVE → CANCELLED`, plus the derived exhausted condition.
//!
//! `CANCELLED` is terminal. "Used" is never a stored status; it is derived from the
//! scan history via [`Ticket::is_exhausted`].

use crate::types::{ActorId, Cancellation, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a cancellation was refused.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelDenial {
    /// The ticket is already in the terminal state.
    #[error("ticket is already cancelled")]
    AlreadyCancelled,

    /// Every admission has been consumed.
    #[error("cannot cancel a used ticket")]
    TicketUsed,

    /// At least one admission has been recorded.
    #[error("cannot cancel a ticket that has been scanned")]
    TicketScanned,
}

/// Check whether `ticket` may be cancelled.
///
/// # Errors
///
/// Returns the first [`CancelDenial`] that applies, checked in the order
/// already-cancelled, exhausted, scanned.
pub fn can_cancel(ticket: &Ticket) -> Result<(), CancelDenial> {
    if ticket.is_cancelled() {
        return Err(CancelDenial::AlreadyCancelled);
    }
    if ticket.is_exhausted() {
        return Err(CancelDenial::TicketUsed);
    }
    if !ticket.scans().is_empty() {
        return Err(CancelDenial::TicketScanned);
    }
    Ok(())
}

/// Produce the cancelled version of `ticket`.
///
/// The input is left untouched; the caller persists the returned ticket.
///
/// # Errors
///
/// Returns a [`CancelDenial`] if [`can_cancel`] refuses.
pub fn cancel(
    ticket: &Ticket,
    reason: impl Into<String>,
    actor: ActorId,
    at: DateTime<Utc>,
) -> Result<Ticket, CancelDenial> {
    can_cancel(ticket)?;

    let mut cancelled = ticket.clone();
    cancelled.mark_cancelled(Cancellation {
        reason: reason.into(),
        actor,
        cancelled_at: at,
    });
    Ok(cancelled)
}
