//! Validation engine: the pure admission decision.
//!
//! [`decide`] takes a ticket's current state and a requested day and returns a
//! [`Decision`]. Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. ticket absent → [`DenialReason::TicketNotFound`]
//! 2. ticket cancelled → [`DenialReason::TicketCancelled`]
//! 3. day outside the ticket's allowed days → [`DenialReason::NotValidForDay`]
//! 4. day already scanned → [`DenialReason::AlreadyScanned`]
//! 5. admission cap reached → [`DenialReason::TicketFullyUsed`]
//! 6. otherwise → [`Decision::Valid`]
//!
//! Every denial shows the same caller-facing message ([`DENIED_MESSAGE`]). The
//! reason code is for operators and the audit trail only.

use crate::types::{EventDay, Ticket, TicketType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message shown to the scanned party for every denial.
pub const DENIED_MESSAGE: &str = "Invalid Ticket QR Code";

/// Message shown to the scanned party on admission.
pub const VALID_MESSAGE: &str = "Ticket validated";

/// Why an admission attempt was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// No ticket with the presented id exists
    TicketNotFound,
    /// The ticket has been cancelled
    TicketCancelled,
    /// The ticket is not valid on the requested day
    NotValidForDay,
    /// An admission was already recorded for the requested day
    AlreadyScanned,
    /// Every permitted admission has been consumed
    TicketFullyUsed,
}

impl DenialReason {
    /// Stable reason code for logs and audit entries.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TicketNotFound => "TICKET_NOT_FOUND",
            Self::TicketCancelled => "TICKET_CANCELLED",
            Self::NotValidForDay => "NOT_VALID_FOR_DAY",
            Self::AlreadyScanned => "ALREADY_SCANNED",
            Self::TicketFullyUsed => "TICKET_FULLY_USED",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of an admission decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Admit. Carries the ticket type for the terminal to display.
    Valid {
        /// Category of the admitted ticket
        ticket_type: TicketType,
    },
    /// Deny, with the rule that fired.
    Denied {
        /// First rule that rejected the attempt
        reason: DenialReason,
    },
}

impl Decision {
    /// Whether the attempt is admitted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Denial reason, if denied.
    #[must_use]
    pub const fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Denied { reason } => Some(*reason),
        }
    }

    /// Reason code (`VALID` or the denial code).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Valid { .. } => "VALID",
            Self::Denied { reason } => reason.code(),
        }
    }

    /// Caller-facing message. Identical for every denial.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Valid { .. } => VALID_MESSAGE,
            Self::Denied { .. } => DENIED_MESSAGE,
        }
    }

    const fn denied(reason: DenialReason) -> Self {
        Self::Denied { reason }
    }
}

/// Decide whether `ticket` may be admitted on `day`.
#[must_use]
pub fn decide(ticket: Option<&Ticket>, day: EventDay) -> Decision {
    let Some(ticket) = ticket else {
        return Decision::denied(DenialReason::TicketNotFound);
    };

    if ticket.is_cancelled() {
        return Decision::denied(DenialReason::TicketCancelled);
    }
    if !ticket.is_valid_for(day) {
        return Decision::denied(DenialReason::NotValidForDay);
    }
    if ticket.has_scan_for(day) {
        return Decision::denied(DenialReason::AlreadyScanned);
    }
    if ticket.is_exhausted() {
        return Decision::denied(DenialReason::TicketFullyUsed);
    }

    Decision::Valid {
        ticket_type: ticket.ticket_type(),
    }
}
