//! Domain types for ticket admission control.
//!
//! This module contains the identifiers, closed enumerations and the [`Ticket`]
//! record itself. A ticket carries a denormalized copy of its type policy taken at
//! issuance time, so later policy changes never alter already-issued tickets.

use crate::registry::TicketTypeConfig;
use crate::validation::{Decision, DenialReason, decide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

/// Error returned when parsing an identifier from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: {reason}")]
pub struct ParseIdError {
    kind: &'static str,
    reason: &'static str,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from application-controlled input (no validation).
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert the identifier into its inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: $kind,
                        reason: "cannot be empty",
                    });
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique, immutable identifier of a ticket (the payload of its QR code).
    TicketId,
    "ticket id"
);

string_id!(
    /// Identifier of the gate terminal that submitted a scan.
    TerminalId,
    "terminal id"
);

string_id!(
    /// Identifier of the operator performing an administrative action.
    ActorId,
    "actor id"
);

// ============================================================================
// Closed enumerations
// ============================================================================

/// Error returned when a day or ticket type code is not part of the configured set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} code: {code}")]
pub struct UnknownCodeError {
    kind: &'static str,
    code: String,
}

/// Admission day of the deployed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventDay {
    /// First day
    Day1,
    /// Second day
    Day2,
    /// Third day
    Day3,
}

impl EventDay {
    /// Every admission day, in calendar order.
    pub const ALL: [Self; 3] = [Self::Day1, Self::Day2, Self::Day3];

    /// Wire code for this day.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Day1 => "DAY1",
            Self::Day2 => "DAY2",
            Self::Day3 => "DAY3",
        }
    }
}

impl fmt::Display for EventDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EventDay {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|day| day.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCodeError {
                kind: "day",
                code: s.to_string(),
            })
    }
}

/// Ticket category. Determines the admission policy through the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    /// Admits once on a single configured day
    SingleDay,
    /// Admits once on each of two days
    TwoDay,
    /// Partial pass: fewer admissions than valid days
    FlexPass,
    /// Admits once on every day
    FullPass,
}

impl TicketType {
    /// Every ticket type.
    pub const ALL: [Self; 4] = [Self::SingleDay, Self::TwoDay, Self::FlexPass, Self::FullPass];

    /// Wire code for this ticket type.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SingleDay => "SINGLE_DAY",
            Self::TwoDay => "TWO_DAY",
            Self::FlexPass => "FLEX_PASS",
            Self::FullPass => "FULL_PASS",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TicketType {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCodeError {
                kind: "ticket type",
                code: s.to_string(),
            })
    }
}

/// Stored lifecycle status. "Used up" is never stored, see [`Ticket::is_exhausted`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Initial state, admissions allowed subject to policy
    Active,
    /// Terminal state
    Cancelled,
}

impl TicketStatus {
    /// Whether no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ============================================================================
// Records
// ============================================================================

/// One recorded admission. Never edited or removed once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Admission day this scan consumed
    pub day: EventDay,
    /// When the admission was recorded
    pub timestamp: DateTime<Utc>,
    /// Terminal that performed the scan
    pub terminal_id: TerminalId,
}

/// Details recorded when a ticket is cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Operator-supplied reason
    pub reason: String,
    /// Operator who cancelled the ticket
    pub actor: ActorId,
    /// When the cancellation took effect
    pub cancelled_at: DateTime<Utc>,
}

/// Error raised when a mutation would break a ticket invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Scan for {day} rejected by ticket invariants: {reason}")]
pub struct ScanRejected {
    /// Day of the rejected scan
    pub day: EventDay,
    /// Rule that rejected it
    pub reason: DenialReason,
}

/// A stored ticket that breaks a ticket invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTicket {
    /// More scans than the ticket permits.
    #[error("{scans} scans exceed max_scans {max_scans}")]
    TooManyScans {
        /// Recorded scans
        scans: usize,
        /// Permitted scans
        max_scans: u32,
    },

    /// Two scans for the same day.
    #[error("more than one scan for {0}")]
    DuplicateDay(EventDay),

    /// A scan for a day the ticket was not issued for.
    #[error("scan for {0}, which the ticket does not allow")]
    DayNotAllowed(EventDay),

    /// A cancelled ticket with recorded scans.
    #[error("cancelled ticket has recorded scans")]
    ScannedThenCancelled,

    /// Status and cancellation details disagree.
    #[error("status {status:?} does not match cancellation details")]
    CancellationMismatch {
        /// Stored status
        status: TicketStatus,
    },
}

/// An admission credential.
///
/// Fields are private: the only mutation paths are [`Ticket::record_scan`] and the
/// lifecycle transition in [`crate::lifecycle::cancel`], both of which uphold
/// `scans.len() <= max_scans`, one scan per day, and no scans after cancellation.
/// Deserialization checks the same invariants, so a record read back from a store
/// cannot bypass them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTicket")]
pub struct Ticket {
    ticket_id: TicketId,
    ticket_type: TicketType,
    status: TicketStatus,
    scans: SmallVec<[ScanEvent; 4]>,
    allowed_days: BTreeSet<EventDay>,
    max_scans: u32,
    issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancellation: Option<Cancellation>,
}

/// Unchecked wire form of [`Ticket`].
#[derive(Deserialize)]
struct RawTicket {
    ticket_id: TicketId,
    ticket_type: TicketType,
    status: TicketStatus,
    scans: SmallVec<[ScanEvent; 4]>,
    allowed_days: BTreeSet<EventDay>,
    max_scans: u32,
    issued_at: DateTime<Utc>,
    #[serde(default)]
    cancellation: Option<Cancellation>,
}

impl TryFrom<RawTicket> for Ticket {
    type Error = InvalidTicket;

    fn try_from(raw: RawTicket) -> Result<Self, Self::Error> {
        if !u32::try_from(raw.scans.len()).is_ok_and(|n| n <= raw.max_scans) {
            return Err(InvalidTicket::TooManyScans {
                scans: raw.scans.len(),
                max_scans: raw.max_scans,
            });
        }

        let mut seen = BTreeSet::new();
        for scan in &raw.scans {
            if !raw.allowed_days.contains(&scan.day) {
                return Err(InvalidTicket::DayNotAllowed(scan.day));
            }
            if !seen.insert(scan.day) {
                return Err(InvalidTicket::DuplicateDay(scan.day));
            }
        }

        match (raw.status, raw.cancellation.is_some()) {
            (TicketStatus::Active, false) => {}
            (TicketStatus::Cancelled, true) if raw.scans.is_empty() => {}
            (TicketStatus::Cancelled, true) => return Err(InvalidTicket::ScannedThenCancelled),
            (status, _) => return Err(InvalidTicket::CancellationMismatch { status }),
        }

        Ok(Self {
            ticket_id: raw.ticket_id,
            ticket_type: raw.ticket_type,
            status: raw.status,
            scans: raw.scans,
            allowed_days: raw.allowed_days,
            max_scans: raw.max_scans,
            issued_at: raw.issued_at,
            cancellation: raw.cancellation,
        })
    }
}

impl Ticket {
    /// Create an `ACTIVE` ticket with no scans, copying the given policy.
    #[must_use]
    pub fn issue(
        ticket_id: TicketId,
        ticket_type: TicketType,
        policy: &TicketTypeConfig,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket_id,
            ticket_type,
            status: TicketStatus::Active,
            scans: SmallVec::new(),
            allowed_days: policy.allowed_days.clone(),
            max_scans: policy.max_scans,
            issued_at,
            cancellation: None,
        }
    }

    /// Ticket identifier.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    /// Ticket category.
    #[must_use]
    pub const fn ticket_type(&self) -> TicketType {
        self.ticket_type
    }

    /// Stored lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.status
    }

    /// Recorded admissions in admission order.
    #[must_use]
    pub fn scans(&self) -> &[ScanEvent] {
        &self.scans
    }

    /// Days this ticket was issued for.
    #[must_use]
    pub const fn allowed_days(&self) -> &BTreeSet<EventDay> {
        &self.allowed_days
    }

    /// Maximum total admissions across all days.
    #[must_use]
    pub const fn max_scans(&self) -> u32 {
        self.max_scans
    }

    /// Issuance timestamp.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Cancellation details, present once the ticket is cancelled.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    /// Number of recorded admissions.
    #[must_use]
    pub fn scan_count(&self) -> u32 {
        u32::try_from(self.scans.len()).unwrap_or(u32::MAX)
    }

    /// Admissions still available.
    #[must_use]
    pub fn remaining_scans(&self) -> u32 {
        self.max_scans.saturating_sub(self.scan_count())
    }

    /// Whether the ticket was issued for `day`.
    #[must_use]
    pub fn is_valid_for(&self, day: EventDay) -> bool {
        self.allowed_days.contains(&day)
    }

    /// Whether an admission has already been recorded for `day`.
    #[must_use]
    pub fn has_scan_for(&self, day: EventDay) -> bool {
        self.scans.iter().any(|scan| scan.day == day)
    }

    /// Derived "used" condition: every permitted admission has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.scan_count() >= self.max_scans
    }

    /// Whether the ticket has been cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.status, TicketStatus::Cancelled)
    }

    /// Append an admission.
    ///
    /// # Errors
    ///
    /// Returns [`ScanRejected`] if the validation rules would deny this scan.
    pub fn record_scan(&mut self, scan: ScanEvent) -> Result<(), ScanRejected> {
        match decide(Some(self), scan.day) {
            Decision::Valid { .. } => {
                self.scans.push(scan);
                Ok(())
            }
            Decision::Denied { reason } => Err(ScanRejected {
                day: scan.day,
                reason,
            }),
        }
    }

    pub(crate) fn mark_cancelled(&mut self, cancellation: Cancellation) {
        self.status = TicketStatus::Cancelled;
        self.cancellation = Some(cancellation);
    }
}
