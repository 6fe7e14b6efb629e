//! Inbound request and response shapes.
//!
//! These are what gate terminals and the admin console exchange with the engine. Every
//! outcome is a closed set of codes; a scanned party only ever sees `message`, which is
//! identical for all denials.

use crate::coordinator::{AdmissionError, CancelError, ScanCoordinator};
use admission_core::types::{ActorId, EventDay, TerminalId, TicketId, TicketType};
use admission_core::validation::{Decision, DenialReason};
use serde::{Deserialize, Serialize};

/// Message shown when the engine could not decide.
pub const SYSTEM_ERROR_MESSAGE: &str = "Unable to validate ticket, please retry";

/// Message shown when the engine is misconfigured for this ticket.
pub const CONFIG_ERROR_MESSAGE: &str = "Unable to validate ticket, contact an operator";

/// Outcome code of a scan request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Admitted
    Valid,
    /// No such ticket
    TicketNotFound,
    /// Ticket cancelled
    TicketCancelled,
    /// Not valid on the requested day
    NotValidForDay,
    /// Already admitted on the requested day
    AlreadyScanned,
    /// Admission cap reached
    TicketFullyUsed,
    /// System fault; retry the request
    SystemError,
    /// Configuration fault; retrying cannot help
    ConfigError,
}

impl From<DenialReason> for ReasonCode {
    fn from(reason: DenialReason) -> Self {
        match reason {
            DenialReason::TicketNotFound => Self::TicketNotFound,
            DenialReason::TicketCancelled => Self::TicketCancelled,
            DenialReason::NotValidForDay => Self::NotValidForDay,
            DenialReason::AlreadyScanned => Self::AlreadyScanned,
            DenialReason::TicketFullyUsed => Self::TicketFullyUsed,
        }
    }
}

/// A scan request from a gate terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Ticket presented
    pub ticket_id: TicketId,
    /// Day being admitted
    pub day: EventDay,
    /// Terminal submitting the scan
    pub terminal_id: TerminalId,
}

/// Response to a scan request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Whether to open the gate
    pub valid: bool,
    /// Outcome code (operator visibility)
    pub reason: ReasonCode,
    /// Caller-facing message
    pub message: String,
    /// Ticket category, on admission only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
}

impl ScanResponse {
    /// Response for a completed decision.
    #[must_use]
    pub fn from_decision(decision: &Decision) -> Self {
        match *decision {
            Decision::Valid { ticket_type } => Self {
                valid: true,
                reason: ReasonCode::Valid,
                message: decision.message().to_string(),
                ticket_type: Some(ticket_type),
            },
            Decision::Denied { reason } => Self {
                valid: false,
                reason: reason.into(),
                message: decision.message().to_string(),
                ticket_type: None,
            },
        }
    }

    /// Response for a system fault.
    #[must_use]
    pub fn system_error() -> Self {
        Self {
            valid: false,
            reason: ReasonCode::SystemError,
            message: SYSTEM_ERROR_MESSAGE.to_string(),
            ticket_type: None,
        }
    }

    /// Response for a configuration fault.
    #[must_use]
    pub fn config_error() -> Self {
        Self {
            valid: false,
            reason: ReasonCode::ConfigError,
            message: CONFIG_ERROR_MESSAGE.to_string(),
            ticket_type: None,
        }
    }

    /// Response for the outcome of [`ScanCoordinator::attempt_scan`].
    ///
    /// Only faults a retry may clear map to [`ReasonCode::SystemError`].
    #[must_use]
    pub fn from_result(result: &Result<Decision, AdmissionError>) -> Self {
        match result {
            Ok(decision) => Self::from_decision(decision),
            Err(err) if err.is_retryable() => Self::system_error(),
            Err(_) => Self::config_error(),
        }
    }
}

impl From<&Result<Decision, AdmissionError>> for ScanResponse {
    fn from(result: &Result<Decision, AdmissionError>) -> Self {
        Self::from_result(result)
    }
}

/// A cancellation request from the admin console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Ticket to cancel
    pub ticket_id: TicketId,
    /// Free-text reason
    pub reason: String,
    /// Operator
    pub actor: ActorId,
}

/// Error code of a refused cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelErrorCode {
    /// No such ticket
    TicketNotFound,
    /// Already cancelled
    AlreadyCancelled,
    /// Every admission consumed
    TicketUsed,
    /// At least one admission recorded
    TicketScanned,
    /// System fault; retry the request
    SystemError,
    /// Configuration fault; retrying cannot help
    ConfigError,
}

impl From<&CancelError> for CancelErrorCode {
    fn from(err: &CancelError) -> Self {
        use admission_core::lifecycle::CancelDenial;

        match err {
            CancelError::NotFound(_) => Self::TicketNotFound,
            CancelError::Denied(CancelDenial::AlreadyCancelled) => Self::AlreadyCancelled,
            CancelError::Denied(CancelDenial::TicketUsed) => Self::TicketUsed,
            CancelError::Denied(CancelDenial::TicketScanned) => Self::TicketScanned,
            CancelError::System(err) if err.is_retryable() => Self::SystemError,
            CancelError::System(_) => Self::ConfigError,
        }
    }
}

/// Response to a cancellation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Whether the ticket is now cancelled by this request
    pub ok: bool,
    /// Why not, if not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CancelErrorCode>,
}

impl From<&Result<(), CancelError>> for CancelResponse {
    fn from(result: &Result<(), CancelError>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(err) => Self {
                ok: false,
                error: Some(err.into()),
            },
        }
    }
}

impl ScanCoordinator {
    /// Handle a scan request end to end.
    pub async fn handle_scan(&self, request: &ScanRequest) -> ScanResponse {
        let result = self
            .attempt_scan(&request.ticket_id, request.day, &request.terminal_id)
            .await;
        ScanResponse::from(&result)
    }

    /// Handle a cancellation request end to end.
    pub async fn handle_cancel(&self, request: &CancelRequest) -> CancelResponse {
        let result = self
            .cancel_ticket(&request.ticket_id, &request.reason, &request.actor)
            .await;
        CancelResponse::from(&result)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use admission_core::lifecycle::CancelDenial;
    use admission_core::registry::RegistryError;
    use admission_core::validation::DENIED_MESSAGE;
    use std::time::Duration;

    #[test]
    fn valid_response_carries_ticket_type() {
        let response = ScanResponse::from_decision(&Decision::Valid {
            ticket_type: TicketType::TwoDay,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["reason"], "VALID");
        assert_eq!(json["ticket_type"], "TWO_DAY");
    }

    #[test]
    fn denials_share_message_but_keep_reason() {
        let response = ScanResponse::from_decision(&Decision::Denied {
            reason: DenialReason::AlreadyScanned,
        });
        assert!(!response.valid);
        assert_eq!(response.reason, ReasonCode::AlreadyScanned);
        assert_eq!(response.message, DENIED_MESSAGE);
        assert!(response.ticket_type.is_none());
    }

    #[test]
    fn system_faults_are_distinct_from_denials() {
        let result: Result<Decision, AdmissionError> =
            Err(AdmissionError::StoreTimeout(Duration::from_millis(5)));
        let response = ScanResponse::from(&result);
        assert_eq!(response.reason, ReasonCode::SystemError);
        assert_ne!(response.message, DENIED_MESSAGE);

        let misconfigured: Result<Decision, AdmissionError> = Err(AdmissionError::Registry(
            RegistryError::UnknownTicketType(TicketType::FlexPass),
        ));
        let json = serde_json::to_value(ScanResponse::from(&misconfigured)).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["reason"], "CONFIG_ERROR");
        assert_eq!(json["message"], CONFIG_ERROR_MESSAGE);
    }

    #[test]
    fn cancel_response_codes() {
        let ok: Result<(), CancelError> = Ok(());
        assert_eq!(CancelResponse::from(&ok), CancelResponse { ok: true, error: None });

        let again: Result<(), CancelError> = Err(CancelDenial::AlreadyCancelled.into());
        let json = serde_json::to_value(CancelResponse::from(&again)).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "ALREADY_CANCELLED");
    }

    #[test]
    fn scan_request_parses_from_json() {
        let request: ScanRequest = serde_json::from_str(
            r#"{ "ticket_id": "T-1", "day": "DAY2", "terminal_id": "north-gate" }"#,
        )
        .unwrap();
        assert_eq!(request.day, EventDay::Day2);
        assert_eq!(request.ticket_id.as_str(), "T-1");
    }
}
