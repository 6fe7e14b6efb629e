//! End-to-end admission and cancellation scenarios through the coordinator.
//!
//! Run with: `cargo test --test admission_scenarios_test`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use admission_core::TicketTypeRegistry;
use admission_core::audit::{AuditAction, AuditSource};
use admission_core::lifecycle::CancelDenial;
use admission_core::notify::AdmissionEvent;
use admission_core::registry::{RegistryError, TicketTypeConfig};
use admission_core::types::{ActorId, EventDay, TerminalId, TicketId, TicketStatus, TicketType};
use admission_core::validation::{Decision, DenialReason};
use admission_runtime::{
    AdmissionError, CancelError, CancelErrorCode, CancelRequest, ReasonCode, ScanRequest,
};
use admission_testing::properties;
use common::{Harness, fast_config};
use proptest::prelude::*;

fn gate() -> TerminalId {
    TerminalId::new("north-1")
}

fn ops() -> ActorId {
    ActorId::new("ops-lead")
}

async fn scan(harness: &Harness, id: &TicketId, day: EventDay) -> Decision {
    harness
        .coordinator
        .attempt_scan(id, day, &gate())
        .await
        .expect("scan should not hit a system fault")
}

fn denied(reason: DenialReason) -> Decision {
    Decision::Denied { reason }
}

// ============================================================================
// Admission scenarios
// ============================================================================

#[tokio::test]
async fn two_day_ticket_walkthrough() {
    let harness = Harness::new();
    let id = harness.issue("TWO-1", TicketType::TwoDay);

    assert!(scan(&harness, &id, EventDay::Day1).await.is_valid());
    assert_eq!(
        scan(&harness, &id, EventDay::Day1).await,
        denied(DenialReason::AlreadyScanned)
    );
    assert!(scan(&harness, &id, EventDay::Day2).await.is_valid());

    // Exhausted: a repeat day still reports the earlier-ranked ALREADY_SCANNED,
    // and a day outside the policy reports NOT_VALID_FOR_DAY.
    assert_eq!(
        scan(&harness, &id, EventDay::Day2).await,
        denied(DenialReason::AlreadyScanned)
    );
    assert_eq!(
        scan(&harness, &id, EventDay::Day3).await,
        denied(DenialReason::NotValidForDay)
    );

    let ticket = harness.ticket(&id);
    assert_eq!(ticket.scan_count(), 2);
    assert!(ticket.is_exhausted());
    assert_eq!(ticket.status(), TicketStatus::Active);
}

#[tokio::test]
async fn flex_pass_reports_fully_used_on_unscanned_day() {
    let harness = Harness::new();
    let id = harness.issue("FLEX-1", TicketType::FlexPass);

    assert!(scan(&harness, &id, EventDay::Day1).await.is_valid());
    assert!(scan(&harness, &id, EventDay::Day3).await.is_valid());
    assert_eq!(
        scan(&harness, &id, EventDay::Day2).await,
        denied(DenialReason::TicketFullyUsed)
    );
    assert_eq!(harness.ticket(&id).scan_count(), 2);
}

#[tokio::test]
async fn single_day_ticket_only_admits_its_day() {
    let harness = Harness::new();
    let id = harness.issue("ONE-1", TicketType::SingleDay);

    assert_eq!(
        scan(&harness, &id, EventDay::Day1).await,
        denied(DenialReason::NotValidForDay)
    );
    assert_eq!(
        scan(&harness, &id, EventDay::Day2).await,
        Decision::Valid {
            ticket_type: TicketType::SingleDay
        }
    );
    assert_eq!(harness.ticket(&id).scans()[0].day, EventDay::Day2);
}

#[tokio::test]
async fn unknown_ticket_is_denied_without_creating_a_record() {
    let harness = Harness::new();
    let id = TicketId::new("NOPE");

    assert_eq!(
        scan(&harness, &id, EventDay::Day1).await,
        denied(DenialReason::TicketNotFound)
    );
    assert!(!harness.store.contains(&id));
    assert!(harness.store.is_empty());
    assert_eq!(harness.store.write_count(), 0);

    let entries = harness.audit.entries_for(&id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::ScanDenied);
    assert_eq!(entries[0].reason, "TICKET_NOT_FOUND:DAY1");
}

#[tokio::test]
async fn admissions_and_denials_are_audited_with_their_terminal() {
    let harness = Harness::new();
    let id = harness.issue("AUD-1", TicketType::FullPass);

    scan(&harness, &id, EventDay::Day3).await;
    scan(&harness, &id, EventDay::Day3).await;

    let entries = harness.audit.entries_for(&id);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, AuditAction::ScanAdmitted);
    assert_eq!(entries[0].reason, "VALID:DAY3");
    assert_eq!(entries[1].action, AuditAction::ScanDenied);
    assert_eq!(entries[1].reason, "ALREADY_SCANNED:DAY3");
    assert!(entries
        .iter()
        .all(|entry| entry.source == AuditSource::Terminal(gate())));
}

#[tokio::test]
async fn admission_publishes_event_with_remaining_scans() {
    let harness = Harness::new();
    let id = harness.issue("PUB-1", TicketType::FullPass);

    scan(&harness, &id, EventDay::Day1).await;
    scan(&harness, &id, EventDay::Day1).await;

    let events = harness.publisher.events();
    assert_eq!(events.len(), 1, "denials are never published");
    match &events[0] {
        AdmissionEvent::TicketAdmitted {
            ticket_id,
            day,
            remaining_scans,
            ..
        } => {
            assert_eq!(ticket_id, &id);
            assert_eq!(*day, EventDay::Day1);
            assert_eq!(*remaining_scans, 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancel_then_cancel_again() {
    let harness = Harness::new();
    let id = harness.issue("CXL-1", TicketType::TwoDay);

    harness
        .coordinator
        .cancel_ticket(&id, "refund", &ops())
        .await
        .unwrap();

    let ticket = harness.ticket(&id);
    assert_eq!(ticket.status(), TicketStatus::Cancelled);
    let cancellation = ticket.cancellation().unwrap();
    assert_eq!(cancellation.reason, "refund");
    assert_eq!(cancellation.actor, ops());

    let again = harness.coordinator.cancel_ticket(&id, "refund", &ops()).await;
    assert_eq!(again, Err(CancelError::Denied(CancelDenial::AlreadyCancelled)));
    assert_eq!(again.unwrap_err().code(), "ALREADY_CANCELLED");

    assert_eq!(harness.audit.count(AuditAction::TicketCancelled), 1);
    assert_eq!(harness.audit.count(AuditAction::CancelRefused), 1);
    assert!(matches!(
        harness.publisher.events().as_slice(),
        [AdmissionEvent::TicketCancelled { .. }]
    ));
}

#[tokio::test]
async fn cancelled_ticket_denies_every_day() {
    let harness = Harness::new();
    let id = harness.issue("CXL-2", TicketType::FullPass);
    harness
        .coordinator
        .cancel_ticket(&id, "fraud", &ops())
        .await
        .unwrap();

    for day in EventDay::ALL {
        assert_eq!(
            scan(&harness, &id, day).await,
            denied(DenialReason::TicketCancelled)
        );
    }
    assert_eq!(harness.ticket(&id).scan_count(), 0);
}

#[tokio::test]
async fn scanned_or_used_tickets_cannot_be_cancelled() {
    let harness = Harness::new();
    let scanned = harness.issue("CXL-3", TicketType::TwoDay);
    let used = harness.issue("CXL-4", TicketType::SingleDay);

    scan(&harness, &scanned, EventDay::Day1).await;
    scan(&harness, &used, EventDay::Day2).await;

    assert_eq!(
        harness.coordinator.cancel_ticket(&scanned, "x", &ops()).await,
        Err(CancelError::Denied(CancelDenial::TicketScanned))
    );
    assert_eq!(
        harness.coordinator.cancel_ticket(&used, "x", &ops()).await,
        Err(CancelError::Denied(CancelDenial::TicketUsed))
    );
    assert_eq!(harness.ticket(&scanned).status(), TicketStatus::Active);
    assert_eq!(harness.ticket(&used).status(), TicketStatus::Active);
}

#[tokio::test]
async fn cancel_unknown_ticket() {
    let harness = Harness::new();
    let id = TicketId::new("GHOST");

    let result = harness.coordinator.cancel_ticket(&id, "x", &ops()).await;
    assert_eq!(result, Err(CancelError::NotFound(id.clone())));
    assert!(!result.unwrap_err().is_retryable());
    assert!(!harness.store.contains(&id));
}

// ============================================================================
// Request / response surface
// ============================================================================

#[tokio::test]
async fn request_handlers_produce_wire_responses() {
    let harness = Harness::new();
    let id = harness.issue("API-1", TicketType::TwoDay);

    let request = ScanRequest {
        ticket_id: id.clone(),
        day: EventDay::Day1,
        terminal_id: gate(),
    };
    let first = harness.coordinator.handle_scan(&request).await;
    let second = harness.coordinator.handle_scan(&request).await;
    assert!(first.valid);
    assert_eq!(first.ticket_type, Some(TicketType::TwoDay));
    assert_eq!(second.reason, ReasonCode::AlreadyScanned);

    let cancel = harness
        .coordinator
        .handle_cancel(&CancelRequest {
            ticket_id: id,
            reason: "refund".to_string(),
            actor: ops(),
        })
        .await;
    assert!(!cancel.ok);
    assert_eq!(cancel.error, Some(CancelErrorCode::TicketScanned));
}

// ============================================================================
// Configuration faults
// ============================================================================

#[tokio::test]
async fn missing_policy_is_a_non_retryable_error() {
    let registry = TicketTypeRegistry::new([(
        TicketType::TwoDay,
        TicketTypeConfig::new([EventDay::Day1, EventDay::Day2], 2),
    )])
    .unwrap();
    let harness = Harness::with(registry, &fast_config());
    let id = harness.issue("CFG-1", TicketType::FullPass);
    let ok = harness.issue("CFG-2", TicketType::TwoDay);

    let err = harness
        .coordinator
        .attempt_scan(&id, EventDay::Day1, &gate())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmissionError::Registry(RegistryError::UnknownTicketType(TicketType::FullPass))
    );
    assert!(!err.is_retryable());
    assert_eq!(harness.ticket(&id).scan_count(), 0);

    // Terminals must be told not to retry.
    let response = harness
        .coordinator
        .handle_scan(&ScanRequest {
            ticket_id: id.clone(),
            day: EventDay::Day2,
            terminal_id: gate(),
        })
        .await;
    assert!(!response.valid);
    assert_eq!(response.reason, ReasonCode::ConfigError);

    // The failed request must not leave the ticket's lock held.
    let retry = harness
        .coordinator
        .attempt_scan(&id, EventDay::Day1, &gate())
        .await;
    assert!(matches!(retry, Err(AdmissionError::Registry(_))));

    // Other types keep working.
    assert!(scan(&harness, &ok, EventDay::Day1).await.is_valid());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sequential scans never exceed the cap, never admit a day twice, and every
    /// admission is persisted.
    #[test]
    fn sequential_scans_respect_policy(
        ticket_type in properties::ticket_type(),
        days in properties::scan_days(8),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let harness = Harness::new();
            let id = harness.issue("PROP-1", ticket_type);
            let mut admitted = Vec::new();

            for day in days {
                let before = harness.ticket(&id);
                let decision = scan(&harness, &id, day).await;
                if decision.is_valid() {
                    prop_assert!(!before.is_exhausted());
                    prop_assert!(!admitted.contains(&day));
                    admitted.push(day);
                } else if before.is_exhausted() {
                    prop_assert!(matches!(
                        decision.denial_reason(),
                        Some(
                            DenialReason::TicketFullyUsed
                                | DenialReason::AlreadyScanned
                                | DenialReason::NotValidForDay
                        )
                    ));
                }
            }

            let ticket = harness.ticket(&id);
            prop_assert_eq!(ticket.scan_count() as usize, admitted.len());
            prop_assert!(ticket.scan_count() <= ticket.max_scans());
            Ok(())
        })?;
    }
}
