//! End-to-end tests for the gate console against the demo seed data.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use admission_core::TicketTypeRegistry;
use admission_core::environment::Clock;
use admission_gate::{Console, tickets_from_json_str};
use admission_runtime::metrics::MetricsExporter;
use admission_runtime::{
    AdmissionEnvironment, BroadcastPublisher, CoordinatorConfig, ScanCoordinator,
};
use admission_testing::{InMemoryAuditLog, InMemoryTicketStore, test_clock};
use serde_json::Value;
use std::sync::Arc;

const POLICIES: &str = include_str!("../../demos/policies.json");
const TICKETS: &str = include_str!("../../demos/tickets.json");

fn coordinator(publisher: BroadcastPublisher) -> ScanCoordinator {
    let registry = TicketTypeRegistry::from_json_str(POLICIES).unwrap();
    let store = InMemoryTicketStore::new();
    for ticket in tickets_from_json_str(TICKETS, &registry, test_clock().now()).unwrap() {
        store.insert(ticket);
    }

    let env = AdmissionEnvironment::new(
        Arc::new(store),
        Arc::new(registry),
        Arc::new(InMemoryAuditLog::new()),
        Arc::new(publisher),
        Arc::new(test_clock()),
    );
    ScanCoordinator::new(env, &CoordinatorConfig::default())
}

async fn run(console: &Console<'_>, line: &str) -> Value {
    let output = console.execute_line(line).await.expect("console should not quit");
    serde_json::from_str(&output).unwrap_or_else(|_| Value::String(output))
}

#[tokio::test]
async fn demo_session() {
    let publisher = BroadcastPublisher::new(16);
    let mut events = publisher.subscribe();
    let coordinator = coordinator(publisher);
    let metrics = MetricsExporter::new();
    let console = Console::new(&coordinator, &metrics);

    let first = run(&console, "scan T-1002 DAY1 north-1").await;
    assert_eq!(first["valid"], true);
    assert_eq!(first["reason"], "VALID");
    assert_eq!(first["ticket_type"], "TWO_DAY");

    let repeat = run(&console, "scan T-1002 DAY1 north-2").await;
    assert_eq!(repeat["valid"], false);
    assert_eq!(repeat["reason"], "ALREADY_SCANNED");
    assert_eq!(repeat["message"], "Invalid Ticket QR Code");

    let wrong_day = run(&console, "scan T-1001 DAY1 north-1").await;
    assert_eq!(wrong_day["reason"], "NOT_VALID_FOR_DAY");

    let unknown = run(&console, "scan NOPE DAY1 north-1").await;
    assert_eq!(unknown["reason"], "TICKET_NOT_FOUND");

    let cancelled = run(&console, "cancel T-1005 ops customer refund").await;
    assert_eq!(cancelled, serde_json::json!({ "ok": true }));
    let again = run(&console, "cancel T-1005 ops customer refund").await;
    assert_eq!(again["error"], "ALREADY_CANCELLED");
    let refused = run(&console, "cancel T-1002 ops refund").await;
    assert_eq!(refused["error"], "TICKET_SCANNED");

    let after_cancel = run(&console, "scan T-1005 DAY1 north-1").await;
    assert_eq!(after_cancel["reason"], "TICKET_CANCELLED");

    let admitted = events.recv().await.unwrap();
    assert_eq!(admitted.event_type(), "ticket_admitted");
    assert_eq!(events.recv().await.unwrap().event_type(), "ticket_cancelled");
}

#[tokio::test]
async fn console_reports_errors_and_quits() {
    let coordinator = coordinator(BroadcastPublisher::new(4));
    let metrics = MetricsExporter::new();
    let console = Console::new(&coordinator, &metrics);

    let bad = console.execute_line("scan T-1002 SUNDAY g").await.unwrap();
    assert!(bad.starts_with("error: invalid day"));
    assert_eq!(console.execute_line("").await, Some(String::new()));
    assert_eq!(
        console.execute_line("metrics").await.as_deref(),
        Some("metrics recorder not installed")
    );
    assert!(console.execute_line("help").await.unwrap().contains("scan <ticket_id>"));
    assert_eq!(console.execute_line("quit").await, None);
}
