//! Shared harness for coordinator integration tests.

#![allow(dead_code, clippy::panic)]

use admission_core::TicketTypeRegistry;
use admission_core::types::{Ticket, TicketId, TicketType};
use admission_runtime::{AdmissionEnvironment, CoordinatorConfig, ScanCoordinator};
use admission_testing::{
    InMemoryAuditLog, InMemoryTicketStore, RecordingPublisher, fixtures, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

/// A coordinator wired to in-memory collaborators that stay reachable for assertions.
pub struct Harness {
    pub coordinator: Arc<ScanCoordinator>,
    pub store: InMemoryTicketStore,
    pub audit: InMemoryAuditLog,
    pub publisher: RecordingPublisher,
}

/// Short timeouts and backoff so failure paths finish quickly.
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        lock_timeout: Duration::from_millis(500),
        store_timeout: Duration::from_millis(500),
        audit_timeout: Duration::from_millis(100),
        lock_shards: 8,
        commit_retries: 3,
        retry_initial_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(TicketTypeRegistry::builtin(), &fast_config())
    }

    pub fn with_config(config: &CoordinatorConfig) -> Self {
        Self::with(TicketTypeRegistry::builtin(), config)
    }

    pub fn with(registry: TicketTypeRegistry, config: &CoordinatorConfig) -> Self {
        admission_testing::init_test_tracing();

        let store = InMemoryTicketStore::new();
        let audit = InMemoryAuditLog::new();
        let publisher = RecordingPublisher::new();
        let env = AdmissionEnvironment::new(
            Arc::new(store.clone()),
            Arc::new(registry),
            Arc::new(audit.clone()),
            Arc::new(publisher.clone()),
            Arc::new(test_clock()),
        );

        Self {
            coordinator: Arc::new(ScanCoordinator::new(env, config)),
            store,
            audit,
            publisher,
        }
    }

    /// Seed a ticket with its built-in policy and return its id.
    pub fn issue(&self, id: &str, ticket_type: TicketType) -> TicketId {
        let ticket = fixtures::ticket(id, ticket_type);
        let ticket_id = ticket.ticket_id().clone();
        self.store.insert(ticket);
        ticket_id
    }

    /// Current stored state of a ticket.
    pub fn ticket(&self, id: &TicketId) -> Ticket {
        self.store
            .get(id)
            .unwrap_or_else(|| panic!("ticket {id} should exist"))
    }
}
