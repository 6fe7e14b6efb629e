//! Scan coordinator: the concurrency-safe entry point for admissions and cancellations.
//!
//! Every operation on a ticket runs its read-decide-write sequence while holding that
//! ticket's lock from [`TicketLocks`], and commits with a version-checked write. The lock
//! gives per-ticket linearizability inside one process; the conditional write keeps
//! several coordinator processes sharing a store from losing updates (a lost race is
//! reloaded and re-decided, bounded by the commit retry policy).
//!
//! Side effects that must not influence a decision (audit entries, notifications) run
//! after the lock is released and after the commit succeeded. Their failures are logged
//! and counted, never returned. An audit append is bounded by the audit timeout, so a
//! stalled sink delays a response by at most that long.

use crate::config::CoordinatorConfig;
use crate::locks::{LockError, TicketLocks};
use crate::metrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use admission_core::audit::{AuditAction, AuditEntry, AuditLog, AuditSource};
use admission_core::environment::Clock;
use admission_core::lifecycle::{self, CancelDenial};
use admission_core::notify::{AdmissionEvent, EventPublisher};
use admission_core::registry::{RegistryError, TicketTypeRegistry};
use admission_core::store::{StoreError, TicketStore, Version, VersionedTicket};
use admission_core::types::{ActorId, EventDay, ScanEvent, TerminalId, Ticket, TicketId};
use admission_core::validation::{Decision, DenialReason, decide};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// System faults. Business denials are never errors; they are [`Decision::Denied`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The ticket's lock could not be acquired in time.
    #[error("Timed out after {waited:?} waiting for ticket {ticket_id}")]
    LockTimeout {
        /// Contended ticket
        ticket_id: TicketId,
        /// How long the caller waited
        waited: Duration,
    },

    /// A store call exceeded the store timeout. A write may or may not have landed.
    #[error("Store call timed out after {0:?}")]
    StoreTimeout(Duration),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The conditional write kept losing to another writer.
    #[error("Commit for ticket {ticket_id} kept conflicting with concurrent writers")]
    CommitConflict {
        /// Contended ticket
        ticket_id: TicketId,
    },

    /// The registry has no policy for a ticket's type.
    #[error("Configuration error: {0}")]
    Registry(#[from] RegistryError),
}

impl AdmissionError {
    /// Whether retrying the whole request may succeed.
    ///
    /// Configuration errors are not retryable: the outcome cannot change.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Registry(_))
    }

    /// Stable code for logs and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        if self.is_retryable() {
            "SYSTEM_ERROR"
        } else {
            "CONFIG_ERROR"
        }
    }

    /// Whether this is a lost conditional write.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::CommitConflict { .. })
    }
}

impl From<LockError> for AdmissionError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { ticket_id, waited } => Self::LockTimeout { ticket_id, waited },
        }
    }
}

/// Why a cancellation did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    /// No ticket with this id exists.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// The lifecycle rules refused.
    #[error(transparent)]
    Denied(#[from] CancelDenial),

    /// A system fault; retry the request.
    #[error(transparent)]
    System(#[from] AdmissionError),
}

impl CancelError {
    /// Whether retrying the whole request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Denied(_) => false,
            Self::System(err) => err.is_retryable(),
        }
    }

    const fn is_conflict(&self) -> bool {
        matches!(self, Self::System(err) if err.is_conflict())
    }

    /// Stable code for logs and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "TICKET_NOT_FOUND",
            Self::Denied(CancelDenial::AlreadyCancelled) => "ALREADY_CANCELLED",
            Self::Denied(CancelDenial::TicketUsed) => "TICKET_USED",
            Self::Denied(CancelDenial::TicketScanned) => "TICKET_SCANNED",
            Self::System(err) => err.code(),
        }
    }
}

/// Collaborators the coordinator depends on.
#[derive(Clone)]
pub struct AdmissionEnvironment {
    /// Durable ticket store
    pub store: Arc<dyn TicketStore>,
    /// Ticket type policies
    pub registry: Arc<TicketTypeRegistry>,
    /// Audit sink
    pub audit: Arc<dyn AuditLog>,
    /// Outbound notifications
    pub publisher: Arc<dyn EventPublisher>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl AdmissionEnvironment {
    /// Bundle the collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        registry: Arc<TicketTypeRegistry>,
        audit: Arc<dyn AuditLog>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            audit,
            publisher,
            clock,
        }
    }
}

/// What a single scan pass concluded.
enum ScanVerdict {
    Admitted {
        decision: Decision,
        remaining_scans: u32,
        at: DateTime<Utc>,
    },
    Denied(DenialReason),
}

/// Serializes admission attempts and cancellations per ticket.
pub struct ScanCoordinator {
    env: AdmissionEnvironment,
    locks: TicketLocks,
    store_timeout: Duration,
    audit_timeout: Duration,
    commit_retry: RetryPolicy,
}

impl ScanCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(env: AdmissionEnvironment, config: &CoordinatorConfig) -> Self {
        Self {
            env,
            locks: TicketLocks::new(config.lock_shards, config.lock_timeout),
            store_timeout: config.store_timeout,
            audit_timeout: config.audit_timeout,
            commit_retry: config.commit_retry_policy(),
        }
    }

    /// Ticket type registry in use.
    #[must_use]
    pub fn registry(&self) -> &TicketTypeRegistry {
        &self.env.registry
    }

    /// Decide and, if admitted, durably record a scan of `ticket_id` for `day`.
    ///
    /// For any (ticket, day) at most one call ever returns [`Decision::Valid`]; every
    /// concurrent or later call for the same pair returns `ALREADY_SCANNED` (or an
    /// earlier-ranked denial).
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on lock timeout, store failure or timeout, repeated
    /// commit conflicts, or a ticket type missing from the registry. Retrying the same
    /// request is safe: a write that landed before a store timeout surfaces as
    /// `ALREADY_SCANNED`, otherwise the attempt is reprocessed from scratch.
    #[tracing::instrument(
        skip_all,
        fields(ticket_id = %ticket_id, day = %day, terminal_id = %terminal_id)
    )]
    pub async fn attempt_scan(
        &self,
        ticket_id: &TicketId,
        day: EventDay,
        terminal_id: &TerminalId,
    ) -> Result<Decision, AdmissionError> {
        let started = Instant::now();
        let result = self.scan_exclusive(ticket_id, day, terminal_id).await;

        let outcome = match &result {
            Ok(decision) => {
                tracing::info!(outcome = decision.code(), "Admission decided");
                decision.code()
            }
            Err(err) => {
                tracing::warn!(error = %err, retryable = err.is_retryable(), "Admission failed");
                err.code()
            }
        };
        metrics::record_scan(outcome, started.elapsed());

        result
    }

    async fn scan_exclusive(
        &self,
        ticket_id: &TicketId,
        day: EventDay,
        terminal_id: &TerminalId,
    ) -> Result<Decision, AdmissionError> {
        let guard = self.locks.acquire(ticket_id).await.inspect_err(|_| {
            metrics::record_lock_timeout();
        })?;

        let verdict = retry_with_predicate(
            self.commit_retry.clone(),
            move || self.scan_once(ticket_id, day, terminal_id),
            AdmissionError::is_conflict,
        )
        .await;
        drop(guard);

        match verdict? {
            ScanVerdict::Admitted {
                decision,
                remaining_scans,
                at,
            } => {
                self.record_audit(AuditEntry::new(
                    ticket_id.clone(),
                    AuditAction::ScanAdmitted,
                    format!("{}:{day}", decision.code()),
                    AuditSource::Terminal(terminal_id.clone()),
                    at,
                ))
                .await;

                if let Decision::Valid { ticket_type } = decision {
                    self.publish(AdmissionEvent::TicketAdmitted {
                        ticket_id: ticket_id.clone(),
                        ticket_type,
                        day,
                        terminal_id: terminal_id.clone(),
                        remaining_scans,
                        at,
                    });
                }
                Ok(decision)
            }
            ScanVerdict::Denied(reason) => {
                self.record_audit(AuditEntry::new(
                    ticket_id.clone(),
                    AuditAction::ScanDenied,
                    format!("{reason}:{day}"),
                    AuditSource::Terminal(terminal_id.clone()),
                    self.env.clock.now(),
                ))
                .await;
                Ok(Decision::Denied { reason })
            }
        }
    }

    /// One read-decide-write pass. Must run under the ticket's lock.
    async fn scan_once(
        &self,
        ticket_id: &TicketId,
        day: EventDay,
        terminal_id: &TerminalId,
    ) -> Result<ScanVerdict, AdmissionError> {
        let Some(VersionedTicket {
            mut ticket,
            version,
        }) = self.load(ticket_id).await?
        else {
            return Ok(ScanVerdict::Denied(DenialReason::TicketNotFound));
        };

        self.env.registry.policy_for(ticket.ticket_type())?;

        let decision = decide(Some(&ticket), day);
        if let Decision::Denied { reason } = decision {
            return Ok(ScanVerdict::Denied(reason));
        }

        let at = self.env.clock.now();
        if let Err(rejected) = ticket.record_scan(ScanEvent {
            day,
            timestamp: at,
            terminal_id: terminal_id.clone(),
        }) {
            return Ok(ScanVerdict::Denied(rejected.reason));
        }
        let remaining_scans = ticket.remaining_scans();

        self.commit(ticket, version).await?;
        tracing::debug!(remaining_scans, "Scan committed");

        Ok(ScanVerdict::Admitted {
            decision,
            remaining_scans,
            at,
        })
    }

    /// Cancel `ticket_id` if the lifecycle rules allow it.
    ///
    /// Runs under the same per-ticket lock as scanning, so it cannot interleave with
    /// an in-flight scan commit. A second cancellation fails with
    /// [`CancelDenial::AlreadyCancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`CancelError::NotFound`] for unknown tickets, [`CancelError::Denied`]
    /// when the lifecycle refuses, and [`CancelError::System`] for system faults.
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id, actor = %actor))]
    pub async fn cancel_ticket(
        &self,
        ticket_id: &TicketId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<(), CancelError> {
        let result = self.cancel_exclusive(ticket_id, reason, actor).await;

        match &result {
            Ok(()) => {
                tracing::info!("Ticket cancelled");
                metrics::record_cancellation("CANCELLED");
            }
            Err(err) => {
                tracing::warn!(error = %err, code = err.code(), "Cancellation refused");
                metrics::record_cancellation(err.code());
            }
        }

        result
    }

    async fn cancel_exclusive(
        &self,
        ticket_id: &TicketId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<(), CancelError> {
        let guard = self
            .locks
            .acquire(ticket_id)
            .await
            .inspect_err(|_| metrics::record_lock_timeout())
            .map_err(AdmissionError::from)?;

        let result = retry_with_predicate(
            self.commit_retry.clone(),
            move || self.cancel_once(ticket_id, reason, actor),
            CancelError::is_conflict,
        )
        .await;
        drop(guard);

        let source = AuditSource::Operator(actor.clone());
        match result {
            Ok(at) => {
                self.record_audit(AuditEntry::new(
                    ticket_id.clone(),
                    AuditAction::TicketCancelled,
                    reason,
                    source,
                    at,
                ))
                .await;
                self.publish(AdmissionEvent::TicketCancelled {
                    ticket_id: ticket_id.clone(),
                    reason: reason.to_string(),
                    actor: actor.clone(),
                    at,
                });
                Ok(())
            }
            Err(err @ (CancelError::NotFound(_) | CancelError::Denied(_))) => {
                self.record_audit(AuditEntry::new(
                    ticket_id.clone(),
                    AuditAction::CancelRefused,
                    err.code(),
                    source,
                    self.env.clock.now(),
                ))
                .await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// One read-transition-write pass. Must run under the ticket's lock.
    async fn cancel_once(
        &self,
        ticket_id: &TicketId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<DateTime<Utc>, CancelError> {
        let Some(VersionedTicket { ticket, version }) = self.load(ticket_id).await? else {
            return Err(CancelError::NotFound(ticket_id.clone()));
        };

        let at = self.env.clock.now();
        let cancelled = lifecycle::cancel(&ticket, reason, actor.clone(), at)?;
        self.commit(cancelled, version).await?;
        Ok(at)
    }

    async fn load(&self, ticket_id: &TicketId) -> Result<Option<VersionedTicket>, AdmissionError> {
        self.bounded(self.env.store.load(ticket_id))
            .await?
            .map_err(AdmissionError::Store)
    }

    async fn commit(&self, ticket: Ticket, expected: Version) -> Result<Version, AdmissionError> {
        let ticket_id = ticket.ticket_id().clone();
        match self
            .bounded(self.env.store.compare_and_swap(ticket, expected))
            .await?
        {
            Ok(version) => Ok(version),
            Err(StoreError::ConcurrencyConflict { actual, .. }) => {
                metrics::record_commit_conflict();
                tracing::debug!(%expected, %actual, "Commit lost to a concurrent writer");
                Err(AdmissionError::CommitConflict { ticket_id })
            }
            Err(err) => Err(AdmissionError::Store(err)),
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Result<T, AdmissionError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| AdmissionError::StoreTimeout(self.store_timeout))
    }

    async fn record_audit(&self, entry: AuditEntry) {
        let action = entry.action;
        match tokio::time::timeout(self.audit_timeout, self.env.audit.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                metrics::record_audit_failure();
                tracing::error!(error = %err, ?action, "Failed to record audit entry");
            }
            Err(_) => {
                metrics::record_audit_failure();
                tracing::error!(
                    timeout = ?self.audit_timeout,
                    ?action,
                    "Audit entry abandoned after timeout"
                );
            }
        }
    }

    fn publish(&self, event: AdmissionEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.env.publisher.publish(event) {
            metrics::record_publish_failure();
            tracing::warn!(error = %err, event_type, "Admission event not published");
        }
    }
}
