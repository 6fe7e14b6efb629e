//! Audit sink that writes entries to the structured log.

use admission_core::audit::{AuditEntry, AuditError, AuditLog, AuditSource};
use std::future::Future;
use std::pin::Pin;

/// [`AuditLog`] emitting one `tracing` event per entry under the `admission::audit`
/// target, so audit lines can be routed separately with `RUST_LOG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn append(
        &self,
        entry: AuditEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + '_>> {
        Box::pin(async move {
            let (source_kind, source_id) = match &entry.source {
                AuditSource::Terminal(terminal) => ("terminal", terminal.as_str()),
                AuditSource::Operator(actor) => ("operator", actor.as_str()),
            };
            tracing::info!(
                target: "admission::audit",
                entry_id = %entry.entry_id,
                ticket_id = %entry.ticket_id,
                action = ?entry.action,
                reason = %entry.reason,
                source_kind,
                source_id,
                recorded_at = %entry.recorded_at,
                "audit"
            );
            Ok(())
        })
    }
}
