//! Prometheus metrics for the admission engine.
//!
//! The coordinator records through the `metrics` facade; nothing is exported until a
//! recorder is installed with [`MetricsExporter::install`]. Without one, recording is
//! a no-op, which is what tests rely on.
//!
//! # Example
//!
//! ```rust,no_run
//! use admission_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Admission attempts, labelled by `outcome` (reason code).
pub const SCANS_TOTAL: &str = "admission_scans_total";
/// End-to-end `attempt_scan` latency.
pub const SCAN_DURATION: &str = "admission_scan_duration_seconds";
/// Time a ticket lock was held.
pub const LOCK_HOLD_DURATION: &str = "admission_lock_hold_duration_seconds";
/// Lock acquisitions that timed out.
pub const LOCK_TIMEOUTS_TOTAL: &str = "admission_lock_timeouts_total";
/// Conditional writes that lost a race.
pub const COMMIT_CONFLICTS_TOTAL: &str = "admission_commit_conflicts_total";
/// Cancellation requests, labelled by `outcome`.
pub const CANCELLATIONS_TOTAL: &str = "admission_cancellations_total";
/// Audit appends that failed.
pub const AUDIT_FAILURES_TOTAL: &str = "admission_audit_failures_total";
/// Notifications that could not be enqueued.
pub const PUBLISH_FAILURES_TOTAL: &str = "admission_publish_failures_total";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder installed for this process.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed. A
    /// recorder that is already installed is tolerated with a warning.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the exporter has not been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(SCANS_TOTAL, "Admission attempts by outcome");
    describe_histogram!(SCAN_DURATION, "End-to-end admission attempt latency");
    describe_histogram!(LOCK_HOLD_DURATION, "Time a per-ticket lock was held");
    describe_counter!(LOCK_TIMEOUTS_TOTAL, "Ticket lock acquisitions that timed out");
    describe_counter!(COMMIT_CONFLICTS_TOTAL, "Conditional writes rejected by a version conflict");
    describe_counter!(CANCELLATIONS_TOTAL, "Cancellation requests by outcome");
    describe_counter!(AUDIT_FAILURES_TOTAL, "Audit entries that could not be recorded");
    describe_counter!(PUBLISH_FAILURES_TOTAL, "Admission events that could not be published");
}

pub(crate) fn record_scan(outcome: &'static str, elapsed: Duration) {
    counter!(SCANS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(SCAN_DURATION).record(elapsed.as_secs_f64());
}

pub(crate) fn record_lock_hold(held: Duration) {
    histogram!(LOCK_HOLD_DURATION).record(held.as_secs_f64());
}

pub(crate) fn record_lock_timeout() {
    counter!(LOCK_TIMEOUTS_TOTAL).increment(1);
}

pub(crate) fn record_commit_conflict() {
    counter!(COMMIT_CONFLICTS_TOTAL).increment(1);
}

pub(crate) fn record_cancellation(outcome: &'static str) {
    counter!(CANCELLATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_audit_failure() {
    counter!(AUDIT_FAILURES_TOTAL).increment(1);
}

pub(crate) fn record_publish_failure() {
    counter!(PUBLISH_FAILURES_TOTAL).increment(1);
}
