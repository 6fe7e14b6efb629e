//! Admission gate console.
//!
//! Reads commands from stdin and prints JSON responses. See [`admission_gate::console`].

use admission_core::TicketTypeRegistry;
use admission_core::environment::{Clock, SystemClock};
use admission_core::notify::AdmissionEvent;
use admission_gate::{Console, GateConfig, TracingAuditLog, tickets_from_json_file};
use admission_runtime::metrics::MetricsExporter;
use admission_runtime::{AdmissionEnvironment, BroadcastPublisher, ScanCoordinator};
use admission_testing::InMemoryTicketStore;
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admission=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting admission gate");

    // Load configuration
    let config = GateConfig::from_env().context("invalid configuration")?;
    info!(
        policy_file = ?config.policy_file,
        tickets_file = ?config.tickets_file,
        lock_timeout = ?config.coordinator.lock_timeout,
        store_timeout = ?config.coordinator.store_timeout,
        "Configuration loaded"
    );

    let registry = match &config.policy_file {
        Some(path) => TicketTypeRegistry::from_json_file(path)
            .with_context(|| format!("failed to load policies from {}", path.display()))?,
        None => TicketTypeRegistry::builtin(),
    };
    info!(ticket_types = registry.len(), "Ticket type registry ready");

    let clock = Arc::new(SystemClock);
    let store = InMemoryTicketStore::new();
    if let Some(path) = &config.tickets_file {
        let tickets = tickets_from_json_file(path, &registry, clock.now())
            .with_context(|| format!("failed to seed tickets from {}", path.display()))?;
        for ticket in tickets {
            store.insert(ticket);
        }
    }
    info!(tickets = store.len(), "Ticket store seeded");

    let mut metrics = MetricsExporter::new();
    metrics.install().context("failed to install metrics recorder")?;

    let publisher = BroadcastPublisher::new(config.notify_capacity);
    let notifications = tokio::spawn(log_notifications(publisher.subscribe()));

    let env = AdmissionEnvironment::new(
        Arc::new(store),
        Arc::new(registry),
        Arc::new(TracingAuditLog),
        Arc::new(publisher),
        clock,
    );
    let coordinator = ScanCoordinator::new(env, &config.coordinator);
    let console = Console::new(&coordinator, &metrics);

    info!("Gate ready; type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        let Some(output) = console.execute_line(&line).await else {
            break;
        };
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    // Dropping the coordinator drops the publisher, which closes the channel.
    drop(console);
    drop(coordinator);
    notifications.await.context("notification task failed")?;

    info!("Gate stopped");
    Ok(())
}

async fn log_notifications(mut rx: broadcast::Receiver<AdmissionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                info!(
                    target: "admission::notify",
                    event_type = event.event_type(),
                    ticket_id = %event.ticket_id(),
                    %payload,
                    "Admission event"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification consumer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
