//! Line-oriented operator console.
//!
//! One command per line:
//!
//! ```text
//! scan <ticket_id> <DAY1|DAY2|DAY3> <terminal_id>
//! cancel <ticket_id> <actor> <reason...>
//! metrics
//! help
//! quit
//! ```
//!
//! Scan and cancel print their JSON response; `metrics` prints the Prometheus text
//! rendering.

use admission_core::types::{ActorId, EventDay, TerminalId, TicketId};
use admission_runtime::metrics::MetricsExporter;
use admission_runtime::{CancelRequest, ScanCoordinator, ScanRequest};
use thiserror::Error;

/// Usage text printed by `help`.
pub const USAGE: &str = "\
commands:
  scan <ticket_id> <DAY1|DAY2|DAY3> <terminal_id>
  cancel <ticket_id> <actor> <reason...>
  metrics
  help
  quit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Attempt an admission
    Scan(ScanRequest),
    /// Cancel a ticket
    Cancel(CancelRequest),
    /// Dump metrics
    Metrics,
    /// Print usage
    Help,
    /// Leave the console
    Quit,
}

/// Why a line is not a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a command
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Wrong arguments for a known command
    #[error("usage: {0}")]
    Usage(&'static str),

    /// An argument does not parse
    #[error("invalid {what}: {value}")]
    Invalid {
        /// Which argument
        what: &'static str,
        /// Offending text
        value: String,
    },
}

impl Command {
    /// Parse one console line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for blank lines, unknown commands, and bad arguments.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };

        match verb.to_ascii_lowercase().as_str() {
            "scan" => {
                let (Some(ticket), Some(day), Some(terminal), None) =
                    (words.next(), words.next(), words.next(), words.next())
                else {
                    return Err(CommandError::Usage("scan <ticket_id> <day> <terminal_id>"));
                };
                let day: EventDay = day.parse().map_err(|_| CommandError::Invalid {
                    what: "day",
                    value: day.to_string(),
                })?;
                Ok(Self::Scan(ScanRequest {
                    ticket_id: TicketId::new(ticket),
                    day,
                    terminal_id: TerminalId::new(terminal),
                }))
            }
            "cancel" => {
                let (Some(ticket), Some(actor)) = (words.next(), words.next()) else {
                    return Err(CommandError::Usage("cancel <ticket_id> <actor> <reason...>"));
                };
                let reason = words.collect::<Vec<_>>().join(" ");
                if reason.is_empty() {
                    return Err(CommandError::Usage("cancel <ticket_id> <actor> <reason...>"));
                }
                Ok(Self::Cancel(CancelRequest {
                    ticket_id: TicketId::new(ticket),
                    reason,
                    actor: ActorId::new(actor),
                }))
            }
            "metrics" => Ok(Self::Metrics),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Executes console commands against a coordinator.
pub struct Console<'a> {
    coordinator: &'a ScanCoordinator,
    metrics: &'a MetricsExporter,
}

impl<'a> Console<'a> {
    /// Create a console.
    #[must_use]
    pub const fn new(coordinator: &'a ScanCoordinator, metrics: &'a MetricsExporter) -> Self {
        Self {
            coordinator,
            metrics,
        }
    }

    /// Run one command and return the text to print, or `None` to quit.
    pub async fn execute(&self, command: Command) -> Option<String> {
        let output = match command {
            Command::Scan(request) => {
                to_json(&self.coordinator.handle_scan(&request).await)
            }
            Command::Cancel(request) => {
                to_json(&self.coordinator.handle_cancel(&request).await)
            }
            Command::Metrics => self
                .metrics
                .render()
                .unwrap_or_else(|| "metrics recorder not installed".to_string()),
            Command::Help => USAGE.to_string(),
            Command::Quit => return None,
        };
        Some(output)
    }

    /// Parse and run one line. Parse errors are reported as output.
    pub async fn execute_line(&self, line: &str) -> Option<String> {
        match Command::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(CommandError::Empty) => Some(String::new()),
            Err(err) => Some(format!("error: {err}")),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("error: {e}"))
}
