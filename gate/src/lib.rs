//! Gate console for the admission engine.
//!
//! Wires the scan coordinator to an in-memory ticket store seeded from JSON, a
//! broadcast notification channel, and a Prometheus recorder, and drives it from a
//! line-oriented operator console.

pub mod audit;
pub mod config;
pub mod console;
pub mod seed;

pub use audit::TracingAuditLog;
pub use config::GateConfig;
pub use console::{Command, CommandError, Console};
pub use seed::{SeedError, tickets_from_json_file, tickets_from_json_str};
