//! Ticket seed files.
//!
//! A seed file is a JSON array of tickets to issue at startup:
//!
//! ```json
//! [
//!   { "ticket_id": "T-1001", "ticket_type": "TWO_DAY" },
//!   { "ticket_id": "T-1002", "ticket_type": "FULL_PASS" }
//! ]
//! ```
//!
//! Each ticket is issued with the registry's policy for its type.

use admission_core::registry::{RegistryError, TicketTypeRegistry};
use admission_core::types::{Ticket, TicketId, TicketType};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors loading a seed file.
#[derive(Error, Debug)]
pub enum SeedError {
    /// The file could not be read.
    #[error("Failed to read ticket seed {path}: {source}")]
    Io {
        /// Seed file path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The document is not a valid seed.
    #[error("Failed to parse ticket seed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The same ticket id appears twice.
    #[error("Duplicate ticket id in seed: {0}")]
    Duplicate(TicketId),

    /// A ticket's type has no policy.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Deserialize)]
struct SeedTicket {
    ticket_id: TicketId,
    ticket_type: TicketType,
}

/// Issue every ticket in a JSON seed document.
///
/// # Errors
///
/// Returns [`SeedError`] on malformed JSON, duplicate ids, or a ticket type missing
/// from `registry`.
pub fn tickets_from_json_str(
    json: &str,
    registry: &TicketTypeRegistry,
    issued_at: DateTime<Utc>,
) -> Result<Vec<Ticket>, SeedError> {
    let entries: Vec<SeedTicket> = serde_json::from_str(json)?;
    let mut seen = HashSet::with_capacity(entries.len());

    entries
        .into_iter()
        .map(|entry| {
            if !seen.insert(entry.ticket_id.clone()) {
                return Err(SeedError::Duplicate(entry.ticket_id));
            }
            let policy = registry.policy_for(entry.ticket_type)?;
            Ok(Ticket::issue(entry.ticket_id, entry.ticket_type, policy, issued_at))
        })
        .collect()
}

/// Issue every ticket in a JSON seed file.
///
/// # Errors
///
/// Returns [`SeedError::Io`] if the file cannot be read, otherwise the errors of
/// [`tickets_from_json_str`].
pub fn tickets_from_json_file(
    path: impl AsRef<Path>,
    registry: &TicketTypeRegistry,
    issued_at: DateTime<Utc>,
) -> Result<Vec<Ticket>, SeedError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tickets_from_json_str(&contents, registry, issued_at)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use admission_core::registry::TicketTypeConfig;
    use admission_core::types::EventDay;

    #[test]
    fn issues_tickets_with_registry_policy() {
        let issued_at = Utc::now();
        let tickets = tickets_from_json_str(
            r#"[
                { "ticket_id": "T-1", "ticket_type": "SINGLE_DAY" },
                { "ticket_id": "T-2", "ticket_type": "FLEX_PASS" }
            ]"#,
            &TicketTypeRegistry::builtin(),
            issued_at,
        )
        .unwrap();

        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|ticket| ticket.issued_at() == issued_at));
        assert!(tickets[0].is_valid_for(EventDay::Day2));
        assert!(!tickets[0].is_valid_for(EventDay::Day1));
        assert_eq!(tickets[1].max_scans(), 2);
    }

    #[test]
    fn rejects_duplicates() {
        let result = tickets_from_json_str(
            r#"[
                { "ticket_id": "T-1", "ticket_type": "TWO_DAY" },
                { "ticket_id": "T-1", "ticket_type": "FULL_PASS" }
            ]"#,
            &TicketTypeRegistry::builtin(),
            Utc::now(),
        );
        assert!(matches!(result, Err(SeedError::Duplicate(id)) if id.as_str() == "T-1"));
    }

    #[test]
    fn rejects_types_missing_from_registry() {
        let registry = TicketTypeRegistry::new([(
            TicketType::TwoDay,
            TicketTypeConfig::new([EventDay::Day1], 1),
        )])
        .unwrap();
        let result = tickets_from_json_str(
            r#"[{ "ticket_id": "T-9", "ticket_type": "FULL_PASS" }]"#,
            &registry,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(SeedError::Registry(RegistryError::UnknownTicketType(TicketType::FullPass)))
        ));
    }

    #[test]
    fn rejects_unknown_ticket_type_codes() {
        let result = tickets_from_json_str(
            r#"[{ "ticket_id": "T-1", "ticket_type": "VIP" }]"#,
            &TicketTypeRegistry::builtin(),
            Utc::now(),
        );
        assert!(matches!(result, Err(SeedError::Parse(_))));
    }
}
