//! Ticket type registry: the admission policy for each ticket category.
//!
//! The registry is built once at process start (either from the built-in defaults or
//! from a JSON policy file) and is read-only afterwards. Share it behind an `Arc`.
//!
//! # Policy file format
//!
//! ```json
//! {
//!   "SINGLE_DAY": { "allowed_days": ["DAY2"], "max_scans": 1 },
//!   "TWO_DAY":    { "allowed_days": ["DAY1", "DAY2"], "max_scans": 2 }
//! }
//! ```

use crate::types::{EventDay, TicketType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

/// Errors raised while building or querying the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No policy is registered for this ticket type.
    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(TicketType),

    /// A policy failed validation at load time.
    #[error("Invalid policy for {ticket_type}: {reason}")]
    InvalidPolicy {
        /// The offending ticket type
        ticket_type: TicketType,
        /// Why the policy was rejected
        reason: String,
    },

    /// The policy document could not be parsed.
    #[error("Failed to parse policy document: {0}")]
    Parse(String),

    /// The policy file could not be read.
    #[error("Failed to read policy file: {0}")]
    Io(String),
}

/// Admission policy for one ticket type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeConfig {
    /// Days this type may be used on
    pub allowed_days: BTreeSet<EventDay>,
    /// Maximum total admissions across all days (may be below `allowed_days.len()`)
    pub max_scans: u32,
}

impl TicketTypeConfig {
    /// Create a policy.
    #[must_use]
    pub fn new(allowed_days: impl IntoIterator<Item = EventDay>, max_scans: u32) -> Self {
        Self {
            allowed_days: allowed_days.into_iter().collect(),
            max_scans,
        }
    }

    /// Whether this policy admits on `day` at all.
    #[must_use]
    pub fn allows(&self, day: EventDay) -> bool {
        self.allowed_days.contains(&day)
    }

    fn validate(&self, ticket_type: TicketType) -> Result<(), RegistryError> {
        if self.allowed_days.is_empty() {
            return Err(RegistryError::InvalidPolicy {
                ticket_type,
                reason: "allowed_days must not be empty".to_string(),
            });
        }
        if self.max_scans == 0 {
            return Err(RegistryError::InvalidPolicy {
                ticket_type,
                reason: "max_scans must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Read-only mapping from ticket type to policy.
#[derive(Clone, Debug)]
pub struct TicketTypeRegistry {
    policies: HashMap<TicketType, TicketTypeConfig>,
}

impl TicketTypeRegistry {
    /// Build a registry from explicit policies.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPolicy`] if any policy has no days or a zero cap.
    pub fn new(
        policies: impl IntoIterator<Item = (TicketType, TicketTypeConfig)>,
    ) -> Result<Self, RegistryError> {
        let policies: HashMap<_, _> = policies.into_iter().collect();
        for (ticket_type, policy) in &policies {
            policy.validate(*ticket_type)?;
        }
        Ok(Self { policies })
    }

    /// Built-in policies for the standard three-day event.
    #[must_use]
    pub fn builtin() -> Self {
        use EventDay::{Day1, Day2, Day3};

        let policies = HashMap::from([
            (TicketType::SingleDay, TicketTypeConfig::new([Day2], 1)),
            (TicketType::TwoDay, TicketTypeConfig::new([Day1, Day2], 2)),
            (TicketType::FlexPass, TicketTypeConfig::new([Day1, Day2, Day3], 2)),
            (TicketType::FullPass, TicketTypeConfig::new([Day1, Day2, Day3], 3)),
        ]);
        Self { policies }
    }

    /// Parse a JSON policy document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] on malformed JSON or unknown codes, and
    /// [`RegistryError::InvalidPolicy`] if a policy fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let policies: HashMap<TicketType, TicketTypeConfig> =
            serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Self::new(policies)
    }

    /// Load a JSON policy document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read, otherwise the
    /// errors of [`TicketTypeRegistry::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Policy for `ticket_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTicketType`] if the type is not registered.
    pub fn policy_for(&self, ticket_type: TicketType) -> Result<&TicketTypeConfig, RegistryError> {
        self.policies
            .get(&ticket_type)
            .ok_or(RegistryError::UnknownTicketType(ticket_type))
    }

    /// Number of registered ticket types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no ticket types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for TicketTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn builtin_covers_every_type() {
        let registry = TicketTypeRegistry::builtin();
        for ticket_type in TicketType::ALL {
            assert!(registry.policy_for(ticket_type).is_ok());
        }
        let single = registry.policy_for(TicketType::SingleDay).unwrap();
        assert!(single.allows(EventDay::Day2));
        assert!(!single.allows(EventDay::Day1));
    }

    #[test]
    fn partial_pass_caps_below_day_count() {
        let registry = TicketTypeRegistry::builtin();
        let flex = registry.policy_for(TicketType::FlexPass).unwrap();
        assert!(usize::try_from(flex.max_scans).unwrap() < flex.allowed_days.len());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry =
            TicketTypeRegistry::new([(TicketType::TwoDay, TicketTypeConfig::new([EventDay::Day1], 1))])
                .unwrap();
        assert_eq!(
            registry.policy_for(TicketType::FullPass),
            Err(RegistryError::UnknownTicketType(TicketType::FullPass))
        );
    }

    #[test]
    fn loads_json_document() {
        let registry = TicketTypeRegistry::from_json_str(
            r#"{
                "SINGLE_DAY": { "allowed_days": ["DAY1"], "max_scans": 1 },
                "TWO_DAY": { "allowed_days": ["DAY1", "DAY3"], "max_scans": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.policy_for(TicketType::TwoDay).unwrap().allows(EventDay::Day3));
    }

    #[test]
    fn rejects_zero_cap_and_empty_days() {
        let zero = TicketTypeRegistry::from_json_str(
            r#"{ "FULL_PASS": { "allowed_days": ["DAY1"], "max_scans": 0 } }"#,
        );
        assert!(matches!(zero, Err(RegistryError::InvalidPolicy { .. })));

        let empty = TicketTypeRegistry::from_json_str(
            r#"{ "FULL_PASS": { "allowed_days": [], "max_scans": 1 } }"#,
        );
        assert!(matches!(empty, Err(RegistryError::InvalidPolicy { .. })));
    }

    #[test]
    fn rejects_unknown_codes() {
        let result = TicketTypeRegistry::from_json_str(
            r#"{ "VIP": { "allowed_days": ["DAY1"], "max_scans": 1 } }"#,
        );
        assert!(matches!(result, Err(RegistryError::Parse(_))));
    }
}
