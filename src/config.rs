//! Controller configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::request::{RequestStatus, StatusNormalizer};
use crate::error::{ClubdeskError, Result};

/// Configuration for the lifecycle controller.
///
/// Every field has a default, so a partial document (or `{}`) deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Legacy status strings specific to this deployment, on top of the built-in table.
    /// Keys are matched case-insensitively; values are canonical snake-case names.
    pub extra_status_aliases: HashMap<String, RequestStatus>,

    /// Append a history entry with every committed transition
    pub record_history: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            extra_status_aliases: HashMap::new(),
            record_history: true,
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject aliases that fold to the same key but name different statuses.
    ///
    /// A normalizer built from such a config ignores the ambiguous keys.
    pub fn validate(&self) -> Result<()> {
        let conflicts = StatusNormalizer::conflicting_aliases(self.alias_pairs());
        if conflicts.is_empty() {
            return Ok(());
        }
        Err(ClubdeskError::InvalidConfig(format!(
            "extra_status_aliases map {} to more than one status",
            conflicts
                .iter()
                .map(|key| format!("'{}'", key))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Normalizer for this deployment's status vocabulary.
    pub fn normalizer(&self) -> StatusNormalizer {
        StatusNormalizer::with_aliases(self.alias_pairs())
    }

    fn alias_pairs(&self) -> impl Iterator<Item = (&str, RequestStatus)> {
        self.extra_status_aliases
            .iter()
            .map(|(alias, status)| (alias.as_str(), *status))
    }
}
