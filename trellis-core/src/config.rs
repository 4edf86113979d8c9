//! Runtime configuration.
//!
//! Each app carries a [`RuntimeConfig`]. It can be built in code or loaded from
//! a JSON document; missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Follow-up updates allowed for one component within a single flush.
pub const DEFAULT_MAX_RECURSIVE_UPDATES: usize = 100;

/// When component re-renders run after their dependencies change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Re-render immediately inside the triggering mutation.
    #[default]
    Sync,
    /// Queue the re-render until the host calls `flush`.
    Batched,
}

/// Settings read by the component scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Update flushing policy.
    pub flush: FlushMode,
    /// Cap on self-triggered follow-up updates before giving up with a warning.
    pub max_recursive_updates: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush: FlushMode::Sync,
            max_recursive_updates: DEFAULT_MAX_RECURSIVE_UPDATES,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Same config with a different flush mode.
    pub fn with_flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = RuntimeConfig::from_json(r#"{"flush": "batched"}"#).unwrap();
        assert_eq!(config.flush, FlushMode::Batched);
        assert_eq!(config.max_recursive_updates, DEFAULT_MAX_RECURSIVE_UPDATES);
    }

    #[test]
    fn rejects_unknown_flush_mode() {
        let err = RuntimeConfig::from_json(r#"{"flush": "eventually"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid runtime configuration"));
    }
}
