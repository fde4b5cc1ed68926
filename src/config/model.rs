//! Serde data structures for the `traceability` configuration unit.
//!
//! [`TraceabilityConfig`] derives `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing. A missing `enabled` key
//! means the handler is on.

use serde::{Deserialize, Serialize};

/// Name of the configuration unit, also used as the module registry key.
pub const CONFIG_NAME: &str = "traceability";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TraceabilityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TraceabilityConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl TraceabilityConfig {
    /// Key/value view of the config, as published to the module registry.
    #[must_use]
    pub fn mapped(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_enabled_defaults_to_true() {
        let config: TraceabilityConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<TraceabilityConfig>(r#"{"enable": false}"#);
        assert!(result.is_err());
    }

    #[test]
    fn mapped_exposes_enabled_flag() {
        let config = TraceabilityConfig { enabled: false };
        assert_eq!(config.mapped(), serde_json::json!({ "enabled": false }));
    }
}
