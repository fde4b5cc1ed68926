//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! Provides file-based sources (YAML, JSON, TOML) gated by feature flags,
//! the [`DefaultSource`] used when no config file exists, and the
//! [`parse_config_str`] helper for format-specific deserialization.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::model::TraceabilityConfig;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::TraceabilityError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<TraceabilityConfig, TraceabilityError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => {
            serde_yml::from_str(content).map_err(|e| TraceabilityError::ConfigParse {
                path: path_display.to_string(),
                source: Box::new(e),
            })
        }

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| TraceabilityError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| TraceabilityError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(TraceabilityError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Built-in defaults, used when no config file is present.
pub struct DefaultSource;

#[async_trait]
impl ConfigSource for DefaultSource {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn load(&self) -> Result<(TraceabilityConfig, ConfigVersion), TraceabilityError> {
        Ok((TraceabilityConfig::default(), ConfigVersion::Default))
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, TraceabilityError> {
        Ok(*current != ConfigVersion::Default)
    }
}
