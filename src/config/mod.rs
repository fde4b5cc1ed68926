//! Configuration loading and hot-reloading.
//!
//! Defines the [`ConfigSource`] trait for pluggable config backends,
//! the [`ConfigResolver`] for primary/fallback source resolution, the
//! [`ConfigVersion`] enum for change detection, and [`ConfigHandle`],
//! the owned holder whose snapshot is swapped as a whole on reload.

pub mod model;
pub mod sources;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;

use crate::error::TraceabilityError;
use model::TraceabilityConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
    /// Built-in defaults, no backing document.
    Default,
}

impl ConfigVersion {
    /// Short form for display (first 8 hex chars of a hash).
    #[must_use]
    pub fn short(&self) -> String {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
            Self::Default => "default".to_string(),
        }
    }
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits (Rust 1.75+) does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(TraceabilityConfig, ConfigVersion), TraceabilityError>;
    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, TraceabilityError>;
}

pub struct ConfigResolver {
    primary: Box<dyn ConfigSource>,
    fallback: Option<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(primary: Box<dyn ConfigSource>, fallback: Option<Box<dyn ConfigSource>>) -> Self {
        Self { primary, fallback }
    }

    pub async fn load_with_fallback(
        &self,
    ) -> Result<(TraceabilityConfig, ConfigVersion), TraceabilityError> {
        match self.primary.load().await {
            Ok(result) => Ok(result),
            Err(primary_err) => {
                if let Some(ref fallback) = self.fallback {
                    tracing::warn!(
                        primary = self.primary.name(),
                        fallback = fallback.name(),
                        error = %primary_err,
                        "primary config source failed, using fallback"
                    );
                    fallback.load().await
                } else {
                    Err(primary_err)
                }
            }
        }
    }

    #[must_use]
    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    #[must_use]
    pub fn primary(&self) -> &dyn ConfigSource {
        &*self.primary
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<TraceabilityConfig>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

impl LoadedConfig {
    #[must_use]
    pub fn new(config: TraceabilityConfig, version: ConfigVersion, source_name: &str) -> Self {
        Self {
            config: Arc::new(config),
            version,
            source_name: source_name.to_string(),
            loaded_at: Instant::now(),
        }
    }
}

/// Owned, swappable configuration snapshot.
///
/// Readers clone the inner `Arc` and release the lock immediately, so a
/// reader always works on one complete snapshot even if a reload lands
/// mid-request.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<LoadedConfig>>,
}

impl ConfigHandle {
    #[must_use]
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(loaded)),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<LoadedConfig> {
        // The lock only guards an Arc swap; a poisoned lock still holds a valid snapshot.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn replace(&self, loaded: LoadedConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(loaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::DefaultSource;

    struct FailingSource;

    #[async_trait]
    impl ConfigSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn load(&self) -> Result<(TraceabilityConfig, ConfigVersion), TraceabilityError> {
            Err(TraceabilityError::UnsupportedFormat("broken".into()))
        }

        async fn has_changed(&self, _current: &ConfigVersion) -> Result<bool, TraceabilityError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn resolver_uses_fallback_when_primary_fails() {
        let resolver = ConfigResolver::new(Box::new(FailingSource), Some(Box::new(DefaultSource)));
        let (config, version) = resolver.load_with_fallback().await.unwrap();
        assert!(config.enabled);
        assert_eq!(version, ConfigVersion::Default);
    }

    #[tokio::test]
    async fn resolver_without_fallback_returns_primary_error() {
        let resolver = ConfigResolver::new(Box::new(FailingSource), None);
        assert!(resolver.load_with_fallback().await.is_err());
    }

    #[test]
    fn handle_replace_swaps_whole_snapshot() {
        let handle = ConfigHandle::new(LoadedConfig::new(
            TraceabilityConfig { enabled: true },
            ConfigVersion::Hash("aaaa".into()),
            "yaml",
        ));
        let before = handle.current();

        handle.replace(LoadedConfig::new(
            TraceabilityConfig { enabled: false },
            ConfigVersion::Hash("bbbb".into()),
            "yaml",
        ));

        // A snapshot taken before the swap is unaffected.
        assert!(before.config.enabled);
        assert_eq!(before.version, ConfigVersion::Hash("aaaa".into()));

        let after = handle.current();
        assert!(!after.config.enabled);
        assert_eq!(after.version, ConfigVersion::Hash("bbbb".into()));
    }

    #[test]
    fn short_version_truncates_hash() {
        assert_eq!(
            ConfigVersion::Hash("0123456789abcdef".into()).short(),
            "01234567"
        );
        assert_eq!(ConfigVersion::Default.short(), "default");
    }
}
