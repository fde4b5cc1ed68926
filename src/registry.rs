//! Module registry for operational introspection.
//!
//! Middleware stages publish their name, implementing type, and current
//! config here at startup and again after every reload. The registry is
//! read by the `GET /modules` endpoint. Config keys listed as masks are
//! replaced with `"*"` before the snapshot is stored.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

const MASK: &str = "*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub class: String,
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masks: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<String, ModuleInfo>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module, replacing any earlier entry under the same name.
    pub fn register_module(
        &self,
        name: &str,
        class: &str,
        config: serde_json::Value,
        masks: Option<Vec<String>>,
    ) {
        let config = match masks.as_deref() {
            Some(keys) => mask_keys(config, keys),
            None => config,
        };
        let info = ModuleInfo {
            name: name.to_string(),
            class: class.to_string(),
            config,
            masks,
        };
        tracing::debug!(module = %name, class = %class, "module registered");
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), info);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ModuleInfo> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All registered modules, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ModuleInfo> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

fn mask_keys(mut config: serde_json::Value, keys: &[String]) -> serde_json::Value {
    if let Some(map) = config.as_object_mut() {
        for key in keys {
            if let Some(value) = map.get_mut(key) {
                *value = serde_json::Value::String(MASK.to_string());
            }
        }
    }
    config
}
