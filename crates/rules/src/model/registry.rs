//! Registry of named model settings.

use std::collections::HashMap;
use std::sync::RwLock;

use fieldrules_core::EngineConfig;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::schema::ChangePolicy;

use super::settings::ModelSettings;

/// Holds registered [`ModelSettings`] by name.
///
/// Lookups hand out independent copies, never the registered instance.
/// Settings registered without a default change policy receive the
/// registry's.
#[derive(Debug)]
pub struct ModelSettingsRegistry {
    settings: RwLock<HashMap<String, ModelSettings>>,
    default_policy: ChangePolicy,
}

impl Default for ModelSettingsRegistry {
    fn default() -> Self {
        Self::with_config(&EngineConfig::default())
    }
}

impl ModelSettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
            default_policy: ChangePolicy::from_config(config),
        }
    }

    /// Register settings under their own name.
    pub fn register(&self, mut settings: ModelSettings) -> Result<()> {
        let name = settings.name().to_string();
        if name.trim().is_empty() {
            return Err(RuleError::EmptySettingsName);
        }

        let mut guard = self.settings.write().expect("settings registry lock poisoned");
        if guard.contains_key(&name) {
            return Err(RuleError::DuplicateSettings(name));
        }
        if settings.default_policy().is_none() {
            settings.set_default_policy(self.default_policy);
        }
        debug!(settings = %name, properties = settings.properties().len(), "registered model settings");
        guard.insert(name, settings);
        Ok(())
    }

    /// Fresh copy of the named settings, or `None` if unregistered.
    pub fn get(&self, name: &str) -> Option<ModelSettings> {
        self.settings
            .read()
            .expect("settings registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<ModelSettings> {
        self.get(name)
            .ok_or_else(|| RuleError::SettingsNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.settings
            .read()
            .expect("settings registry lock poisoned")
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .settings
            .read()
            .expect("settings registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
