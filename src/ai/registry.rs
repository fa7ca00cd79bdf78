//! Provider Registry
//!
//! Configuration holder for the provider fleet. Loaded once at startup from
//! the config file plus environment credentials; after that the only
//! mutation is enabling/disabling instances by name.
//!
//! Initialization fails soft: entries with a missing credential or an
//! unparseable family are logged and excluded rather than failing startup.
//! With zero usable providers the registry simply reports an empty active
//! list and the fallback manager returns "no providers available".

use std::sync::RwLock;

use tracing::{info, warn};

use super::provider::{ProviderConfig, ProviderFamily};
use crate::config::ProviderEntry;

pub struct ProviderRegistry {
    inner: RwLock<Vec<ProviderConfig>>,
}

impl ProviderRegistry {
    /// Build the registry from config entries, excluding unusable ones.
    pub fn from_entries(entries: &[ProviderEntry]) -> Self {
        let mut configs = Vec::new();

        for entry in entries {
            match ProviderConfig::from_entry(entry) {
                Ok(Some(config)) => {
                    info!(
                        provider = %config.name,
                        family = %config.family,
                        priority = config.priority,
                        "Registered provider"
                    );
                    configs.push(config);
                }
                Ok(None) => {
                    warn!(
                        provider = %entry.name,
                        env = %entry.api_key_env,
                        "Skipping provider: credential not set"
                    );
                }
                Err(e) => {
                    warn!(provider = %entry.name, "Skipping provider: {}", e);
                }
            }
        }

        if configs.is_empty() {
            warn!("No usable providers configured; all AI calls will degrade");
        }

        Self::from_configs(configs)
    }

    /// Build directly from resolved configs (used by tests and embedders)
    pub fn from_configs(mut configs: Vec<ProviderConfig>) -> Self {
        // Priority is the fallback order; name breaks ties so the order
        // stays total
        configs.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        Self {
            inner: RwLock::new(configs),
        }
    }

    /// Active providers in fallback order
    pub fn list_active(&self) -> Vec<ProviderConfig> {
        self.read().iter().filter(|p| p.active).cloned().collect()
    }

    /// All providers of one family, in fallback order, active or not
    pub fn list_by_family(&self, family: ProviderFamily) -> Vec<ProviderConfig> {
        self.read()
            .iter()
            .filter(|p| p.family == family)
            .cloned()
            .collect()
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<ProviderConfig> {
        self.read().iter().find(|p| p.name == name).cloned()
    }

    /// All registered providers in fallback order
    pub fn list_all(&self) -> Vec<ProviderConfig> {
        self.read().clone()
    }

    /// Enable a provider by name. Idempotent; unknown names are logged, not fatal.
    pub fn enable(&self, name: &str) {
        self.set_active(name, true);
    }

    /// Disable a provider by name. Idempotent; unknown names are logged, not fatal.
    pub fn disable(&self, name: &str) {
        self.set_active(name, false);
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    fn set_active(&self, name: &str, active: bool) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.iter_mut().find(|p| p.name == name) {
            Some(provider) => {
                if provider.active != active {
                    provider.active = active;
                    info!(provider = %name, active, "Provider toggled");
                }
            }
            None => {
                warn!(provider = %name, "Enable/disable ignored: unknown provider");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ProviderConfig>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
