//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Credentials are never stored in files: each provider entry names an
//! environment variable and the key is resolved at startup.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// AI provider instances, in no particular order (priority decides)
    pub providers: Vec<ProviderEntry>,

    /// Outbound concurrency gate
    pub limiter: LimiterConfig,

    /// Response cache settings
    pub cache: CacheConfig,

    /// Fallback manager settings
    pub fallback: FallbackConfig,

    /// Formatting policy
    pub format: FormatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            providers: ProviderEntry::default_set(),
            limiter: LimiterConfig::default(),
            cache: CacheConfig::default(),
            fallback: FallbackConfig::default(),
            format: FormatConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `BoardError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.limiter.max_concurrent == 0 {
            return Err(crate::types::BoardError::Config(
                "limiter.max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(crate::types::BoardError::Config(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for entry in &self.providers {
            if entry.name.trim().is_empty() {
                return Err(crate::types::BoardError::Config(
                    "provider entries must have a non-empty name".to_string(),
                ));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(crate::types::BoardError::Config(format!(
                    "duplicate provider name: {}",
                    entry.name
                )));
            }
            if entry.timeout_secs == 0 {
                return Err(crate::types::BoardError::Config(format!(
                    "provider {}: timeout_secs must be greater than 0",
                    entry.name
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Provider Entries
// =============================================================================

/// One configured provider instance.
///
/// Several entries of the same family may coexist (distinct credentials for
/// load distribution); priority alone decides fallback order, ties broken by
/// name so the ordering stays total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    /// Unique instance name, e.g. "gemini-primary"
    pub name: String,

    /// Vendor family: "gemini" or "groq"
    pub family: String,

    /// Model override (adapter default used when absent)
    pub model: Option<String>,

    /// Lower is tried first
    pub priority: u32,

    pub active: bool,

    /// Environment variable holding the API key. Entries whose variable is
    /// unset are excluded from the active list at startup, not fatal.
    pub api_key_env: String,

    /// API base URL override (for proxies and compatible endpoints)
    pub api_base: Option<String>,

    /// Per-request HTTP timeout
    pub timeout_secs: u64,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            family: "gemini".to_string(),
            model: None,
            priority: 100,
            active: true,
            api_key_env: String::new(),
            api_base: None,
            timeout_secs: constants::adapter::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ProviderEntry {
    /// The out-of-the-box provider set: one Gemini instance and one Groq
    /// instance, keyed off the conventional environment variables.
    pub fn default_set() -> Vec<Self> {
        vec![
            Self {
                name: "gemini-primary".to_string(),
                family: "gemini".to_string(),
                priority: 0,
                api_key_env: "GEMINI_API_KEY".to_string(),
                ..Self::default()
            },
            Self {
                name: "groq-primary".to_string(),
                family: "groq".to_string(),
                priority: 10,
                api_key_env: "GROQ_API_KEY".to_string(),
                ..Self::default()
            },
        ]
    }
}

// =============================================================================
// Subsystem Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Maximum concurrent outbound AI calls, process-wide
    pub max_concurrent: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: constants::limiter::MAX_CONCURRENT_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// LRU capacity in entries
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: constants::cache::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// How long a provider stays excluded after a quota/rate failure
    pub cooldown_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: constants::fallback::COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// When true, assignments/notes/presentations prompts also request a
    /// structured description (deadline, venue, requirements). When false
    /// those categories carry a title only.
    pub describe_coursework: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            describe_coursework: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.limiter.max_concurrent, 10);
    }

    #[test]
    fn test_duplicate_provider_names_rejected() {
        let mut config = Config::default();
        config.providers.push(config.providers[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.limiter.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_priorities_order_gemini_first() {
        let config = Config::default();
        let gemini = config
            .providers
            .iter()
            .find(|p| p.family == "gemini")
            .unwrap();
        let groq = config.providers.iter().find(|p| p.family == "groq").unwrap();
        assert!(gemini.priority < groq.priority);
    }
}
