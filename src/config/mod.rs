//! Configuration
//!
//! Layered configuration (defaults, TOML files, environment) for providers,
//! the rate limiter, the cache, and formatting policy.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    CacheConfig, Config, FallbackConfig, FormatConfig, LimiterConfig, ProviderEntry,
};
