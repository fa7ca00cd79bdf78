//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Rate limiter constants
pub mod limiter {
    /// Maximum concurrent outbound AI calls across the whole process
    pub const MAX_CONCURRENT_REQUESTS: usize = 10;
}

/// Response cache constants
pub mod cache {
    /// Default LRU capacity (entries)
    pub const DEFAULT_CAPACITY: usize = 1024;
}

/// Fallback manager constants
pub mod fallback {
    /// Cooldown applied to a provider after a quota/rate failure (seconds)
    pub const COOLDOWN_SECS: u64 = 5;
}

/// Provider adapter constants
pub mod adapter {
    /// Maximum attempts when a vendor signals rate limiting
    pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 3;

    /// Wait applied when a rate-limit error carries no explicit retry-after (seconds)
    pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

    /// Upper bound on any vendor-provided retry-after (seconds)
    pub const MAX_RETRY_AFTER_SECS: u64 = 300;

    /// HTTP request timeout for vendor calls (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Content formatting constants
pub mod format {
    /// Maximum title length in characters
    pub const MAX_TITLE_LEN: usize = 80;

    /// Maximum attempts before falling back to heuristic content
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for the incremental retry backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 250;

    /// Input prefix length used for echo detection
    pub const ECHO_PROBE_LEN: usize = 50;

    /// Length of the excerpt used as a fallback description
    pub const EXCERPT_LEN: usize = 500;
}

/// Categorization constants
pub mod categorize {
    /// Confidence reported by the degraded default result
    pub const DEFAULT_CONFIDENCE: f32 = 0.5;
}
