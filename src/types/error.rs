//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides intelligent error classification for retry and fallback decisions.
//!
//! ## Error Categories
//!
//! - **RateLimit**: vendor asked us to slow down (wait and retry same provider)
//! - **Quota**: credential is out of budget (skip provider for a cooldown)
//! - **Auth**: authentication failures (fail fast, next provider)
//! - **Network**: connectivity issues (retry with backoff)
//! - **Transient**: temporary server issues (retry)
//! - **Unavailable**: provider down (next provider)
//!
//! ## Design Principles
//!
//! - Single unified error type (BoardError) for the entire application
//! - Category-based routing for retry and fallback decisions
//! - No panic/unwrap - all errors are recoverable

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Unified error categories for intelligent routing and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry same provider
    RateLimit,
    /// Quota exhausted for this credential - skip provider during cooldown
    Quota,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Provider unavailable - fallback to next
    Unavailable,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Parsing the model reply failed - may retry with same prompt
    ParseError,
    /// Temporary server issues - retry same provider
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Quota => write!(f, "QUOTA"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::ParseError
        )
    }

    /// Check if this category should put the provider on cooldown
    pub fn exhausts_provider(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Quota)
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            Self::ParseError => Duration::from_secs(1),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Unified LLM error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    /// Create a new LLM error
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    /// Create error with provider context
    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add provider context to existing error
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Check if error is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Check if the provider should be put on cooldown after this error
    pub fn exhausts_provider(&self) -> bool {
        self.category.exhausts_provider()
    }

    /// Get recommended retry delay
    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.category.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Error classifier for intelligent error routing
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        // Quota exhaustion patterns (checked before rate limiting: vendors
        // phrase both with "quota"/"limit" but billing terms are decisive)
        if lower.contains("insufficient_quota")
            || lower.contains("quota exceeded")
            || lower.contains("exceeded your current quota")
            || lower.contains("billing")
        {
            return LlmError::with_provider(ErrorCategory::Quota, message, provider);
        }

        // Rate limiting patterns
        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("resource_exhausted")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider);
        }

        // Authentication patterns
        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        // Network patterns
        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        // Provider unavailable patterns
        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("server error")
            || lower.contains("500")
            || lower.contains("internal error")
            || lower.contains("not found")
        {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        // Bad request patterns
        if lower.contains("400")
            || lower.contains("bad request")
            || lower.contains("invalid")
            || lower.contains("malformed")
        {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        // Parse error patterns
        if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("unexpected token")
        {
            return LlmError::with_provider(ErrorCategory::ParseError, message, provider)
                .retry_after(Duration::from_secs(1));
        }

        // Transient patterns (server-side issues that may resolve)
        if lower.contains("retry")
            || lower.contains("temporary")
            || lower.contains("overloaded")
        {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        // Default: unknown error
        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => {
                // A 429 body mentioning billing means the credential is spent,
                // not that we should slow down
                let lower = message.to_lowercase();
                if lower.contains("quota") || lower.contains("billing") {
                    LlmError::with_provider(ErrorCategory::Quota, message, provider)
                } else {
                    LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                }
            }
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            // 500 series are transient - can retry
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum BoardError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // LLM Errors
    // -------------------------------------------------------------------------
    /// Structured LLM error with category and retry hints
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Simple LLM API error (use Llm variant for structured errors)
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// No provider configured/enabled at all - returned without any network call
    #[error("no providers available")]
    NoProvidersAvailable,

    /// Every candidate in the fallback chain failed
    #[error("no provider succeeded after {attempts} attempts: {last_error}")]
    AllProvidersFailed { attempts: usize, last_error: String },

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// The one genuine caller error: nothing to classify or format
    #[error("no content provided")]
    EmptyContent,

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("Unsupported file type: {path}")]
    UnsupportedFileType { path: String },

    #[error("Config error: {0}")]
    Config(String),
}

impl From<LlmError> for BoardError {
    fn from(err: LlmError) -> Self {
        BoardError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl BoardError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an extraction error
    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an LLM error with category
    pub fn llm(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(category, message))
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Check if this error came from the caller rather than the AI surface
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyContent | Self::UnsupportedFileType { .. } | Self::Config(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
