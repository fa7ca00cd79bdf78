//! LLM Provider Abstraction
//!
//! Defines the GenerationProvider trait implemented by each vendor adapter.
//! Adapters serialize the vendor request, parse the vendor response into
//! plain text, and classify vendor errors into the shared taxonomy. The only
//! retry an adapter performs itself is the rate-limit wait-and-retry loop;
//! everything else surfaces immediately for the fallback manager to route.
//!
//! ## Modules
//!
//! - `gemini`: Google Gemini adapter (text + vision)
//! - `groq`: Groq adapter (OpenAI-compatible chat completions)
//! - `health`: per-provider cooldown state shared across requests
//! - `fallback`: the priority-ordered fallback manager

pub mod fallback;
pub mod gemini;
pub mod groq;
pub mod health;

pub use fallback::{AiManager, AiOutcome, ProviderStatus};
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use health::{Clock, ProviderHealth, SystemClock};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::SecretString;
use tokio::time::sleep;
use tracing::warn;

use crate::config::ProviderEntry;
use crate::constants::adapter as adapter_constants;
use crate::types::{BoardError, ErrorCategory, Result};

// =============================================================================
// Provider Families
// =============================================================================

/// A vendor of hosted generation APIs. Each family has one adapter and its
/// own authentication scheme; several configured instances may share a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    Gemini,
    Groq,
}

impl ProviderFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            other => Err(format!(
                "Unknown provider family '{}'. Supported: gemini, groq",
                other
            )),
        }
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Runtime configuration for one provider instance.
///
/// Note: API keys are handled securely - they are never serialized and are
/// redacted in debug output.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Unique instance name
    pub name: String,
    pub family: ProviderFamily,
    /// Model name (adapter default used when None)
    pub model: Option<String>,
    /// Lower is tried first
    pub priority: u32,
    pub active: bool,
    /// API key, resolved from the environment at startup
    pub api_key: SecretString,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("active", &self.active)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve a config file entry into a runtime config.
    ///
    /// Returns `Ok(None)` when the entry's credential environment variable is
    /// unset or empty - the provider is excluded, not fatal to startup.
    pub fn from_entry(entry: &ProviderEntry) -> Result<Option<Self>> {
        let family: ProviderFamily = entry
            .family
            .parse()
            .map_err(BoardError::Config)?;

        let Some(key) = std::env::var(&entry.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            return Ok(None);
        };

        if let Some(base) = &entry.api_base {
            url::Url::parse(base).map_err(|e| {
                BoardError::Config(format!(
                    "provider {}: invalid api_base '{}': {}",
                    entry.name, base, e
                ))
            })?;
        }

        Ok(Some(Self {
            name: entry.name.clone(),
            family,
            model: entry.model.clone(),
            priority: entry.priority,
            active: entry.active,
            api_key: SecretString::from(key),
            api_base: entry.api_base.clone(),
            timeout_secs: entry.timeout_secs,
        }))
    }
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// Inline image payload for vision requests
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

/// A single generation request: a prompt, optionally with an inline image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    /// Build a vision request; the bytes are base64-encoded here so adapters
    /// deal only in wire-ready payloads.
    pub fn with_image(prompt: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(InlineImage {
                mime_type: mime_type.into(),
                data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

/// Successful adapter output: plain text plus the model that produced it.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub text: String,
    pub model: String,
}

/// Shared provider type for concurrent access across pipeline stages.
pub type SharedProvider = Arc<dyn GenerationProvider + Send + Sync>;

// =============================================================================
// Provider Trait
// =============================================================================

/// One vendor adapter: prompt in, text out, or a typed error.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Issue a single generation call, applying only the vendor-local
    /// rate-limit retry loop.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput>;

    /// Instance name for logging and health tracking
    fn name(&self) -> &str;

    fn family(&self) -> ProviderFamily;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Whether the adapter accepts inline image input
    fn supports_vision(&self) -> bool {
        false
    }
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.family {
        ProviderFamily::Gemini => Ok(Arc::new(GeminiProvider::new(config.clone())?)),
        ProviderFamily::Groq => Ok(Arc::new(GroqProvider::new(config.clone())?)),
    }
}

// =============================================================================
// Vendor-local Rate Limit Retry
// =============================================================================

/// Run `attempt` up to the rate-limit retry budget.
///
/// Only rate-limit errors are retried here: the wait is the vendor's explicit
/// retry-after when present, otherwise a fixed default. Every other error
/// kind surfaces immediately - cross-provider retry is the fallback
/// manager's job, not the adapter's.
pub(crate) async fn with_rate_limit_retry<F, Fut>(provider: &str, mut attempt: F) -> Result<GenerationOutput>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<GenerationOutput>>,
{
    let max_attempts = adapter_constants::RATE_LIMIT_MAX_ATTEMPTS;
    let mut n = 0;
    loop {
        n += 1;
        match attempt().await {
            Ok(output) => return Ok(output),
            Err(BoardError::Llm(err))
                if err.category == ErrorCategory::RateLimit && n < max_attempts =>
            {
                let wait = err.retry_after.unwrap_or(Duration::from_secs(
                    adapter_constants::DEFAULT_RETRY_AFTER_SECS,
                ));
                warn!(
                    provider = %provider,
                    attempt = n,
                    wait_secs = wait.as_secs(),
                    "Rate limited, waiting before retry"
                );
                sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Parse an explicit retry-after duration out of a vendor error body.
///
/// Handles the shapes both vendors actually emit: Gemini's RetryInfo
/// (`"retryDelay": "21s"`), Groq's prose (`try again in 7.66s`), and the
/// generic `retry after 30 seconds`. The result is capped so a vendor cannot
/// park us for an unbounded wait.
pub(crate) fn parse_retry_after(message: &str) -> Option<Duration> {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        regex::Regex::new(
            r#"(?i)(?:retrydelay"?\s*:\s*"?|try again in\s+|retry after\s+)(\d+(?:\.\d+)?)"#,
        )
        .unwrap()
    });

    let secs: f64 = pattern.captures(message)?.get(1)?.as_str().parse().ok()?;
    let cap = Duration::from_secs(adapter_constants::MAX_RETRY_AFTER_SECS);
    Some(Duration::from_secs_f64(secs).min(cap))
}
