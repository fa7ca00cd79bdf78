//! Fallback Manager
//!
//! Cascading provider attempts over the registry's priority order.
//!
//! ## Strategy
//!
//! 1. Candidates = active providers minus those on cooldown
//! 2. If a preferred family is given, stable-sort it to the front
//! 3. Try candidates in order; first success wins and carries the serving
//!    provider's identity
//! 4. Quota/rate failures put the provider on cooldown so concurrent
//!    requests skip it too
//! 5. All candidates exhausted => one aggregate failure
//!
//! Each attempt is already bounded by the adapter's own rate-limit retry
//! budget, so total latency stays bounded without a timer here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::health::{Clock, ProviderHealth};
use super::{
    GenerationProvider, GenerationRequest, ProviderConfig, ProviderFamily, SharedProvider,
    create_provider,
};
use crate::ai::limiter::RateLimiter;
use crate::ai::registry::ProviderRegistry;
use crate::types::{BoardError, Result};

/// A successful generation with the identity of the provider that served it
#[derive(Debug, Clone)]
pub struct AiOutcome {
    pub text: String,
    /// Provider instance that produced the result
    pub provider: String,
    pub family: ProviderFamily,
    pub model: String,
}

/// Snapshot of one provider's state for diagnostics
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub family: ProviderFamily,
    pub model: Option<String>,
    pub priority: u32,
    pub active: bool,
    pub available: bool,
    pub cooldown_remaining: Option<Duration>,
}

/// Multi-provider generation manager: registry-driven fallback with shared
/// cooldown state and a process-wide concurrency gate.
pub struct AiManager {
    registry: Arc<ProviderRegistry>,
    adapters: HashMap<String, SharedProvider>,
    health: ProviderHealth,
    limiter: Arc<RateLimiter>,
}

impl AiManager {
    pub fn new(registry: Arc<ProviderRegistry>, limiter: Arc<RateLimiter>, cooldown: Duration) -> Self {
        Self::with_clock(registry, limiter, ProviderHealth::new(cooldown))
    }

    /// Construct with explicit health state (injectable clock for tests)
    pub fn with_clock_source(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_clock(registry, limiter, ProviderHealth::with_clock(cooldown, clock))
    }

    /// Assemble a manager from explicit adapter instances instead of the
    /// built-in vendor set. Adapters are keyed by their `name()`; the
    /// registry still supplies ordering and active flags.
    pub fn from_adapters(
        registry: Arc<ProviderRegistry>,
        adapters: Vec<SharedProvider>,
        limiter: Arc<RateLimiter>,
        cooldown: Duration,
    ) -> Self {
        Self {
            registry,
            adapters: adapters
                .into_iter()
                .map(|a| (a.name().to_string(), a))
                .collect(),
            health: ProviderHealth::new(cooldown),
            limiter,
        }
    }

    fn with_clock(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        health: ProviderHealth,
    ) -> Self {
        let mut adapters = HashMap::new();
        for config in registry.list_all() {
            match create_provider(&config) {
                Ok(adapter) => {
                    adapters.insert(config.name.clone(), adapter);
                }
                Err(e) => {
                    warn!(provider = %config.name, error = %e, "Skipping provider: adapter construction failed");
                }
            }
        }

        Self {
            registry,
            adapters,
            health,
            limiter,
        }
    }

    /// Try providers in priority order until one succeeds.
    ///
    /// With zero active providers this returns `NoProvidersAvailable`
    /// without touching the network. Quota/rate failures put the provider
    /// on cooldown; every other failure just moves to the next candidate.
    #[instrument(skip(self, request), fields(preferred = ?preferred))]
    pub async fn generate_with_fallback(
        &self,
        request: &GenerationRequest,
        preferred: Option<ProviderFamily>,
    ) -> Result<AiOutcome> {
        let active = self.registry.list_active();
        if active.is_empty() {
            return Err(BoardError::NoProvidersAvailable);
        }

        let mut candidates: Vec<ProviderConfig> = active
            .into_iter()
            .filter(|p| {
                let available = self.health.is_available(&p.name);
                if !available {
                    debug!(provider = %p.name, "Skipping provider (cooling down)");
                }
                available
            })
            .collect();

        if let Some(family) = preferred {
            // Stable sort: preferred family first, priority order kept
            // within each group
            candidates.sort_by_key(|p| p.family != family);
        }

        let mut attempts = 0usize;
        let mut last_error: Option<BoardError> = None;

        for candidate in &candidates {
            let Some(adapter) = self.adapters.get(&candidate.name) else {
                continue;
            };

            attempts += 1;
            debug!(
                provider = %candidate.name,
                attempt = attempts,
                of = candidates.len(),
                "Fallback attempt"
            );

            match self.limiter.schedule(adapter.generate(request)).await {
                Ok(output) => {
                    info!(
                        provider = %candidate.name,
                        attempts,
                        "Generation succeeded"
                    );
                    return Ok(AiOutcome {
                        text: output.text,
                        provider: candidate.name.clone(),
                        family: candidate.family,
                        model: output.model,
                    });
                }
                Err(err) => {
                    if let BoardError::Llm(llm) = &err
                        && llm.exhausts_provider()
                    {
                        self.health.mark_unavailable(&candidate.name);
                    }
                    warn!(
                        provider = %candidate.name,
                        error = %err,
                        "Provider failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(BoardError::AllProvidersFailed {
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "all providers cooling down".to_string()),
        })
    }

    /// Direct entry point: first active Gemini instance, no fallback.
    /// Used for diagnostics and explicit per-family invocation.
    pub async fn use_gemini(&self, prompt: &str) -> Result<AiOutcome> {
        self.use_family(ProviderFamily::Gemini, None, prompt).await
    }

    /// Direct entry point: first active Groq instance with an optional model
    /// override, no fallback.
    pub async fn use_groq(&self, model: Option<&str>, prompt: &str) -> Result<AiOutcome> {
        self.use_family(ProviderFamily::Groq, model, prompt).await
    }

    async fn use_family(
        &self,
        family: ProviderFamily,
        model: Option<&str>,
        prompt: &str,
    ) -> Result<AiOutcome> {
        let config = self
            .registry
            .list_by_family(family)
            .into_iter()
            .find(|p| p.active)
            .ok_or(BoardError::NoProvidersAvailable)?;

        let request = GenerationRequest::text(prompt);

        // A model override needs a one-off adapter; otherwise reuse the
        // shared one
        let output = match model {
            Some(model) if Some(model) != config.model.as_deref() => {
                let mut override_config = config.clone();
                override_config.model = Some(model.to_string());
                let adapter = create_provider(&override_config)?;
                self.limiter.schedule(adapter.generate(&request)).await?
            }
            _ => {
                let adapter = self
                    .adapters
                    .get(&config.name)
                    .ok_or(BoardError::NoProvidersAvailable)?;
                self.limiter.schedule(adapter.generate(&request)).await?
            }
        };

        Ok(AiOutcome {
            text: output.text,
            provider: config.name.clone(),
            family,
            model: output.model,
        })
    }

    /// Diagnostics snapshot of every registered provider
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.registry
            .list_all()
            .into_iter()
            .map(|p| ProviderStatus {
                available: self.health.cooldown_remaining(&p.name).is_none(),
                cooldown_remaining: self.health.cooldown_remaining(&p.name),
                name: p.name,
                family: p.family,
                model: p.model,
                priority: p.priority,
                active: p.active,
            })
            .collect()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::GenerationOutput;
    use crate::types::{ErrorCategory, LlmError};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    struct MockProvider {
        name: String,
        family: ProviderFamily,
        calls: AtomicU32,
        /// Errors to emit before succeeding; None entries mean success
        failures: Mutex<Vec<LlmError>>,
    }

    impl MockProvider {
        fn healthy(name: &str, family: ProviderFamily) -> Self {
            Self {
                name: name.into(),
                family,
                calls: AtomicU32::new(0),
                failures: Mutex::new(Vec::new()),
            }
        }

        fn failing(name: &str, family: ProviderFamily, errors: Vec<LlmError>) -> Self {
            Self {
                name: name.into(),
                family,
                calls: AtomicU32::new(0),
                failures: Mutex::new(errors),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationProvider for MockProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(GenerationOutput {
                    text: format!("reply from {}", self.name),
                    model: "mock-model".into(),
                })
            } else {
                Err(BoardError::Llm(failures.remove(0)))
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn family(&self) -> ProviderFamily {
            self.family
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    fn config(name: &str, family: ProviderFamily, priority: u32) -> ProviderConfig {
        ProviderConfig {
            name: name.into(),
            family,
            model: None,
            priority,
            active: true,
            api_key: SecretString::from("k"),
            api_base: None,
            timeout_secs: 30,
        }
    }

    /// Assemble a manager with mock adapters in place of real vendors
    fn manager_with(
        configs: Vec<ProviderConfig>,
        mocks: Vec<Arc<MockProvider>>,
        cooldown: Duration,
        clock: Option<Arc<dyn Clock>>,
    ) -> AiManager {
        let registry = Arc::new(ProviderRegistry::from_configs(configs));
        let mut adapters: HashMap<String, SharedProvider> = HashMap::new();
        for mock in mocks {
            adapters.insert(mock.name.clone(), mock);
        }
        let health = match clock {
            Some(clock) => ProviderHealth::with_clock(cooldown, clock),
            None => ProviderHealth::new(cooldown),
        };
        AiManager {
            registry,
            adapters,
            health,
            limiter: Arc::new(RateLimiter::new(10)),
        }
    }

    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn transient(msg: &str) -> LlmError {
        LlmError::new(ErrorCategory::Transient, msg)
    }

    fn quota(msg: &str) -> LlmError {
        LlmError::new(ErrorCategory::Quota, msg)
    }

    #[tokio::test]
    async fn test_first_provider_serves() {
        let primary = Arc::new(MockProvider::healthy("gemini-primary", ProviderFamily::Gemini));
        let backup = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![primary.clone(), backup.clone()],
            Duration::from_secs(5),
            None,
        );

        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();

        assert_eq!(outcome.provider, "gemini-primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_reaches_last_provider() {
        // Providers 1..N-1 fail, provider N succeeds
        let a = Arc::new(MockProvider::failing(
            "gemini-primary",
            ProviderFamily::Gemini,
            vec![transient("boom")],
        ));
        let b = Arc::new(MockProvider::failing(
            "gemini-secondary",
            ProviderFamily::Gemini,
            vec![transient("boom")],
        ));
        let c = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("gemini-secondary", ProviderFamily::Gemini, 1),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![a.clone(), b.clone(), c.clone()],
            Duration::from_secs(5),
            None,
        );

        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();

        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(outcome.text, "reply from groq-primary");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_providers_is_structured_failure() {
        let manager = manager_with(Vec::new(), Vec::new(), Duration::from_secs(5), None);
        let err = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NoProvidersAvailable));
    }

    #[tokio::test]
    async fn test_all_failing_is_aggregate_error() {
        let a = Arc::new(MockProvider::failing(
            "gemini-primary",
            ProviderFamily::Gemini,
            vec![transient("x"), transient("x"), transient("x")],
        ));
        let manager = manager_with(
            vec![config("gemini-primary", ProviderFamily::Gemini, 0)],
            vec![a],
            Duration::from_secs(5),
            None,
        );

        let err = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap_err();
        match err {
            BoardError::AllProvidersFailed { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_quota_failure_opens_cooldown_then_recovers() {
        let clock = Arc::new(ManualClock::new());
        let flaky = Arc::new(MockProvider::failing(
            "gemini-primary",
            ProviderFamily::Gemini,
            vec![quota("quota exceeded")],
        ));
        let backup = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![flaky.clone(), backup.clone()],
            Duration::from_secs(5),
            Some(clock.clone()),
        );

        // First call: primary fails with quota, backup serves
        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(flaky.calls(), 1);

        // During cooldown the primary is skipped entirely
        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(flaky.calls(), 1);

        // After cooldown it becomes eligible again without intervention
        clock.advance(Duration::from_secs(6));
        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider, "gemini-primary");
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_open_cooldown() {
        let flaky = Arc::new(MockProvider::failing(
            "gemini-primary",
            ProviderFamily::Gemini,
            vec![transient("blip")],
        ));
        let backup = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![flaky.clone(), backup],
            Duration::from_secs(5),
            None,
        );

        manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        // Next call tries the primary again immediately
        manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_preferred_family_jumps_queue() {
        let gemini = Arc::new(MockProvider::healthy("gemini-primary", ProviderFamily::Gemini));
        let groq = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![gemini.clone(), groq.clone()],
            Duration::from_secs(5),
            None,
        );

        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), Some(ProviderFamily::Groq))
            .await
            .unwrap();

        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test]
    async fn test_preferred_family_keeps_internal_priority() {
        let first = Arc::new(MockProvider::healthy("gemini-primary", ProviderFamily::Gemini));
        let second = Arc::new(MockProvider::healthy("gemini-secondary", ProviderFamily::Gemini));
        let manager = manager_with(
            vec![
                config("gemini-secondary", ProviderFamily::Gemini, 7),
                config("gemini-primary", ProviderFamily::Gemini, 2),
            ],
            vec![first.clone(), second.clone()],
            Duration::from_secs(5),
            None,
        );

        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), Some(ProviderFamily::Gemini))
            .await
            .unwrap();
        assert_eq!(outcome.provider, "gemini-primary");
    }

    #[tokio::test]
    async fn test_disabled_provider_skipped() {
        let gemini = Arc::new(MockProvider::healthy("gemini-primary", ProviderFamily::Gemini));
        let groq = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![gemini.clone(), groq.clone()],
            Duration::from_secs(5),
            None,
        );

        manager.registry().disable("gemini-primary");
        let outcome = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test]
    async fn test_use_family_direct() {
        let gemini = Arc::new(MockProvider::healthy("gemini-primary", ProviderFamily::Gemini));
        let groq = Arc::new(MockProvider::healthy("groq-primary", ProviderFamily::Groq));
        let manager = manager_with(
            vec![
                config("gemini-primary", ProviderFamily::Gemini, 0),
                config("groq-primary", ProviderFamily::Groq, 10),
            ],
            vec![gemini.clone(), groq.clone()],
            Duration::from_secs(5),
            None,
        );

        let outcome = manager.use_gemini("ping").await.unwrap();
        assert_eq!(outcome.provider, "gemini-primary");

        let outcome = manager.use_groq(None, "ping").await.unwrap();
        assert_eq!(outcome.provider, "groq-primary");
        assert_eq!(gemini.calls(), 1);
        assert_eq!(groq.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_status_reflects_cooldown() {
        let flaky = Arc::new(MockProvider::failing(
            "gemini-primary",
            ProviderFamily::Gemini,
            vec![quota("quota exceeded")],
        ));
        let manager = manager_with(
            vec![config("gemini-primary", ProviderFamily::Gemini, 0)],
            vec![flaky],
            Duration::from_secs(60),
            None,
        );

        let _ = manager
            .generate_with_fallback(&GenerationRequest::text("hi"), None)
            .await;

        let status = manager.provider_status();
        assert_eq!(status.len(), 1);
        assert!(!status[0].available);
        assert!(status[0].cooldown_remaining.is_some());
    }
}
