//! Content Pipeline
//!
//! The categorize → format sequence applied to raw input before the route
//! layer persists anything, plus the multi-file combine and the vision text
//! path. Both AI steps consult the response cache before touching the
//! network and degrade to deterministic fallbacks instead of erroring: the
//! only caller-visible failure is "no content provided" at the entry gate.

pub mod parse;
pub mod prompts;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::ai::cache::ResponseCache;
use crate::ai::provider::{AiManager, GenerationRequest, ProviderFamily};
use crate::config::FormatConfig;
use crate::constants::format as format_constants;
use crate::extract::ExtractorRegistry;
use crate::types::{
    BoardError, CategoryResult, ExtractedText, FileSource, FormattedContent, ProcessedContent,
    Result,
};

use parse::{excerpt, heuristic_title, parse_category_reply, parse_format_reply};

/// One input file of a multi-file submission, after extraction.
///
/// Extraction failures are isolated per file: the text is replaced with a
/// placeholder and the failure recorded, never propagated.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub filename: String,
    pub content: String,
    pub error: Option<String>,
}

impl FileInput {
    pub fn extracted(filename: impl Into<String>, text: &ExtractedText) -> Self {
        Self {
            filename: filename.into(),
            content: text.content.clone(),
            error: None,
        }
    }

    /// Placeholder for a file whose text could not be recovered
    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            content: format!("[Could not extract text from {}]", filename),
            filename,
            error: Some(error.into()),
        }
    }
}

/// The categorize → format pipeline over the fallback manager.
pub struct ContentPipeline {
    manager: Arc<AiManager>,
    cache: Arc<ResponseCache>,
    extractor: Arc<ExtractorRegistry>,
    policy: FormatConfig,
}

impl ContentPipeline {
    pub fn new(manager: Arc<AiManager>, cache: Arc<ResponseCache>, policy: FormatConfig) -> Self {
        Self {
            manager,
            cache,
            extractor: Arc::new(ExtractorRegistry::new()),
            policy,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<ExtractorRegistry>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn extractor(&self) -> &Arc<ExtractorRegistry> {
        &self.extractor
    }

    // =========================================================================
    // Categorize
    // =========================================================================

    /// Classify content into one of the four categories.
    ///
    /// Never errors: unreachable providers and unparseable replies both
    /// yield the documented default result.
    pub async fn categorize(&self, text: &str) -> CategoryResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return CategoryResult::degraded();
        }

        let key = ResponseCache::key("categorize", &[trimmed]);
        if let Some(value) = self.cache.get(&key).await
            && let Ok(cached) = serde_json::from_value::<CategoryResult>(value)
        {
            return cached;
        }

        let prompt = prompts::categorize_prompt(trimmed);
        match self
            .manager
            .generate_with_fallback(&GenerationRequest::text(prompt), None)
            .await
        {
            Ok(outcome) => match parse_category_reply(&outcome.text, trimmed) {
                Some(result) => {
                    debug!(
                        provider = %outcome.provider,
                        category = %result.category,
                        "Content classified"
                    );
                    if let Ok(value) = serde_json::to_value(&result) {
                        self.cache.put(key, value).await;
                    }
                    result
                }
                None => {
                    warn!(
                        provider = %outcome.provider,
                        input = %preview(trimmed),
                        "Unusable classification reply, using default category"
                    );
                    CategoryResult::degraded()
                }
            },
            Err(err) => {
                warn!(
                    error = %err,
                    input = %preview(trimmed),
                    "Classification unavailable, using default category"
                );
                CategoryResult::degraded()
            }
        }
    }

    // =========================================================================
    // Format
    // =========================================================================

    /// Produce a title and description for classified content.
    ///
    /// Bad replies (unparseable, empty title, echoed input) are retried with
    /// incremental backoff; once the attempt budget or the provider fleet is
    /// exhausted the result is derived heuristically instead. Never errors.
    pub async fn format(&self, text: &str, category: &CategoryResult) -> FormattedContent {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return self.heuristic_content(trimmed, category);
        }

        let wants_description = self.wants_description(category);
        let category_json = serde_json::to_string(category).unwrap_or_default();
        let key = ResponseCache::key(
            "format",
            &[
                trimmed,
                &category_json,
                if wants_description { "desc" } else { "title-only" },
            ],
        );
        if let Some(value) = self.cache.get(&key).await
            && let Ok(cached) = serde_json::from_value::<FormattedContent>(value)
        {
            return cached;
        }

        let prompt = prompts::format_prompt(trimmed, category, self.policy.describe_coursework);

        for attempt in 1..=format_constants::MAX_ATTEMPTS {
            match self
                .manager
                .generate_with_fallback(&GenerationRequest::text(prompt.clone()), None)
                .await
            {
                Ok(outcome) => {
                    if let Some(formatted) =
                        self.accept_reply(&outcome.text, trimmed, category, wants_description)
                    {
                        info!(
                            provider = %outcome.provider,
                            attempt,
                            "Content formatted"
                        );
                        if let Ok(value) = serde_json::to_value(&formatted) {
                            self.cache.put(key, value).await;
                        }
                        return formatted;
                    }

                    warn!(
                        provider = %outcome.provider,
                        attempt,
                        input = %preview(trimmed),
                        "Rejected formatting reply"
                    );
                    if attempt < format_constants::MAX_ATTEMPTS {
                        // Incremental backoff: 250ms, 500ms, ... plus jitter
                        let base = Duration::from_millis(
                            format_constants::RETRY_BASE_DELAY_MS * u64::from(attempt),
                        );
                        sleep(base + random_jitter(base)).await;
                    }
                }
                Err(err) => {
                    // Each attempt already walked the whole fallback chain;
                    // another lap will not produce a different provider
                    warn!(
                        error = %err,
                        input = %preview(trimmed),
                        "Formatting unavailable, using heuristic content"
                    );
                    break;
                }
            }
        }

        self.heuristic_content(trimmed, category)
    }

    /// Validate one formatting reply against the description policy
    fn accept_reply(
        &self,
        raw: &str,
        input: &str,
        category: &CategoryResult,
        wants_description: bool,
    ) -> Option<FormattedContent> {
        let (title, description) = parse_format_reply(raw, input)?;

        let description = if wants_description {
            // The prompt asked for a description; a missing or blank one is
            // an invalid reply
            description.filter(|d| !d.is_empty())?
        } else {
            String::new()
        };

        Some(FormattedContent {
            title,
            description,
            category: category.clone(),
        })
    }

    fn wants_description(&self, category: &CategoryResult) -> bool {
        !category.category.is_coursework() || self.policy.describe_coursework
    }

    fn heuristic_content(&self, text: &str, category: &CategoryResult) -> FormattedContent {
        FormattedContent {
            title: heuristic_title(text),
            description: if self.wants_description(category) {
                excerpt(text, format_constants::EXCERPT_LEN)
            } else {
                String::new()
            },
            category: category.clone(),
        }
    }

    // =========================================================================
    // Multi-file Submissions
    // =========================================================================

    /// Combine context text with per-file extracted texts, then classify and
    /// format the whole. The single caller error: nothing left after trimming.
    pub async fn process_with_files(
        &self,
        context_text: &str,
        files: &[FileInput],
    ) -> Result<ProcessedContent> {
        let mut combined = String::new();
        if !context_text.trim().is_empty() {
            combined.push_str(context_text.trim());
        }
        for file in files {
            if !combined.is_empty() {
                combined.push_str("\n\n");
            }
            combined.push_str(&format!("--- {} ---\n{}", file.filename, file.content.trim()));
        }

        if combined.trim().is_empty() {
            return Err(BoardError::EmptyContent);
        }

        let category = self.categorize(&combined).await;
        let formatted = self.format(&combined, &category).await;

        Ok(ProcessedContent {
            sources: files
                .iter()
                .map(|f| FileSource {
                    filename: f.filename.clone(),
                    chars: f.content.chars().count(),
                    error: f.error.clone(),
                })
                .collect(),
            combined_text: combined,
            title: formatted.title,
            description: formatted.description,
            category: formatted.category,
        })
    }

    /// Extract each file (failures isolated as placeholders), then process.
    /// Images go through the vision path; everything else through the
    /// extraction registry.
    pub async fn process_files(
        &self,
        context_text: &str,
        paths: &[std::path::PathBuf],
    ) -> Result<ProcessedContent> {
        let files =
            futures::future::join_all(paths.iter().map(|path| self.extract_one(path))).await;
        self.process_with_files(context_text, &files).await
    }

    async fn extract_one(&self, path: &Path) -> FileInput {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if self.extractor.is_image(&filename) {
            let mime = self.extractor.image_mime(&filename).unwrap_or("image/png");
            match tokio::fs::read(path).await {
                Ok(bytes) => match self.analyze_image(&bytes, mime).await {
                    Ok(text) => FileInput {
                        filename,
                        content: text,
                        error: None,
                    },
                    Err(err) => {
                        warn!(file = %filename, error = %err, "Image analysis failed");
                        FileInput::failed(filename, err.to_string())
                    }
                },
                Err(err) => {
                    warn!(file = %filename, error = %err, "Image read failed");
                    FileInput::failed(filename, err.to_string())
                }
            }
        } else {
            match self.extractor.extract_text(path).await {
                Ok(text) => FileInput::extracted(filename, &text),
                Err(err) => {
                    warn!(file = %filename, error = %err, "Extraction failed");
                    FileInput::failed(filename, err.to_string())
                }
            }
        }
    }

    // =========================================================================
    // Vision
    // =========================================================================

    /// Extract text from an image via a vision-capable provider. Unlike the
    /// text steps this propagates failure - the callers isolate it per file.
    pub async fn analyze_image(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(BoardError::EmptyContent);
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let key = ResponseCache::key("analyzeImage", &[mime_type, &digest]);
        if let Some(Value::String(cached)) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let request =
            GenerationRequest::with_image(prompts::image_text_prompt(), mime_type, bytes);
        let outcome = self
            .manager
            .generate_with_fallback(&request, Some(ProviderFamily::Gemini))
            .await?;

        self.cache
            .put(key, Value::String(outcome.text.clone()))
            .await;
        Ok(outcome.text)
    }
}

/// Random jitter so concurrent retries don't stampede together
fn random_jitter(base: Duration) -> Duration {
    let max_jitter_ms = (base.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

/// Truncated input preview for log lines
fn preview(text: &str) -> String {
    let mut s: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        s.push('…');
    }
    s.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::limiter::RateLimiter;
    use crate::ai::provider::{
        GenerationOutput, GenerationProvider, ProviderConfig, SharedProvider,
    };
    use crate::ai::registry::ProviderRegistry;
    use crate::types::UpdateCategory;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted provider: answers classification and formatting prompts
    /// separately, or fails every call.
    struct ScriptedProvider {
        name: String,
        category_reply: Option<String>,
        format_reply: Option<String>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(category_reply: &str, format_reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name: "gemini-primary".into(),
                category_reply: Some(category_reply.into()),
                format_reply: Some(format_reply.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn unreachable_provider() -> Arc<Self> {
            Arc::new(Self {
                name: "gemini-primary".into(),
                category_reply: None,
                format_reply: None,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = if request.prompt.starts_with("You classify") {
                &self.category_reply
            } else {
                &self.format_reply
            };
            match reply {
                Some(text) => Ok(GenerationOutput {
                    text: text.clone(),
                    model: "mock-model".into(),
                }),
                None => Err(BoardError::LlmApi("connection refused".into())),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn family(&self) -> ProviderFamily {
            ProviderFamily::Gemini
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn supports_vision(&self) -> bool {
            true
        }
    }

    fn provider_config(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.into(),
            family: ProviderFamily::Gemini,
            model: None,
            priority: 0,
            active: true,
            api_key: SecretString::from("k"),
            api_base: None,
            timeout_secs: 30,
        }
    }

    fn pipeline_with(adapter: SharedProvider, policy: FormatConfig) -> ContentPipeline {
        let registry = Arc::new(ProviderRegistry::from_configs(vec![provider_config(
            "gemini-primary",
        )]));
        let manager = Arc::new(AiManager::from_adapters(
            registry,
            vec![adapter],
            Arc::new(RateLimiter::new(10)),
            Duration::from_secs(5),
        ));
        ContentPipeline::new(manager, Arc::new(ResponseCache::new(64)), policy)
    }

    fn empty_pipeline() -> ContentPipeline {
        let registry = Arc::new(ProviderRegistry::from_configs(Vec::new()));
        let manager = Arc::new(AiManager::from_adapters(
            registry,
            Vec::new(),
            Arc::new(RateLimiter::new(10)),
            Duration::from_secs(5),
        ));
        ContentPipeline::new(manager, Arc::new(ResponseCache::new(64)), FormatConfig::default())
    }

    const CATEGORY_REPLY: &str = r#"{"category": "assignments", "confidence": 0.9,
        "is_urgent": true, "due_date": "2025-10-20", "tags": ["cs101"]}"#;
    const FORMAT_REPLY: &str = r#"{"title": "Binary Tree Lab", "description": "Submit by Friday."}"#;

    #[tokio::test]
    async fn test_categorize_parses_model_reply() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let result = pipeline
            .categorize("Assignment for CS101: submit the binary tree lab by Friday Oct 20th")
            .await;

        assert_eq!(result.category, UpdateCategory::Assignments);
        assert!(result.is_urgent);
        assert_eq!(
            result.due_date,
            chrono::NaiveDate::from_ymd_opt(2025, 10, 20)
        );
    }

    #[tokio::test]
    async fn test_categorize_second_call_served_from_cache() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let first = pipeline.categorize("lab 3 due friday").await;
        let second = pipeline.categorize("lab 3 due friday").await;

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_categorize_malformed_reply_degrades_and_skips_cache() {
        let provider = ScriptedProvider::new("not json at all", FORMAT_REPLY);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let first = pipeline.categorize("lab 3").await;
        assert_eq!(first, CategoryResult::degraded());

        // Degraded results are not cached: the next call tries again
        let _ = pipeline.categorize("lab 3").await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_categorize_unreachable_providers_degrade() {
        let provider = ScriptedProvider::unreachable_provider();
        let pipeline = pipeline_with(provider, FormatConfig::default());

        let result = pipeline.categorize("anything").await;
        assert_eq!(result, CategoryResult::degraded());
    }

    #[tokio::test]
    async fn test_categorize_empty_input_degrades_without_network() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let result = pipeline.categorize("   ").await;
        assert_eq!(result, CategoryResult::degraded());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_format_coursework_title_only_by_default() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider, FormatConfig::default());

        let category = CategoryResult {
            category: UpdateCategory::Assignments,
            ..CategoryResult::degraded()
        };
        let formatted = pipeline.format("submit the lab by friday", &category).await;

        assert_eq!(formatted.title, "Binary Tree Lab");
        assert!(formatted.description.is_empty());
    }

    #[tokio::test]
    async fn test_format_coursework_description_policy() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(
            provider,
            FormatConfig {
                describe_coursework: true,
            },
        );

        let category = CategoryResult {
            category: UpdateCategory::Assignments,
            ..CategoryResult::degraded()
        };
        let formatted = pipeline.format("submit the lab by friday", &category).await;

        assert_eq!(formatted.description, "Submit by Friday.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_format_echo_reply_retried_then_heuristic() {
        let input = "The department seminar on distributed consensus is moved to room 204 tomorrow.";
        let echo_reply = format!(r#"{{"title": "Seminar", "description": "{input}"}}"#);
        let provider = ScriptedProvider::new(CATEGORY_REPLY, &echo_reply);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let category = CategoryResult::degraded(); // general wants a description
        let formatted = pipeline.format(input, &category).await;

        // All attempts rejected as echoes, heuristic kicked in
        assert_eq!(provider.calls(), format_constants::MAX_ATTEMPTS);
        assert!(formatted.title.starts_with("The department seminar"));
        assert!(!formatted.title.is_empty());
    }

    #[tokio::test]
    async fn test_format_unreachable_three_char_input_is_nonempty() {
        let provider = ScriptedProvider::unreachable_provider();
        let pipeline = pipeline_with(provider, FormatConfig::default());

        let formatted = pipeline.format("abc", &CategoryResult::degraded()).await;
        assert_eq!(formatted.title, "abc");
        assert!(!formatted.title.is_empty());
    }

    #[tokio::test]
    async fn test_format_cached_across_calls() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let category = CategoryResult::degraded();
        let first = pipeline.format("hall closed tomorrow for repairs", &category).await;
        let second = pipeline.format("hall closed tomorrow for repairs", &category).await;

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_process_with_files_empty_is_caller_error() {
        let pipeline = empty_pipeline();
        let err = pipeline.process_with_files("", &[]).await.unwrap_err();
        assert!(matches!(err, BoardError::EmptyContent));
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_process_with_files_combines_and_tracks_sources() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider, FormatConfig::default());

        let files = vec![
            FileInput {
                filename: "lab3.txt".into(),
                content: "Implement a binary tree.".into(),
                error: None,
            },
            FileInput::failed("broken.txt", "file contains no text"),
        ];
        let processed = pipeline
            .process_with_files("Submit by Friday.", &files)
            .await
            .unwrap();

        assert!(processed.combined_text.contains("--- lab3.txt ---"));
        assert!(processed.combined_text.contains("[Could not extract text from broken.txt]"));
        assert_eq!(processed.title, "Binary Tree Lab");
        assert_eq!(processed.category.category, UpdateCategory::Assignments);
        assert_eq!(processed.sources.len(), 2);
        assert!(processed.sources[0].error.is_none());
        assert!(processed.sources[1].error.is_some());
    }

    #[tokio::test]
    async fn test_process_files_isolates_extraction_failures() {
        use std::io::Write;

        let provider = ScriptedProvider::new(CATEGORY_REPLY, FORMAT_REPLY);
        let pipeline = pipeline_with(provider, FormatConfig::default());

        let mut good = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(good, "Lecture notes for week 5.").unwrap();

        let paths = vec![
            good.path().to_path_buf(),
            std::path::PathBuf::from("/nonexistent/missing.txt"),
        ];
        let processed = pipeline.process_files("", &paths).await.unwrap();

        assert_eq!(processed.sources.len(), 2);
        assert!(processed.sources[0].error.is_none());
        assert!(processed.sources[1].error.is_some());
        assert!(processed.combined_text.contains("Lecture notes for week 5."));
    }

    #[tokio::test]
    async fn test_analyze_image_cached_and_served() {
        let provider = ScriptedProvider::new(CATEGORY_REPLY, "Room 204, 10am");
        let pipeline = pipeline_with(provider.clone(), FormatConfig::default());

        let first = pipeline.analyze_image(b"fake-png", "image/png").await.unwrap();
        let second = pipeline.analyze_image(b"fake-png", "image/png").await.unwrap();

        assert_eq!(first, "Room 204, 10am");
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_image_empty_bytes_rejected() {
        let pipeline = empty_pipeline();
        let err = pipeline.analyze_image(b"", "image/png").await.unwrap_err();
        assert!(matches!(err, BoardError::EmptyContent));
    }

    #[tokio::test]
    async fn test_zero_providers_pipeline_still_answers() {
        let pipeline = empty_pipeline();

        let category = pipeline.categorize("urgent: exam moved to monday").await;
        assert_eq!(category, CategoryResult::degraded());

        let formatted = pipeline
            .format("urgent: exam moved to monday", &category)
            .await;
        assert_eq!(formatted.title, "urgent: exam moved to monday");
    }
}
