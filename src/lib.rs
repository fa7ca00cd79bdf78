//! CampusBoard - AI Content Core for a College Updates Board
//!
//! Class representatives post assignments, notes, presentations, and
//! announcements; this crate is the engine that turns their raw text and
//! uploads into classified, titled, well-formed posts using external LLM
//! providers - reliably, despite flaky, rate-limited, multi-vendor backends.
//!
//! ## Core Features
//!
//! - **Provider Fallback**: priority-ordered multi-vendor chain with a
//!   shared cooldown circuit breaker
//! - **Rate Limiting**: one process-wide concurrency gate over all
//!   outbound AI calls
//! - **Response Caching**: content-addressed memo, identical input never
//!   hits the network twice
//! - **Content Pipeline**: extraction → categorize → format, with
//!   deterministic degraded fallbacks at every step
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use campusboard::{AiManager, ContentPipeline, ProviderRegistry, RateLimiter, ResponseCache};
//!
//! let config = campusboard::ConfigLoader::load()?;
//! let registry = Arc::new(ProviderRegistry::from_entries(&config.providers));
//! let limiter = Arc::new(RateLimiter::new(config.limiter.max_concurrent));
//! let manager = Arc::new(AiManager::new(registry, limiter, cooldown));
//! let pipeline = ContentPipeline::new(manager, Arc::new(ResponseCache::default()), config.format);
//! let category = pipeline.categorize("Lab 3 due Friday").await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider adapters, fallback manager, rate limiter, cache, pipeline
//! - [`extract`]: text extraction dispatch for uploaded files
//! - [`config`]: layered configuration (defaults, TOML, environment)
//! - [`types`]: domain types and the unified error system

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod extract;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, FormatConfig, ProviderEntry};

// Error Types
pub use types::error::{BoardError, ErrorCategory, ErrorClassifier, LlmError, Result};

// Domain Types
pub use types::{
    CategoryResult, ExtractedText, FileSource, FormattedContent, ProcessedContent, UpdateCategory,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    AiManager,
    AiOutcome,
    ContentPipeline,
    FileInput,
    GenerationProvider,
    GenerationRequest,
    ProviderFamily,
    ProviderRegistry,
    ProviderStatus,
    RateLimiter,
    ResponseCache,
};

// =============================================================================
// Extraction Re-exports
// =============================================================================

pub use extract::{ExtractorRegistry, TextExtractor};
