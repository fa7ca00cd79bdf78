//! AI Orchestration Layer
//!
//! The multi-provider generation core: provider registry, process-wide rate
//! limiting, content-addressed response caching, and the fallback manager
//! the content pipeline runs on.

pub mod cache;
pub mod limiter;
pub mod pipeline;
pub mod provider;
pub mod registry;

pub use cache::ResponseCache;
pub use limiter::RateLimiter;
pub use pipeline::{ContentPipeline, FileInput};
pub use provider::{
    AiManager, AiOutcome, GeminiProvider, GenerationOutput, GenerationProvider, GenerationRequest,
    GroqProvider, ProviderConfig, ProviderFamily, ProviderHealth, ProviderStatus, SharedProvider,
};
pub use registry::ProviderRegistry;
