//! Core Domain Types
//!
//! Shared types for categories, pipeline outputs, and the unified error
//! system.

pub mod category;
pub mod content;
pub mod error;

pub use category::{CategoryResult, UpdateCategory};
pub use content::{
    ExtractedText, ExtractionMetadata, FileSource, FormattedContent, ProcessedContent,
};
pub use error::{BoardError, ErrorCategory, ErrorClassifier, LlmError, Result};
