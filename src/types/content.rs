//! Content Types
//!
//! Terminal outputs of the content pipeline and the extraction collaborator's
//! result shape. All of these are per-request values: created for one call,
//! handed to the route layer, then dropped.

use serde::{Deserialize, Serialize};

use super::category::CategoryResult;

/// Formatted output of the pipeline for a single piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedContent {
    /// Short display title, at most 80 characters
    pub title: String,
    /// Rewritten description. May be empty for coursework categories
    /// depending on the formatting policy.
    pub description: String,
    pub category: CategoryResult,
}

/// Output of a multi-file submission: combined text, AI-generated fields,
/// and per-file provenance so the caller can show what each file contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedContent {
    /// The full combined raw text the AI steps ran on
    pub combined_text: String,
    pub title: String,
    pub description: String,
    pub category: CategoryResult,
    pub sources: Vec<FileSource>,
}

/// Provenance for one input file of a multi-file submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub filename: String,
    /// Characters contributed to the combined text
    pub chars: usize,
    /// Extraction failure note, if the file's text had to be replaced
    /// with a placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Text extracted from one uploaded file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedText {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

impl ExtractedText {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            pages: None,
            metadata: ExtractionMetadata::default(),
        }
    }
}

/// Document metadata recovered during extraction, when the format carries any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}
