//! Text Extraction
//!
//! The extraction collaborator the content pipeline consumes: dispatches an
//! uploaded file to a format-specific extractor by lowercased extension.
//! Image files are not handled here - the pipeline routes those through the
//! vision path instead.

mod text;

pub use text::PlainTextExtractor;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::types::{BoardError, ExtractedText, Result};

/// Extensions routed to the vision path rather than a text extractor
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// One format-specific extractor
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Lowercased extensions this extractor handles
    fn extensions(&self) -> &'static [&'static str];

    async fn extract(&self, path: &Path) -> Result<ExtractedText>;
}

/// Dispatch table from file extension to extractor.
pub struct ExtractorRegistry {
    by_extension: HashMap<&'static str, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with the built-in extractor set
    pub fn new() -> Self {
        let mut registry = Self {
            by_extension: HashMap::new(),
        };
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        for ext in extractor.extensions() {
            self.by_extension.insert(ext, Arc::clone(&extractor));
        }
    }

    /// Whether extraction (or the vision path) can handle this filename
    pub fn is_supported_file_type(&self, filename: &str) -> bool {
        match extension_of(filename) {
            Some(ext) => {
                self.by_extension.contains_key(ext.as_str())
                    || IMAGE_EXTENSIONS.contains(&ext.as_str())
            }
            None => false,
        }
    }

    /// Whether the file should go through the vision path
    pub fn is_image(&self, filename: &str) -> bool {
        extension_of(filename)
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// MIME type for an image file, by extension
    pub fn image_mime(&self, filename: &str) -> Option<&'static str> {
        match extension_of(filename)?.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "webp" => Some("image/webp"),
            "gif" => Some("image/gif"),
            _ => None,
        }
    }

    /// Extract text from a file, dispatching by extension
    pub async fn extract_text(&self, path: &Path) -> Result<ExtractedText> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let Some(ext) = extension_of(&filename) else {
            return Err(BoardError::UnsupportedFileType { path: filename });
        };

        let Some(extractor) = self.by_extension.get(ext.as_str()) else {
            return Err(BoardError::UnsupportedFileType { path: filename });
        };

        debug!(file = %filename, ext = %ext, "Extracting text");
        extractor.extract(path).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_file_types() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_supported_file_type("notes.txt"));
        assert!(registry.is_supported_file_type("README.MD"));
        assert!(registry.is_supported_file_type("scan.PNG"));
        assert!(!registry.is_supported_file_type("lecture.mp4"));
        assert!(!registry.is_supported_file_type("no_extension"));
    }

    #[test]
    fn test_image_routing() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_image("whiteboard.jpeg"));
        assert!(!registry.is_image("notes.txt"));
        assert_eq!(registry.image_mime("scan.png"), Some("image/png"));
        assert_eq!(registry.image_mime("photo.JPG"), Some("image/jpeg"));
        assert_eq!(registry.image_mime("notes.txt"), None);
    }

    #[tokio::test]
    async fn test_unsupported_extension_errors() {
        let registry = ExtractorRegistry::new();
        let err = registry
            .extract_text(Path::new("lecture.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::UnsupportedFileType { .. }));
    }
}
