//! Plain Text Extraction
//!
//! Extractor for formats that are already text on disk. Markdown keeps its
//! markup; the classifier handles it fine. The first heading or line doubles
//! as recovered document title metadata.

use std::path::Path;

use async_trait::async_trait;

use super::TextExtractor;
use crate::types::{BoardError, ExtractedText, ExtractionMetadata, Result};

pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "md", "markdown", "csv", "log", "json"]
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BoardError::extraction(path.display().to_string(), e.to_string()))?;

        let content = String::from_utf8_lossy(&bytes).into_owned();

        if content.trim().is_empty() {
            return Err(BoardError::extraction(
                path.display().to_string(),
                "file contains no text",
            ));
        }

        let title = content
            .lines()
            .map(|l| l.trim().trim_start_matches('#').trim())
            .find(|l| !l.is_empty())
            .map(|l| l.to_string());

        Ok(ExtractedText {
            content,
            pages: None,
            metadata: ExtractionMetadata {
                title,
                author: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_extracts_content_and_title() {
        let mut file = tempfile::NamedTempFile::with_suffix(".md").unwrap();
        writeln!(file, "# Week 5 Lecture Notes\n\nGraphs and traversals.").unwrap();

        let extracted = PlainTextExtractor.extract(file.path()).await.unwrap();
        assert!(extracted.content.contains("Graphs and traversals."));
        assert_eq!(
            extracted.metadata.title.as_deref(),
            Some("Week 5 Lecture Notes")
        );
    }

    #[tokio::test]
    async fn test_empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        let err = PlainTextExtractor.extract(file.path()).await.unwrap_err();
        assert!(matches!(err, BoardError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let err = PlainTextExtractor
            .extract(Path::new("/nonexistent/notes.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Extraction { .. }));
    }
}
