//! CLI Command Implementations

use std::path::PathBuf;

use crate::ai::pipeline::ContentPipeline;
use crate::ai::provider::AiManager;
use crate::types::{BoardError, CategoryResult, Result, UpdateCategory};

use super::Output;

/// Resolve the input text for a command: inline argument, or file contents
pub async fn resolve_input(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => Ok(tokio::fs::read_to_string(&path).await?),
        (None, None) => Err(BoardError::EmptyContent),
    }
}

pub async fn categorize(pipeline: &ContentPipeline, text: &str) -> Result<()> {
    let out = Output::new();
    let result = pipeline.categorize(text).await;

    out.section("Classification");
    print_category(&out, &result);
    Ok(())
}

pub async fn format(
    pipeline: &ContentPipeline,
    text: &str,
    category: Option<UpdateCategory>,
) -> Result<()> {
    let out = Output::new();

    let category_result = match category {
        Some(category) => CategoryResult {
            category,
            confidence: 1.0,
            ..CategoryResult::degraded()
        },
        None => pipeline.categorize(text).await,
    };

    let formatted = pipeline.format(text, &category_result).await;

    out.section("Formatted");
    out.field("title", &formatted.title);
    if !formatted.description.is_empty() {
        out.field("description", &formatted.description);
    }
    print_category(&out, &formatted.category);
    Ok(())
}

pub async fn process(
    pipeline: &ContentPipeline,
    context: Option<String>,
    files: Vec<PathBuf>,
) -> Result<()> {
    let out = Output::new();

    let processed = pipeline
        .process_files(context.as_deref().unwrap_or(""), &files)
        .await?;

    out.section("Processed submission");
    out.field("title", &processed.title);
    if !processed.description.is_empty() {
        out.field("description", &processed.description);
    }
    print_category(&out, &processed.category);

    out.section("Sources");
    for source in &processed.sources {
        match &source.error {
            Some(error) => out.warning(&format!("{} - {}", source.filename, error)),
            None => out.success(&format!("{} ({} chars)", source.filename, source.chars)),
        }
    }
    Ok(())
}

pub async fn extract(pipeline: &ContentPipeline, file: PathBuf) -> Result<()> {
    let out = Output::new();
    let extractor = pipeline.extractor();

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());

    if !extractor.is_supported_file_type(&filename) {
        return Err(BoardError::UnsupportedFileType { path: filename });
    }

    let text = if extractor.is_image(&filename) {
        let mime = extractor.image_mime(&filename).unwrap_or("image/png");
        let bytes = tokio::fs::read(&file).await?;
        pipeline.analyze_image(&bytes, mime).await?
    } else {
        extractor.extract_text(&file).await?.content
    };

    out.section(&format!("Extracted from {filename}"));
    println!("{text}");
    Ok(())
}

pub fn providers(manager: &AiManager) {
    let out = Output::new();
    out.section("Providers");

    let statuses = manager.provider_status();
    if statuses.is_empty() {
        out.warning("No providers configured (check credential environment variables)");
        return;
    }

    for status in statuses {
        let line = format!(
            "{} [{}] priority={} model={}",
            status.name,
            status.family,
            status.priority,
            status.model.as_deref().unwrap_or("default"),
        );
        if !status.active {
            out.warning(&format!("{line} (disabled)"));
        } else if let Some(remaining) = status.cooldown_remaining {
            out.warning(&format!("{line} (cooling down {}s)", remaining.as_secs()));
        } else {
            out.success(&line);
        }
    }
}

fn print_category(out: &Output, result: &CategoryResult) {
    out.field("category", result.category.as_str());
    out.field("confidence", &format!("{:.2}", result.confidence));
    out.field("urgent", if result.is_urgent { "yes" } else { "no" });
    if let Some(due) = result.due_date {
        out.field("due date", &due.to_string());
    }
    if !result.tags.is_empty() {
        out.field("tags", &result.tags.join(", "));
    }
}
