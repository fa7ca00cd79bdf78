//! Model Reply Parsing
//!
//! Strict validation of the JSON the models return, plus the deterministic
//! heuristics used when they return garbage. Anything that does not match
//! the expected schema is a parse failure - wrong field types and missing
//! required keys included - and parse failures degrade, they never throw.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::format as format_constants;
use crate::types::{CategoryResult, UpdateCategory};

/// Lexical urgency cues used as a backstop when the model omits the flag
const URGENCY_CUES: [&str; 7] = [
    "urgent", "deadline", "submit by", "due", "asap", "immediately", "exam",
];

// =============================================================================
// JSON Extraction
// =============================================================================

/// Pull a JSON value out of a model reply.
///
/// Models wrap JSON in code fences or prose despite instructions; strip the
/// fences, then fall back to the outermost brace span.
pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Some(value);
    }

    // JSON embedded in explanatory text
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[start..=end]).ok()
}

fn strip_code_fences(s: &str) -> String {
    let mut result = s.to_string();

    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = result[first_newline + 1..].to_string();
    }

    if result.ends_with("```") {
        result = result[..result.len() - 3].trim_end().to_string();
    }

    result
}

// =============================================================================
// Categorize Reply
// =============================================================================

#[derive(Debug, Deserialize)]
struct CategorizeReply {
    category: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    is_urgent: Option<bool>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Parse a classification reply into a validated result.
///
/// `None` means the reply is unusable and the caller should fall back to
/// the degraded default. A bad due date alone is dropped, not fatal: the
/// category is still trustworthy.
pub fn parse_category_reply(raw: &str, source_text: &str) -> Option<CategoryResult> {
    let value = extract_json(raw)?;
    let reply: CategorizeReply = serde_json::from_value(value).ok()?;

    let category: UpdateCategory = reply.category.parse().ok()?;

    let due_date = reply.due_date.as_deref().and_then(|s| {
        let parsed = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
        if parsed.is_none() && !s.trim().is_empty() {
            debug!(due_date = %s, "Dropping unparseable due date");
        }
        parsed
    });

    let is_urgent = reply
        .is_urgent
        .unwrap_or_else(|| looks_urgent(source_text));

    Some(
        CategoryResult {
            category,
            confidence: reply
                .confidence
                .unwrap_or(crate::constants::categorize::DEFAULT_CONFIDENCE),
            is_urgent,
            due_date,
            tags: reply.tags.unwrap_or_default(),
        }
        .normalize(),
    )
}

/// Deterministic urgency backstop: scan for lexical cues
pub fn looks_urgent(text: &str) -> bool {
    let lower = text.to_lowercase();
    URGENCY_CUES.iter().any(|cue| lower.contains(cue))
}

// =============================================================================
// Format Reply
// =============================================================================

#[derive(Debug, Deserialize)]
struct FormatReply {
    title: String,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a formatting reply into (title, description).
///
/// Rejected outright when the title is empty or the description just echoes
/// the input back (containment check against the input's leading characters).
/// Overlong titles are truncated, not rejected.
pub fn parse_format_reply(raw: &str, input_text: &str) -> Option<(String, Option<String>)> {
    let value = extract_json(raw)?;
    let reply: FormatReply = serde_json::from_value(value).ok()?;

    let title = reply.title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    if let Some(description) = &reply.description
        && echoes_input(description, input_text)
    {
        warn!("Model echoed the input back as description, rejecting reply");
        return None;
    }

    Some((
        truncate_chars(&title, format_constants::MAX_TITLE_LEN),
        reply.description.map(|d| d.trim().to_string()),
    ))
}

/// Echo check: does `candidate` contain the input's leading characters
/// verbatim? Probes shorter than 20 characters are skipped - containment of
/// a tiny fragment proves nothing.
fn echoes_input(candidate: &str, input_text: &str) -> bool {
    let probe: String = input_text
        .trim()
        .chars()
        .take(format_constants::ECHO_PROBE_LEN)
        .collect();
    probe.chars().count() >= 20 && candidate.contains(&probe)
}

// =============================================================================
// Heuristic Fallbacks
// =============================================================================

/// Non-AI title derivation: first non-empty line, truncated with an ellipsis
pub fn heuristic_title(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    if line.is_empty() {
        "Untitled".to_string()
    } else {
        truncate_chars(line, format_constants::MAX_TITLE_LEN)
    }
}

/// Leading excerpt used as a fallback description
pub fn excerpt(text: &str, max_chars: usize) -> String {
    truncate_chars(text.trim(), max_chars)
}

/// Char-aware truncation with a trailing ellipsis
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
