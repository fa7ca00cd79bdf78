//! Update Categories
//!
//! The four fixed categories a posted update can belong to, and the
//! classification result produced by the AI pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category of a posted update.
///
/// Classification is by content meaning, not file type: a PDF containing
/// homework instructions is an assignment, not a "document".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCategory {
    Assignments,
    Notes,
    Presentations,
    #[default]
    General,
}

impl UpdateCategory {
    /// All categories, in prompt order
    pub const ALL: [UpdateCategory; 4] = [
        UpdateCategory::Assignments,
        UpdateCategory::Notes,
        UpdateCategory::Presentations,
        UpdateCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignments => "assignments",
            Self::Notes => "notes",
            Self::Presentations => "presentations",
            Self::General => "general",
        }
    }

    /// Whether this category describes coursework (assignments, notes,
    /// presentations) as opposed to a free-form announcement
    pub fn is_coursework(&self) -> bool {
        !matches!(self, Self::General)
    }
}

impl std::fmt::Display for UpdateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UpdateCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assignments" | "assignment" => Ok(Self::Assignments),
            "notes" | "note" => Ok(Self::Notes),
            "presentations" | "presentation" => Ok(Self::Presentations),
            "general" | "announcement" => Ok(Self::General),
            other => Err(format!(
                "Unknown category '{}'. Valid values: assignments, notes, presentations, general",
                other
            )),
        }
    }
}

/// Result of classifying a piece of content.
///
/// Produced by the categorize step, consumed by the format step and by the
/// persistence layer. Transient: owned by the in-flight request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: UpdateCategory,
    /// Model confidence in [0, 1]
    pub confidence: f32,
    pub is_urgent: bool,
    /// Explicitly stated due date, if any (ISO YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Topic tags in model order, deduplicated
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CategoryResult {
    /// The documented degraded result used whenever classification cannot
    /// produce a trustworthy answer. Never an error to the caller.
    pub fn degraded() -> Self {
        Self {
            category: UpdateCategory::General,
            confidence: crate::constants::categorize::DEFAULT_CONFIDENCE,
            is_urgent: false,
            due_date: None,
            tags: Vec::new(),
        }
    }

    /// Clamp confidence into [0, 1] and deduplicate tags preserving order
    pub fn normalize(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|t| seen.insert(t.to_lowercase()));
        self
    }
}

impl Default for CategoryResult {
    fn default() -> Self {
        Self::degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for cat in UpdateCategory::ALL {
            let parsed: UpdateCategory = cat.as_str().parse().unwrap();
            assert_eq!(parsed, cat);
        }
    }

    #[test]
    fn test_category_serde_lowercase() {
        let json = serde_json::to_string(&UpdateCategory::Assignments).unwrap();
        assert_eq!(json, "\"assignments\"");
        let back: UpdateCategory = serde_json::from_str("\"presentations\"").unwrap();
        assert_eq!(back, UpdateCategory::Presentations);
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!("homework".parse::<UpdateCategory>().is_err());
    }

    #[test]
    fn test_degraded_result() {
        let r = CategoryResult::degraded();
        assert_eq!(r.category, UpdateCategory::General);
        assert!((r.confidence - 0.5).abs() < f32::EPSILON);
        assert!(!r.is_urgent);
        assert!(r.tags.is_empty());
        assert!(r.due_date.is_none());
    }

    #[test]
    fn test_normalize_clamps_and_dedups() {
        let r = CategoryResult {
            category: UpdateCategory::Notes,
            confidence: 1.7,
            is_urgent: false,
            due_date: None,
            tags: vec!["cs101".into(), "CS101".into(), "lab".into()],
        }
        .normalize();
        assert!((r.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(r.tags, vec!["cs101".to_string(), "lab".to_string()]);
    }
}
