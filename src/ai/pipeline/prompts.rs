//! Pipeline Prompts
//!
//! Prompt builders for the classification and formatting steps. Every prompt
//! demands a bare JSON reply; the parse layer deals with models that wrap it
//! anyway.

use crate::types::CategoryResult;

/// Classification prompt: one of the four fixed categories, urgency cues,
/// and an explicit due date when one is stated.
pub fn categorize_prompt(text: &str) -> String {
    format!(
        r#"You classify content posted to a college notice board.

Pick exactly one category by what the content MEANS, never by file type:
- "assignments": homework, lab work, problem sets, anything to submit
- "notes": lecture notes, study material, summaries, reading material
- "presentations": slides, seminars, demo days, talks
- "general": announcements, schedule changes, events, everything else

Set "is_urgent" to true only when the content carries explicit urgency cues
such as "urgent", "deadline", "submit by", "due", "asap", or a near date.
If a due date is explicitly stated, return it as ISO "YYYY-MM-DD"; otherwise null.
Add up to 5 short lowercase topic tags.

Respond ONLY with JSON in this exact shape:
{{"category": "assignments|notes|presentations|general", "confidence": 0.0, "is_urgent": false, "due_date": null, "tags": []}}

Content:
{text}"#
    )
}

/// Formatting prompt, selected by category and description policy.
///
/// Coursework categories default to a title-only reply; with
/// `describe_coursework` they also get a structured description. General
/// content always gets a rewritten body.
pub fn format_prompt(text: &str, category: &CategoryResult, describe_coursework: bool) -> String {
    if category.category.is_coursework() && !describe_coursework {
        format!(
            r#"Write a short factual title (at most 80 characters) for this {category} post
on a college notice board. Do not copy sentences from the content.

Respond ONLY with JSON: {{"title": "..."}}

Content:
{text}"#,
            category = category.category,
        )
    } else if category.category.is_coursework() {
        format!(
            r#"Write a short factual title (at most 80 characters) and a structured
description for this {category} post on a college notice board. The
description lists deadline, venue, and requirements when the content states
them, one per line. Do not copy sentences from the content verbatim.

Respond ONLY with JSON: {{"title": "...", "description": "..."}}

Content:
{text}"#,
            category = category.category,
        )
    } else {
        format!(
            r#"Rewrite this college notice board announcement. Produce a short title
(at most 80 characters) and a grammar-corrected description organized into
clear paragraphs. Keep every fact; do not invent details; do not copy the
input verbatim.

Respond ONLY with JSON: {{"title": "...", "description": "..."}}

Content:
{text}"#
        )
    }
}

/// Vision prompt for extracting text from an uploaded image
pub fn image_text_prompt() -> &'static str {
    "Extract all readable text from this image, preserving line structure. \
     Reply with the plain text only; reply with an empty string if there is no text."
}
