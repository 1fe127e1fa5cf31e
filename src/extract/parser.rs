//! Recovery of typed question records from raw model output.
//!
//! Parsing never fails outward: a payload the repair rules cannot save is
//! logged and yields an empty list, and a single malformed element is
//! skipped without discarding its siblings. One bad batch or page must not
//! abort a larger run.

use super::repair::repair_json;
use crate::record::ExtractedQuestion;
use serde_json::Value;
use tracing::warn;

/// Repair and parse one model response into question records.
///
/// No business validation happens here beyond shape recovery; an unknown
/// `question_type` or a missing answer is the record's problem, not the
/// parser's.
pub fn parse_questions(raw: &str) -> Vec<ExtractedQuestion> {
    let cleaned = repair_json(raw);

    let envelope: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse model response as JSON: {}", e);
            warn!("Original response: {}...", prefix(raw, 500));
            return Vec::new();
        }
    };

    let items = match envelope.get("questions").and_then(Value::as_array) {
        Some(items) => items,
        None => {
            warn!("Model response carried no questions array");
            warn!("Original response: {}...", prefix(raw, 500));
            return Vec::new();
        }
    };

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<ExtractedQuestion>(item.clone()) {
            Ok(q) => questions.push(q),
            Err(e) => warn!("Skipping malformed question element: {}", e),
        }
    }
    questions
}

/// First `max_bytes` of `s`, clamped to a character boundary.
fn prefix(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
