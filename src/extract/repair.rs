//! Deterministic repair of almost-JSON model output.
//!
//! ## Why is repair necessary?
//!
//! Even firmly prompted models hand back payloads that are *almost* the
//! `{"questions": [...]}` envelope but not quite:
//!
//! - Wrapped in ` ```json ... ``` ` fences despite the prompt saying not to
//! - Annotated with `// remaining questions omitted` style comments
//! - A bare `[...]` array with no envelope around it
//! - Cut off mid-element when the completion budget ran out
//!
//! This module applies cheap, ordered, pure text transforms that undo those
//! quirks without attempting real JSON parsing. Each rule is independently
//! testable. Quote-awareness is best-effort: comments and commas inside
//! well-formed string literals are left alone, but no guarantee is made for
//! output that is pathological inside its own strings.
//!
//! ## Rule Order
//!
//! Fences come off first so the remaining rules see the payload, comments
//! are stripped before any bracket scanning, and trailing commas are removed
//! before the truncated-array close so the re-closed array does not end in
//! a dangling comma.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise raw model output into (hopefully) parseable envelope JSON.
///
/// Rules (applied in order):
/// 1. Unwrap the first fenced code block, preferring a ` ```json ` fence
/// 2. Strip `//` line comments outside string literals
/// 3. Strip `/* ... */` block comments outside string literals
/// 4. Remove trailing commas before `]` or `}`
/// 5. If the payload is a bare array: close it after the last complete
///    element when truncated, then wrap it in the `questions` envelope
pub fn repair_json(raw: &str) -> String {
    let content = extract_fenced(raw);
    let content = strip_line_comments(content);
    let content = strip_block_comments(&content);
    let content = content.trim();
    let content = remove_trailing_commas(content);

    if content.starts_with('[') {
        let array = close_truncated_array(&content);
        format!("{{\"questions\": {}}}", array)
    } else {
        content.into_owned()
    }
}

// ── Rule 1: Unwrap code fences ──────────────────────────────────────────────

/// Take the interior of the first fenced block. A missing closing fence
/// (truncated output) yields everything after the opening fence.
fn extract_fenced(raw: &str) -> &str {
    for opener in ["```json", "```"] {
        if let Some(start) = raw.find(opener) {
            let after = &raw[start + opener.len()..];
            return match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            };
        }
    }
    raw
}

// ── Rule 2: Strip line comments ─────────────────────────────────────────────

fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate one line at the first `//` outside a string literal.
fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    for i in 0..bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return line[..i].trim_end();
        }
    }
    line
}

// ── Rule 3: Strip block comments ────────────────────────────────────────────

fn strip_block_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                // An unterminated comment swallows the rest of the text.
                let mut prev = '\0';
                for c2 in chars.by_ref() {
                    if prev == '*' && c2 == '/' {
                        break;
                    }
                    prev = c2;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 4: Remove trailing commas ──────────────────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

fn remove_trailing_commas(content: &str) -> std::borrow::Cow<'_, str> {
    RE_TRAILING_COMMA.replace_all(content, "$1")
}

// ── Rule 5: Close a truncated bare array ────────────────────────────────────

/// Re-close an unterminated array after its last complete object element,
/// dropping the incomplete tail. Already-terminated arrays pass through.
fn close_truncated_array(content: &str) -> String {
    if content.ends_with(']') {
        return content.to_string();
    }

    // Depth 1 is the inside of the outer array; an object element is
    // complete when a '}' brings the depth back down to 1.
    let mut in_string = false;
    let mut escaped = false;
    let mut depth = 0i32;
    let mut last_complete = None;

    for (i, c) in content.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 1 && c == '}' {
                    last_complete = Some(i + 1);
                }
            }
            _ => {}
        }
    }

    match last_complete {
        Some(end) => format!("{}\n]", &content[..end]),
        None => "[]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn json_fence_is_unwrapped() {
        let raw = "Here you go:\n```json\n{\"questions\": []}\n```\nDone.";
        assert_eq!(repair_json(raw), "{\"questions\": []}");
    }

    #[test]
    fn generic_fence_is_unwrapped() {
        let raw = "```\n{\"questions\": []}\n```";
        assert_eq!(repair_json(raw), "{\"questions\": []}");
    }

    #[test]
    fn missing_closing_fence_keeps_the_tail() {
        // Truncated completions routinely lose the closing fence.
        let raw = "```json\n[{\"question_text\": \"q1\"}]";
        let fixed = repair_json(raw);
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["questions"][0]["question_text"], "q1");
    }

    #[test]
    fn line_comments_outside_strings_are_stripped() {
        let line = r#"  "a": 1, // note"#;
        assert_eq!(strip_line_comment(line), r#"  "a": 1,"#);

        let url = r#"  "link": "http://example.com""#;
        assert_eq!(strip_line_comment(url), url);

        let escaped = r#"  "text": "quote \" then // stays""#;
        assert_eq!(strip_line_comment(escaped), escaped);
    }

    #[test]
    fn block_comments_are_stripped_quote_aware() {
        assert_eq!(
            strip_block_comments("{\"a\": 1 /* two\nlines */, \"b\": 2}"),
            "{\"a\": 1 , \"b\": 2}"
        );
        assert_eq!(
            strip_block_comments(r#"{"a": "/* not a comment */"}"#),
            r#"{"a": "/* not a comment */"}"#
        );
        // Unterminated comment swallows the rest rather than erroring.
        assert_eq!(strip_block_comments("{\"a\": 1} /* trailing"), "{\"a\": 1} ");
    }

    #[test]
    fn trailing_commas_are_removed() {
        assert_eq!(
            remove_trailing_commas("[{\"a\": 1}, {\"b\": 2},  ]"),
            "[{\"a\": 1}, {\"b\": 2}]"
        );
        assert_eq!(remove_trailing_commas("{\"a\": 1,\n}"), "{\"a\": 1}");
    }

    #[test]
    fn bare_array_is_wrapped_in_the_envelope() {
        let fixed = repair_json("[{\"question_text\": \"q1\"}]");
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["questions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn truncated_array_keeps_complete_leading_elements() {
        let raw = "[{\"question_text\": \"q1\", \"options\": [{\"key\": \"A\"}]}, {\"question_text\": \"q2\"}, {\"question_text\": \"cut off";
        let fixed = repair_json(raw);
        let v: Value = serde_json::from_str(&fixed).unwrap();
        let qs = v["questions"].as_array().unwrap();
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0]["question_text"], "q1");
        assert_eq!(qs[1]["question_text"], "q2");
    }

    #[test]
    fn truncation_ignores_braces_inside_strings() {
        let raw = "[{\"question_text\": \"set {1, 2} below\"}, {\"question_text\": \"trunc";
        let fixed = repair_json(raw);
        let v: Value = serde_json::from_str(&fixed).unwrap();
        let qs = v["questions"].as_array().unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0]["question_text"], "set {1, 2} below");
    }

    #[test]
    fn truncated_array_with_no_complete_element_collapses_to_empty() {
        let fixed = repair_json("[{\"question_text\": \"never closed");
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["questions"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn enveloped_object_with_comments_and_commas_parses() {
        let raw = r#"```json
{
    "questions": [
        {"question_text": "q1", "difficulty": "easy"}, // first
        {"question_text": "q2"},
    ]
}
```"#;
        let fixed = repair_json(raw);
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["questions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn clean_payloads_pass_through_unchanged() {
        let raw = "{\"questions\": [{\"question_text\": \"q\"}]}";
        assert_eq!(repair_json(raw), raw);
    }
}
