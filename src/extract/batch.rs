//! Threshold-based splitting of bulk text into extraction batches.

/// Split `text` into batches of roughly `threshold` bytes, preferring to cut
/// at line boundaries.
///
/// The cursor advances by `threshold`, then backs up to the last newline
/// inside the window so a question is not severed mid-line; the newline
/// itself starts the next batch. Cuts are clamped to UTF-8 character
/// boundaries, so the only way a batch exceeds `threshold` is a single
/// character wider than the whole window. Concatenating the returned
/// batches always reconstructs `text` exactly.
pub fn split_batches(text: &str, threshold: usize) -> Vec<&str> {
    let threshold = threshold.max(1);
    if text.len() <= threshold {
        return vec![text];
    }

    let mut batches = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + threshold).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // One character is wider than the window; take it whole.
            end = start + threshold;
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
            end = end.min(text.len());
        }
        if end < text.len() {
            // A newline at the window start would make an empty batch;
            // ignore it and cut on the byte count instead.
            if let Some(pos) = text[start..end].rfind('\n') {
                if pos > 0 {
                    end = start + pos;
                }
            }
        }
        batches.push(&text[start..end]);
        start = end;
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_batch() {
        assert_eq!(split_batches("one question", 3000), vec!["one question"]);
        assert_eq!(split_batches("", 3000), vec![""]);
    }

    #[test]
    fn cuts_land_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_batches(text, 7), vec!["aaaa", "\nbbbb", "\ncccc"]);
    }

    #[test]
    fn batches_reconstruct_the_input() {
        let text = (1..=40)
            .map(|i| format!("{i}. Which of the following holds?\nA. yes\nB. no\n"))
            .collect::<String>();
        let batches = split_batches(&text, 100);
        assert!(batches.len() > 1);
        assert_eq!(batches.concat(), text);
        for batch in &batches {
            assert!(batch.len() <= 100, "batch too long: {}", batch.len());
        }
    }

    #[test]
    fn newline_at_window_start_is_ignored() {
        let text = "\naaaaaaaaaa";
        let batches = split_batches(text, 5);
        assert_eq!(batches[0], "\naaaa");
        assert_eq!(batches.concat(), text);
    }

    #[test]
    fn multibyte_text_never_splits_a_character() {
        let text = "第一题：以下哪个正确？\n甲、乙、丙、丁\n第二题：继续作答。";
        let batches = split_batches(text, 10);
        assert!(batches.len() > 1);
        assert_eq!(batches.concat(), text);
    }

    #[test]
    fn no_newline_in_window_falls_back_to_byte_cut() {
        let text = "abcdefghij";
        assert_eq!(split_batches(text, 4), vec!["abcd", "efgh", "ij"]);
    }
}
