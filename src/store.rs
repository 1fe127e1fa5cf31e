//! Persistence boundary: where extracted records leave this crate.
//!
//! Long-term storage (a relational schema, a search index, flat files) is the
//! caller's concern. [`QuestionSink`] is the seam they implement; the
//! contract is keyed on a content hash of the source document so that
//! re-running extraction over an already-ingested file is a cheap no-op
//! unless the caller forces a refresh.
//!
//! [`MemorySink`] is the in-process implementation used by tests and dry
//! runs.

use crate::error::Result;
use crate::record::ExtractedQuestion;
use std::collections::HashMap;
use tracing::info;

/// Receiver for extracted question records.
pub trait QuestionSink {
    /// Persist `records` extracted from the document at `source_path` whose
    /// content hash is `source_hash`. Returns the number of records written.
    ///
    /// Implementations are idempotent per hash: a second call with the same
    /// `source_hash` and `force = false` writes nothing and returns 0. With
    /// `force = true` the previous records for that hash are discarded and
    /// the new ones take their place.
    fn save(
        &mut self,
        records: &[ExtractedQuestion],
        source_path: &str,
        source_hash: &str,
        force: bool,
    ) -> Result<usize>;
}

/// Everything retained for one ingested source document.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSource {
    pub source_path: String,
    pub records: Vec<ExtractedQuestion>,
}

/// In-memory [`QuestionSink`] keyed by source hash.
#[derive(Debug, Default)]
pub struct MemorySink {
    sources: HashMap<String, SavedSource>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a document with this content hash has been saved.
    pub fn seen(&self, source_hash: &str) -> bool {
        self.sources.contains_key(source_hash)
    }

    /// Records saved for one source document, if any.
    pub fn records(&self, source_hash: &str) -> Option<&[ExtractedQuestion]> {
        self.sources.get(source_hash).map(|s| s.records.as_slice())
    }

    /// Number of distinct source documents saved.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Total records across all sources.
    pub fn record_count(&self) -> usize {
        self.sources.values().map(|s| s.records.len()).sum()
    }
}

impl QuestionSink for MemorySink {
    fn save(
        &mut self,
        records: &[ExtractedQuestion],
        source_path: &str,
        source_hash: &str,
        force: bool,
    ) -> Result<usize> {
        if self.sources.contains_key(source_hash) {
            if force {
                info!("Force mode: replacing saved records for {}", source_path);
                self.sources.remove(source_hash);
            } else {
                info!("Source already ingested, skipping: {}", source_path);
                return Ok(0);
            }
        }

        let saved = records.len();
        self.sources.insert(
            source_hash.to_string(),
            SavedSource {
                source_path: source_path.to_string(),
                records: records.to_vec(),
            },
        );
        info!("Saved {} questions from {}", saved, source_path);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<ExtractedQuestion> {
        (0..n)
            .map(|i| ExtractedQuestion {
                question_text: format!("Question {}", i + 1),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn second_save_of_same_hash_is_a_no_op() {
        let mut sink = MemorySink::new();
        let records = sample(3);

        let first = sink
            .save(&records, "exams/midterm.pdf", "abc123", false)
            .expect("first save");
        assert_eq!(first, 3);

        let second = sink
            .save(&records, "exams/midterm.pdf", "abc123", false)
            .expect("second save");
        assert_eq!(second, 0);
        assert_eq!(sink.record_count(), 3);
    }

    #[test]
    fn force_replaces_previous_records() {
        let mut sink = MemorySink::new();
        sink.save(&sample(3), "exams/midterm.pdf", "abc123", false)
            .expect("initial save");

        let replaced = sink
            .save(&sample(5), "exams/midterm.pdf", "abc123", true)
            .expect("forced save");
        assert_eq!(replaced, 5);
        assert_eq!(sink.record_count(), 5);
        assert_eq!(sink.source_count(), 1);
    }

    #[test]
    fn distinct_hashes_are_kept_apart() {
        let mut sink = MemorySink::new();
        sink.save(&sample(2), "exams/a.pdf", "hash-a", false)
            .expect("save a");
        sink.save(&sample(4), "exams/b.pdf", "hash-b", false)
            .expect("save b");

        assert!(sink.seen("hash-a"));
        assert!(sink.seen("hash-b"));
        assert!(!sink.seen("hash-c"));
        assert_eq!(sink.source_count(), 2);
        assert_eq!(sink.records("hash-b").map(<[_]>::len), Some(4));
    }
}
