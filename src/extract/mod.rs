//! Stages between raw input and typed question records.
//!
//! Each submodule implements exactly one transformation step, kept separate
//! so every stage is independently testable against hostile model output.
//!
//! ## Data Flow
//!
//! ```text
//! batch ──▶ chat ──▶ repair ──▶ parser
//! (split)  (provider) (fix JSON) (typed records)
//! ```
//!
//! 1. [`batch`]: split bulk text at line boundaries so one request stays
//!    inside a sane prompt size
//! 2. [`repair`]: normalise whatever the model produced (fences, comments,
//!    truncated arrays) back into the `{"questions": [...]}` envelope
//! 3. [`parser`]: parse the envelope into [`crate::record::ExtractedQuestion`]
//!    values, skipping individually broken elements
//!
//! The chat step itself lives with the providers; the orchestrator in
//! [`crate::extractor`] drives all of it.

pub mod batch;
pub mod parser;
pub mod repair;
