//! Question records produced by extraction.
//!
//! Everything in this module is shaped by one constraint: the JSON comes from
//! a language model, not from a schema-checked producer. Fields go missing,
//! enums arrive with unseen spellings, `correct_answer` is sometimes a string
//! and sometimes an array. Deserialization therefore defaults aggressively
//! instead of failing, so one sloppy field never discards an otherwise good
//! question.
//!
//! Records round-trip through [`serde_json`]: the parser builds them from
//! model output, the cropper enriches them with asset paths, and sinks
//! serialize them back out with the same wire names.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ── Enumerations ────────────────────────────────────────────────────────────

/// Question format. Unknown tags collapse to [`QuestionType::Other`] rather
/// than rejecting the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionType {
    #[default]
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Other,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Other => "other",
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "single_choice" => QuestionType::SingleChoice,
            "multiple_choice" => QuestionType::MultipleChoice,
            "true_false" => QuestionType::TrueFalse,
            _ => QuestionType::Other,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for QuestionType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QuestionType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // Option tolerates an explicit `null`; a missing key is handled by
        // `#[serde(default)]` on the containing struct.
        let tag = Option::<String>::deserialize(d)?;
        Ok(tag.as_deref().map(Self::from_tag).unwrap_or_default())
    }
}

/// Subjective difficulty rating. Unknown tags fall back to
/// [`Difficulty::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Difficulty {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(d)?;
        Ok(tag.as_deref().map(Self::from_tag).unwrap_or_default())
    }
}

// ── Geometry ────────────────────────────────────────────────────────────────

/// Figure location in absolute pixel coordinates of the rendered page image
/// it was detected on, top-left origin, `[x1, y1, x2, y2]` on the wire.
///
/// Coordinates are never normalized to `[0, 1]` or to a fixed reference
/// range; a box is meaningless without its source image. Models frequently
/// emit fractional values, which are rounded to the nearest pixel on
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self {
            x1: x1.round() as i64,
            y1: y1.round() as i64,
            x2: x2.round() as i64,
            y2: y2.round() as i64,
        }
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> [i64; 4] {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

// ── Records ─────────────────────────────────────────────────────────────────

/// One answer option of a choice question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedOption {
    /// Option label, e.g. `"A"`.
    pub key: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub has_figure: bool,
    #[serde(default)]
    pub figure_bbox: Option<BoundingBox>,
    /// `Some(true)` / `Some(false)` when the source states the answer,
    /// `None` when it does not.
    #[serde(default)]
    pub is_correct: Option<bool>,
    /// Public URL of the cropped option figure, filled in by the cropper.
    #[serde(
        rename = "option_image_path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_path: Option<String>,
}

impl ExtractedOption {
    /// The region to crop for this option, if it both claims a figure and
    /// provides coordinates for it.
    pub fn figure_region(&self) -> Option<BoundingBox> {
        if self.has_figure {
            self.figure_bbox
        } else {
            None
        }
    }
}

/// One extracted exam question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedQuestion {
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub has_figure: bool,
    #[serde(default)]
    pub figure_bbox: Option<BoundingBox>,
    /// Model's one-line description of the figure, when it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_description: Option<String>,
    #[serde(default)]
    pub options: Vec<ExtractedOption>,
    /// Normalized answer text. An array answer such as `["A", "C"]` is
    /// collapsed to `"AC"`; `None` means the source did not state one.
    #[serde(default, deserialize_with = "de_answer")]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Category labels keyed by facet (`company`, `question_type`,
    /// `subject`, `skill`).
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// 1-based page the question came from. Stamped by page-image
    /// extraction, never requested of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Public URL of the cropped question figure, filled in by the cropper.
    #[serde(
        rename = "question_image_path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_path: Option<String>,
}

impl ExtractedQuestion {
    /// The region to crop for the question stem, if it both claims a figure
    /// and provides coordinates for it.
    pub fn figure_region(&self) -> Option<BoundingBox> {
        if self.has_figure {
            self.figure_bbox
        } else {
            None
        }
    }
}

/// Models answer in whatever shape they like; flatten it to one string.
fn de_answer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(items.iter().map(scalar_text).collect()),
        other => Some(other.to_string()),
    })
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
