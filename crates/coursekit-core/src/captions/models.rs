//! Transcript Data Models
//!
//! Defines the "sjson" transcript payload served to the video player.
//!
//! # Overview
//!
//! A transcript is three parallel arrays:
//! - `start`: caption start times in milliseconds
//! - `end`: caption end times in milliseconds (optional for lookup)
//! - `text`: caption texts
//!
//! Lookup only needs `start` and `text`; `end` is required to export SubRip.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Transcript Payload
// =============================================================================

/// Parallel-array transcript payload ("sjson")
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptPayload {
    /// Start times in milliseconds
    #[serde(default)]
    pub start: Vec<f64>,
    /// End times in milliseconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub end: Vec<f64>,
    /// Caption texts (`null` entries decode as empty strings)
    #[serde(default, deserialize_with = "deserialize_texts")]
    pub text: Vec<String>,
}

fn deserialize_texts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<String>> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().map(Option::unwrap_or_default).collect())
}

impl TranscriptPayload {
    /// Creates a payload from start times and texts only
    pub fn new(start: Vec<f64>, text: Vec<String>) -> Self {
        Self {
            start,
            end: Vec::new(),
            text,
        }
    }

    /// Creates a payload with explicit end times
    pub fn with_end(start: Vec<f64>, end: Vec<f64>, text: Vec<String>) -> Self {
        Self { start, end, text }
    }

    /// Parses a payload from JSON
    pub fn from_json(content: &str) -> CoreResult<Self> {
        // Transcripts uploaded from Windows tools often carry a BOM.
        let content = content.trim_start_matches('\u{feff}');
        Ok(serde_json::from_str(content)?)
    }

    /// Serializes the payload to compact JSON
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true if `start`, `end` and `text` all have the same length
    pub fn has_equal_lengths(&self) -> bool {
        self.start.len() == self.end.len() && self.end.len() == self.text.len()
    }

    /// Number of captions in the payload (the length of `text`)
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the payload has no captions
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Converts timings recorded at `source_speed` into timings for `speed`.
    ///
    /// Each timestamp becomes `round(t * speed / source_speed)`.
    pub fn rescale(&self, speed: f64, source_speed: f64) -> CoreResult<Self> {
        validate_speed(speed)?;
        validate_speed(source_speed)?;

        if speed == source_speed {
            return Ok(self.clone());
        }

        let coefficient = speed / source_speed;
        let scale = |times: &[f64]| -> Vec<f64> {
            times.iter().map(|t| (t * coefficient).round()).collect()
        };

        Ok(Self {
            start: scale(&self.start),
            end: scale(&self.end),
            text: self.text.clone(),
        })
    }
}

fn validate_speed(speed: f64) -> CoreResult<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidSpeed(speed))
    }
}

// =============================================================================
// Tests
// =============================================================================
