//! Playback Caption Tracking
//!
//! Maps the player's current time to the caption that should be
//! highlighted, reporting only changes so callers can update the display
//! once per caption rather than once per time update.

use serde::{Deserialize, Serialize};

use super::{CaptionBounds, CaptionIndex, FilteredCaptions};

/// Default look-ahead applied to playback time before lookup, in milliseconds
pub const DEFAULT_LOOKAHEAD_MS: f64 = 100.0;

// =============================================================================
// Playback Clip
// =============================================================================

/// The part of the video configured for playback, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackClip {
    pub start_sec: f64,
    pub end_sec: Option<f64>,
}

impl PlaybackClip {
    pub fn new(start_sec: f64, end_sec: Option<f64>) -> Self {
        Self { start_sec, end_sec }
    }

    /// Returns the clip as caption bounds in milliseconds, or `None` when the
    /// clip covers the whole video.
    pub fn bounds_ms(&self) -> Option<CaptionBounds> {
        if self.start_sec <= 0.0 && self.end_sec.is_none() {
            return None;
        }

        Some(CaptionBounds::new(
            self.start_sec * 1000.0,
            self.end_sec.map(|end| end * 1000.0),
        ))
    }
}

/// Converts a time measured at `speed` into 1.0x time, rounded to 3 decimals
pub fn to_normal_speed(time_sec: f64, speed: f64) -> f64 {
    (time_sec * speed * 1000.0).round() / 1000.0
}

// =============================================================================
// Caption Tracker
// =============================================================================

/// Tracks the currently highlighted caption during playback
#[derive(Clone, Debug)]
pub struct CaptionTracker {
    index: CaptionIndex,
    bounds: Option<CaptionBounds>,
    bounded: FilteredCaptions,
    lookahead_ms: f64,
    current: Option<usize>,
}

impl CaptionTracker {
    /// Creates a tracker over `index`, limited to `clip` when given
    pub fn new(index: CaptionIndex, clip: Option<PlaybackClip>, lookahead_ms: f64) -> Self {
        let bounds = clip.and_then(|c| c.bounds_ms());
        let bounded = match bounds {
            Some(b) => index.filter(b.start, b.end),
            None => index.filter(f64::NEG_INFINITY, None),
        };

        Self {
            index,
            bounds,
            bounded,
            lookahead_ms,
            current: None,
        }
    }

    pub fn index(&self) -> &CaptionIndex {
        &self.index
    }

    /// The captions the player renders: the clip's captions, or all of them
    pub fn bounded_captions(&self) -> &FilteredCaptions {
        &self.bounded
    }

    /// Index into [`bounded_captions`](Self::bounded_captions) of the current caption
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_caption(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.bounded.captions.get(i))
            .map(String::as_str)
    }

    /// Feeds a player time update.
    ///
    /// `speed` is the playback speed `time_sec` was measured at; pass 1.0
    /// when the player reports media time. Returns the new caption index
    /// when it differs from the current one.
    pub fn update(&mut self, time_sec: f64, speed: f64) -> Option<usize> {
        if self.bounded.is_empty() {
            return None;
        }

        let normal = to_normal_speed(time_sec, speed);
        let time_ms = (normal * 1000.0 + self.lookahead_ms).round();
        let index = self.index.search(time_ms, self.bounds);

        if self.current == Some(index) {
            return None;
        }

        self.current = Some(index);
        Some(index)
    }

    /// Forgets the current caption so the next update reports again
    pub fn reset(&mut self) {
        self.current = None;
    }
}

// =============================================================================
// Tests
// =============================================================================
