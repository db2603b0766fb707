//! Caption Index
//!
//! Immutable lookup structure over parallel caption start times and texts.
//!
//! Two queries are supported:
//! - [`CaptionIndex::search`]: the caption active at a given time
//! - [`CaptionIndex::filter`]: the captions starting inside an inclusive range
//!
//! The index is unit-agnostic; transcript payloads use milliseconds.
//! Malformed input never fails: mismatched array lengths are logged once
//! and only the aligned prefix of both arrays is used.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TranscriptPayload;

// =============================================================================
// Query Types
// =============================================================================

/// Restricts a search to captions starting within `[start, end]`.
///
/// `end == None` means "through the last caption".
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionBounds {
    pub start: f64,
    pub end: Option<f64>,
}

impl CaptionBounds {
    pub fn new(start: f64, end: Option<f64>) -> Self {
        Self { start, end }
    }
}

/// Parallel sub-arrays returned by [`CaptionIndex::filter`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredCaptions {
    /// Start times of the matching captions
    pub start: Vec<f64>,
    /// Texts of the matching captions
    pub captions: Vec<String>,
}

impl FilteredCaptions {
    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }
}

// =============================================================================
// Caption Index
// =============================================================================

/// Queryable index over a transcript's start times and texts
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionIndex {
    start_times: Vec<f64>,
    captions: Vec<String>,
}

impl CaptionIndex {
    /// Builds an index from parallel arrays.
    ///
    /// A length mismatch is tolerated and reported once here.
    pub fn new(start_times: Vec<f64>, captions: Vec<String>) -> Self {
        if start_times.len() != captions.len() {
            warn!(
                start_times = start_times.len(),
                captions = captions.len(),
                "Caption and start time arrays do not match in length"
            );
        }

        Self {
            start_times,
            captions,
        }
    }

    /// Returns the caption texts as supplied
    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    /// Returns the start times as supplied
    pub fn start_times(&self) -> &[f64] {
        &self.start_times
    }

    /// Number of usable captions (the shorter of the two arrays)
    pub fn size(&self) -> usize {
        self.start_times.len().min(self.captions.len())
    }

    /// Returns true if the index has no usable captions
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the caption text at `index`, if it is within the usable range
    pub fn caption(&self, index: usize) -> Option<&str> {
        if index < self.size() {
            self.captions.get(index).map(String::as_str)
        } else {
            None
        }
    }

    /// Finds the caption active at `time`.
    ///
    /// Returns the largest `i` with `start[i] <= time`. When `bounds` is
    /// given, the search runs over [`filter`](Self::filter)'s output and
    /// the result indexes into that filtered sequence.
    ///
    /// A time before the first caption yields `0`, the same as a time
    /// inside caption 0. An empty index also yields `0`.
    pub fn search(&self, time: f64, bounds: Option<CaptionBounds>) -> usize {
        match bounds {
            Some(bounds) => {
                let filtered = self.filter(bounds.start, bounds.end);
                binary_search(&filtered.start, time)
            }
            None => binary_search(&self.start_times[..self.size()], time),
        }
    }

    /// Returns the captions whose start time lies in `[start, end]`.
    ///
    /// `end == None` on a non-empty index is treated as the last caption's
    /// start time. Order is preserved.
    pub fn filter(&self, start: f64, end: Option<f64>) -> FilteredCaptions {
        let size = self.size();
        let end = match end {
            Some(end) => end,
            None => match self.start_times.last() {
                Some(&last) => last,
                None => return FilteredCaptions::default(),
            },
        };

        let mut filtered = FilteredCaptions::default();
        for (time, caption) in self.start_times[..size]
            .iter()
            .zip(&self.captions[..size])
        {
            if *time >= start && *time <= end {
                filtered.start.push(*time);
                filtered.captions.push(caption.clone());
            }
        }

        filtered
    }
}

impl From<TranscriptPayload> for CaptionIndex {
    fn from(payload: TranscriptPayload) -> Self {
        Self::new(payload.start, payload.text)
    }
}

impl TranscriptPayload {
    /// Consumes the payload and builds a [`CaptionIndex`]
    pub fn into_index(self) -> CaptionIndex {
        CaptionIndex::from(self)
    }
}

/// Largest `i` with `starts[i] <= time`, or 0.
///
/// The midpoint rounds up so the window always shrinks; the loop ends when
/// `min == max`.
fn binary_search(starts: &[f64], time: f64) -> usize {
    let mut min = 0;
    let mut max = starts.len().saturating_sub(1);

    while min < max {
        let index = (min + max).div_ceil(2);
        if time < starts[index] {
            max = index - 1;
        } else {
            min = index;
        }
    }

    min
}

// =============================================================================
// Tests
// =============================================================================
