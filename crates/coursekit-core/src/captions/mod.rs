//! Caption System Module
//!
//! Provides transcript lookup for the video player:
//! - Transcript payloads ("sjson": parallel start/end/text arrays)
//! - The caption index (active caption at a time, captions in a range)
//! - Playback tracking (player time to highlighted caption)
//! - SRT / TXT conversion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - TranscriptPayload (sjson)                      │
//! │  index.rs      - CaptionIndex: binary search + range filter     │
//! │  playback.rs   - CaptionTracker: speed, clip, look-ahead        │
//! │  formats.rs    - sjson / SRT / TXT conversion                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use coursekit_core::captions::{CaptionTracker, TranscriptPayload, DEFAULT_LOOKAHEAD_MS};
//!
//! let payload = TranscriptPayload::from_json(&std::fs::read_to_string("transcript.sjson")?)?;
//! let mut tracker = CaptionTracker::new(payload.into_index(), None, DEFAULT_LOOKAHEAD_MS);
//!
//! if let Some(index) = tracker.update(player_time_sec, 1.0) {
//!     highlight(index);
//! }
//! ```

mod formats;
mod index;
mod models;
mod playback;

pub use models::TranscriptPayload;

pub use index::{CaptionBounds, CaptionIndex, FilteredCaptions};

pub use playback::{to_normal_speed, CaptionTracker, PlaybackClip, DEFAULT_LOOKAHEAD_MS};

pub use formats::{convert, export_srt, export_txt, parse_srt, ParseError, TranscriptFormat};
