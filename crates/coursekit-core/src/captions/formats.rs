//! Transcript Format Conversion
//!
//! Converts transcripts between the formats the video player deals with:
//! - sjson (parallel-array JSON, see [`TranscriptPayload`])
//! - SRT (SubRip)
//! - TXT (plain caption text, one caption per line)
//!
//! # Example
//!
//! ```rust,ignore
//! use coursekit_core::captions::{convert, TranscriptFormat};
//!
//! let srt_content = std::fs::read_to_string("lecture.srt")?;
//! let sjson = convert(&srt_content, TranscriptFormat::Srt, TranscriptFormat::Sjson)?;
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::TranscriptPayload;
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing SubRip content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid timestamp format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Invalid cue format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Missing required data
    #[error("Missing data: {0}")]
    MissingData(String),
    /// Unexpected end of input
    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

impl From<ParseError> for CoreError {
    fn from(err: ParseError) -> Self {
        CoreError::TranscriptParse(err.to_string())
    }
}

// =============================================================================
// Transcript Format
// =============================================================================

/// Transcript formats understood by [`convert`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptFormat {
    Sjson,
    Srt,
    Txt,
}

impl TranscriptFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sjson => "sjson",
            Self::Srt => "srt",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sjson" | "json" => Ok(Self::Sjson),
            "srt" => Ok(Self::Srt),
            "txt" => Ok(Self::Txt),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Converts transcript `content` from one format to another.
///
/// Accepted inputs: sjson, srt. Accepted outputs: sjson, srt, txt.
pub fn convert(content: &str, from: TranscriptFormat, to: TranscriptFormat) -> CoreResult<String> {
    if from == TranscriptFormat::Txt {
        return Err(CoreError::UnsupportedFormat(
            "txt is not accepted as an input format".to_string(),
        ));
    }

    if from == to {
        return Ok(content.to_string());
    }

    let payload = match from {
        TranscriptFormat::Srt => parse_srt(content)?,
        _ => TranscriptPayload::from_json(content)?,
    };

    match to {
        TranscriptFormat::Sjson => payload.to_json(),
        TranscriptFormat::Srt => Ok(export_srt(&payload)),
        TranscriptFormat::Txt => Ok(export_txt(&payload)),
    }
}

// =============================================================================
// SRT Format
// =============================================================================

/// Parses SubRip content into an sjson payload.
///
/// Timings become whole milliseconds; multi-line cue text is joined with
/// single spaces.
///
/// # SRT Format
///
/// ```text
/// 1
/// 00:00:01,000 --> 00:00:04,000
/// First caption text
///
/// 2
/// 00:00:05,500 --> 00:00:08,000
/// Second caption text
/// with multiple lines
/// ```
pub fn parse_srt(content: &str) -> Result<TranscriptPayload, ParseError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut payload = TranscriptPayload::default();
    let mut lines = content.lines().peekable();

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        // Sequence number (not validated)
        if lines.next().is_none() {
            break;
        }

        let timestamp_line = lines.next().ok_or(ParseError::UnexpectedEnd)?;
        let (start_ms, end_ms) = parse_srt_timestamp_line(timestamp_line)?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line.trim_end());
        }

        if text_lines.is_empty() {
            return Err(ParseError::MissingData("Caption text".to_string()));
        }

        payload.start.push(start_ms);
        payload.end.push(end_ms);
        payload.text.push(text_lines.join(" "));
    }

    Ok(payload)
}

/// Parses an SRT timestamp line (e.g., "00:00:01,000 --> 00:00:04,000")
fn parse_srt_timestamp_line(line: &str) -> Result<(f64, f64), ParseError> {
    let (start, end) = line.split_once("-->").ok_or_else(|| {
        ParseError::InvalidFormat(format!("Expected 'start --> end' format: {}", line))
    })?;

    // Some tools append position hints after the end timestamp.
    let end = end.split_whitespace().next().unwrap_or_default();

    Ok((parse_srt_timestamp(start.trim())?, parse_srt_timestamp(end)?))
}

/// Parses an SRT timestamp (e.g., "00:01:23,456") into milliseconds
fn parse_srt_timestamp(ts: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());

    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: f64 = parts[2].parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }

    let whole_ms = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|secs| secs.checked_mul(1000))
        .ok_or_else(invalid)?;
    Ok((whole_ms as f64 + seconds * 1000.0).round())
}

/// Exports an sjson payload to SubRip.
///
/// Returns an empty string unless `start`, `end` and `text` have equal
/// lengths.
pub fn export_srt(payload: &TranscriptPayload) -> String {
    if !payload.has_equal_lengths() {
        return String::new();
    }

    let mut output = String::new();
    for (i, ((start, end), text)) in payload
        .start
        .iter()
        .zip(&payload.end)
        .zip(&payload.text)
        .enumerate()
    {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(*start),
            format_srt_timestamp(*end)
        ));
        output.push_str(text);
        output.push_str("\n\n");
    }

    output
}

/// Formats milliseconds as an SRT timestamp (00:00:00,000)
fn format_srt_timestamp(ms: f64) -> String {
    let total_ms = if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    };
    let millis = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

// =============================================================================
// TXT Format
// =============================================================================

/// Exports caption texts one per line, with HTML entities unescaped
pub fn export_txt(payload: &TranscriptPayload) -> String {
    let joined = payload.text.join("\n");
    unescape_html(&joined)
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", "\u{a0}")
        // Last, so "&amp;lt;" becomes "&lt;" rather than "<".
        .replace("&amp;", "&")
}

// =============================================================================
// Tests
// =============================================================================
