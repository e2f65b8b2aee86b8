/// Caption handling: timed-text parsing, SRT rendering and the caption source.
pub mod source;
pub mod srt;
pub mod timedtext;

pub use source::{CaptionSource, TimedTextClient};
pub use srt::{format_timestamp, transcode, SubtitleBlock};
pub use timedtext::parse_cues;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One timed caption entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    /// Offset from the start of the video, in seconds
    pub start: f64,
    /// Display duration, in seconds
    pub duration: f64,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Caption parse error: {0}")]
    Parse(String),
}

/// Parse timed-text markup and render it as SRT in one step.
pub fn markup_to_srt(markup: &str) -> Result<String, TranscodeError> {
    let cues = parse_cues(markup)?;
    Ok(transcode(&cues))
}
