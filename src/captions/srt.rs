use serde::{Deserialize, Serialize};
use std::fmt;

use super::CaptionCue;

/// SRT (SubRip Subtitle) block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleBlock {
    /// Sequential number, starting at 1
    pub index: u32,
    /// Formatted start timestamp
    pub start: String,
    /// Formatted end timestamp
    pub end: String,
    /// Subtitle text
    pub text: String,
}

impl SubtitleBlock {
    /// Build the block for the cue at `index` (1-based)
    pub fn from_cue(index: u32, cue: &CaptionCue) -> Self {
        Self {
            index,
            start: format_timestamp(cue.start),
            end: format_timestamp(cue.start + cue.duration),
            text: cue.text.clone(),
        }
    }
}

impl fmt::Display for SubtitleBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index, self.start, self.end, self.text
        )
    }
}

/// Convert cues into subtitle blocks, keeping document order.
pub fn to_blocks(cues: &[CaptionCue]) -> Vec<SubtitleBlock> {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| SubtitleBlock::from_cue((i + 1) as u32, cue))
        .collect()
}

/// Render cues as SRT text.
///
/// Every block is followed by a blank separator line. No cues yields an
/// empty string.
pub fn transcode(cues: &[CaptionCue]) -> String {
    let blocks = to_blocks(cues);
    if blocks.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = Vec::with_capacity(blocks.len() * 4);
    for block in blocks {
        lines.push(block.index.to_string());
        lines.push(format!("{} --> {}", block.start, block.end));
        lines.push(block.text);
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Format elapsed seconds as an SRT timestamp (HH:MM:SS,mmm).
///
/// Each component is rounded on its own and never carried into the next
/// one, so a fractional part of .9996 renders as `,1000`. Existing
/// uploads were produced with this rounding, keep it.
pub fn format_timestamp(value: f64) -> String {
    let value = value.max(0.0);

    let hours = (value / 3600.0).floor();
    let remainder = value % 3600.0;
    let minutes = (remainder / 60.0).floor();
    let remainder = remainder % 60.0;
    let seconds = remainder.floor();
    let millis = (remainder % 1.0) * 1000.0;

    format!(
        "{:02}:{:02}:{:02},{:03}",
        hours.round() as u64,
        minutes.round() as u64,
        seconds.round() as u64,
        millis.round() as u64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(start: f64, duration: f64, text: &str) -> CaptionCue {
        CaptionCue {
            start,
            duration,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(1.0), "00:00:01,000");
        assert_eq!(format_timestamp(3.5), "00:00:03,500");
        assert_eq!(format_timestamp(3661.25), "01:01:01,250");
        assert_eq!(format_timestamp(59.6), "00:00:59,600");
    }

    #[test]
    fn test_millisecond_rounding_is_not_carried() {
        assert_eq!(format_timestamp(59.9996), "00:00:59,1000");
        assert_eq!(format_timestamp(3599.9999), "00:59:59,1000");
    }

    #[test]
    fn test_block_time_range() {
        let block = SubtitleBlock::from_cue(1, &cue(1.0, 2.5, "Hello"));
        assert_eq!(block.start, "00:00:01,000");
        assert_eq!(block.end, "00:00:03,500");
        assert_eq!(block.to_string(), "1\n00:00:01,000 --> 00:00:03,500\nHello\n");
    }

    #[test]
    fn test_transcode_two_cues() {
        let output = transcode(&[cue(1.0, 2.5, "First line"), cue(4.0, 1.0, "Second line")]);

        assert_eq!(
            output,
            "1\n00:00:01,000 --> 00:00:03,500\nFirst line\n\n\
             2\n00:00:04,000 --> 00:00:05,000\nSecond line\n"
        );

        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "2");
        assert_eq!(lines[7], "");
    }

    #[test]
    fn test_transcode_keeps_document_order() {
        let output = transcode(&[cue(10.0, 1.0, "later"), cue(2.0, 1.0, "earlier")]);
        assert!(output.starts_with("1\n00:00:10,000"));
        assert!(output.contains("2\n00:00:02,000"));
    }

    #[test]
    fn test_transcode_empty() {
        assert_eq!(transcode(&[]), "");
        assert!(to_blocks(&[]).is_empty());
    }
}
