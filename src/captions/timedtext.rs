//! Timed-text caption markup parsing.
//!
//! The caption endpoint serves a small XML document:
//!
//! ```xml
//! <transcript>
//!   <text start="1.05" dur="2.4">It&amp;#39;s a trap</text>
//! </transcript>
//! ```
//!
//! Entities inside cue text are escaped twice, so text is decoded once by
//! the XML parser and once more as HTML.

use scraper::Html;

use super::{CaptionCue, TranscodeError};

/// Parse timed-text markup into cues, in document order.
pub fn parse_cues(markup: &str) -> Result<Vec<CaptionCue>, TranscodeError> {
    let doc = roxmltree::Document::parse(markup)
        .map_err(|e| TranscodeError::Parse(format!("XML parse error: {}", e)))?;

    let mut cues = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "text")
    {
        let start = parse_seconds(node.attribute("start"), "start")?
            .ok_or_else(|| TranscodeError::Parse("cue without start attribute".to_string()))?;
        let duration = parse_seconds(node.attribute("dur"), "dur")?.unwrap_or(0.0);

        let raw: String = node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();

        cues.push(CaptionCue {
            start,
            duration,
            text: unescape_html(&raw),
        });
    }

    Ok(cues)
}

fn parse_seconds(value: Option<&str>, name: &str) -> Result<Option<f64>, TranscodeError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let seconds: f64 = raw
                .trim()
                .parse()
                .map_err(|_| TranscodeError::Parse(format!("invalid {} value: {:?}", name, raw)))?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(TranscodeError::Parse(format!("invalid {} value: {:?}", name, raw)));
            }
            Ok(Some(seconds))
        }
    }
}

/// Decode HTML entities left in cue text. Tags that surface after decoding
/// are dropped, only their text survives.
pub fn unescape_html(text: &str) -> String {
    if !text.contains('&') && !text.contains('<') {
        return text.to_string();
    }

    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect()
}
