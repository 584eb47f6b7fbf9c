//! Timestamped emotion annotations
//!
//! The table shown under the streamed text. By default it holds fixed
//! placeholder rows; [`AnnotationTable::from_json`] reads the
//! `{"MM:SS": {"emotion": ..., "words": ...}}` map the analysis prompt asks for.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Invalid annotation JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp '{0}', expected MM:SS")]
    Timestamp(String),
}

/// One row: what emotion was heard at a point in the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionAnnotation {
    /// Offset into the session as `MM:SS`
    pub timestamp: String,
    pub emotion: String,
    pub words: String,
}

impl EmotionAnnotation {
    pub fn new(
        timestamp: impl Into<String>,
        emotion: impl Into<String>,
        words: impl Into<String>,
    ) -> Result<Self, AnnotationError> {
        let timestamp = timestamp.into();
        parse_timestamp(&timestamp)?;
        Ok(Self {
            timestamp,
            emotion: emotion.into(),
            words: words.into(),
        })
    }

    /// Offset in seconds
    pub fn offset_secs(&self) -> u32 {
        parse_timestamp(&self.timestamp).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct AnnotationBody {
    emotion: String,
    words: String,
}

/// Annotations ordered by timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationTable {
    rows: Vec<EmotionAnnotation>,
}

impl AnnotationTable {
    /// The fixed rows shown while no analysis is available
    pub fn placeholder() -> Self {
        let rows = [
            ("00:00", "Happy", "It was so great seeing you last week"),
            ("00:06", "Angry", "But you kind of betrayed me with Sarah"),
            ("00:15", "Disappointment", "Why would you do that?"),
        ]
        .into_iter()
        .map(|(timestamp, emotion, words)| EmotionAnnotation {
            timestamp: timestamp.to_string(),
            emotion: emotion.to_string(),
            words: words.to_string(),
        })
        .collect();

        Self { rows }
    }

    /// Parse the timestamp map, optionally wrapped in `<result>` tags
    pub fn from_json(text: &str) -> Result<Self, AnnotationError> {
        let body = strip_result_tags(text);
        let map: BTreeMap<String, AnnotationBody> = serde_json::from_str(body)?;

        let mut rows = map
            .into_iter()
            .map(|(timestamp, entry)| EmotionAnnotation::new(timestamp, entry.emotion, entry.words))
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by_key(EmotionAnnotation::offset_secs);

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[EmotionAnnotation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn strip_result_tags(text: &str) -> &str {
    let text = text.trim();
    match (text.find("<result>"), text.rfind("</result>")) {
        (Some(start), Some(end)) if start + "<result>".len() <= end => {
            text[start + "<result>".len()..end].trim()
        }
        _ => text,
    }
}

/// `MM:SS` to seconds
fn parse_timestamp(timestamp: &str) -> Result<u32, AnnotationError> {
    let invalid = || AnnotationError::Timestamp(timestamp.to_string());

    let (minutes, seconds) = timestamp.split_once(':').ok_or_else(invalid)?;
    if minutes.len() != 2 || seconds.len() != 2 {
        return Err(invalid());
    }
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u32 = seconds.parse().map_err(|_| invalid())?;
    if seconds >= 60 {
        return Err(invalid());
    }

    Ok(minutes * 60 + seconds)
}
