//! Transcript model and canonicalization
//!
//! A transcript is an ordered, finite sequence of messages. Callers may send
//! either the canonical array form or a legacy single string; both are
//! normalized here into `Vec<TranscriptMessage>`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker assigned to a legacy single-string transcript
pub const LEGACY_SPEAKER: &str = "user";

/// Speaker used when a message object carries no speaker field
const UNKNOWN_SPEAKER: &str = "unknown";

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub speaker: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TranscriptMessage {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
            timestamp: None,
        }
    }
}

/// Wrap a legacy bare-string transcript into a single user message
pub fn from_legacy_text(text: &str) -> Vec<TranscriptMessage> {
    vec![TranscriptMessage::new(LEGACY_SPEAKER, text)]
}

/// Parse an untyped transcript document
///
/// Accepts an array of message objects (`speaker`/`role`, `message`/`text`,
/// optional `timestamp` as string or number) or a legacy string. Any other
/// shape is rejected.
pub fn parse_transcript(value: &Value) -> Result<Vec<TranscriptMessage>> {
    match value {
        Value::String(text) => Ok(from_legacy_text(text)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_message(index, item))
            .collect(),
        other => Err(Error::InvalidInput(format!(
            "transcript must be an array or a string, got {}",
            json_type_name(other)
        ))),
    }
}

fn parse_message(index: usize, item: &Value) -> Result<TranscriptMessage> {
    let obj = item.as_object().ok_or_else(|| {
        Error::InvalidInput(format!("transcript[{}] must be an object", index))
    })?;

    let message = obj
        .get("message")
        .or_else(|| obj.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::InvalidInput(format!("transcript[{}].message must be a string", index))
        })?;

    let speaker = match obj.get("speaker").or_else(|| obj.get("role")) {
        None | Some(Value::Null) => UNKNOWN_SPEAKER,
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            return Err(Error::InvalidInput(format!(
                "transcript[{}].speaker must be a string",
                index
            )))
        }
    };

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    Ok(TranscriptMessage {
        speaker: speaker.to_string(),
        message: message.to_string(),
        timestamp,
    })
}

/// All messages joined with single spaces
pub fn plain_text(transcript: &[TranscriptMessage]) -> String {
    transcript
        .iter()
        .map(|m| m.message.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `speaker: message` lines, as presented to the analysis provider
pub fn dialogue_text(transcript: &[TranscriptMessage]) -> String {
    transcript
        .iter()
        .map(|m| format!("{}: {}", m.speaker, m.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whitespace-split word count, empty tokens discarded
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
