//! Inbound realtime frame decoding.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{DocumentCreatedEvent, DOCUMENT_CREATED, DOCUMENT_CREATED_FAKE};

/// Epoch values above this are treated as milliseconds, below as seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A frame that could not be decoded. Always local to one frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: Option<String>,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
    #[serde(default, alias = "userName")]
    user_name: Option<String>,
    #[serde(default, alias = "documentId")]
    document_id: Option<String>,
    #[serde(default, alias = "documentTitle")]
    document_title: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Whether `frame_type` is one of the document-created frames.
pub fn is_document_created(frame_type: &str) -> bool {
    frame_type == DOCUMENT_CREATED || frame_type == DOCUMENT_CREATED_FAKE
}

/// Decode a text frame.
///
/// Returns `Ok(None)` for well-formed frames of a type this client does not
/// handle.
pub fn parse_frame(text: &str) -> Result<Option<DocumentCreatedEvent>, FrameError> {
    parse_frame_at(text, Utc::now())
}

/// Decode a text frame, using `received_at` when it carries no timestamp.
pub fn parse_frame_at(
    text: &str,
    received_at: DateTime<Utc>,
) -> Result<Option<DocumentCreatedEvent>, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let Some(frame_type) = raw.frame_type.filter(|value| is_document_created(value)) else {
        return Ok(None);
    };

    let document_id = raw
        .document_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(FrameError::MissingField("document_id"))?;

    let timestamp = match raw.timestamp {
        None | Some(Value::Null) => received_at,
        Some(value) => parse_timestamp(&value)?,
    };

    Ok(Some(DocumentCreatedEvent {
        event_type: frame_type,
        user_id: raw.user_id.unwrap_or_default(),
        user_name: raw.user_name.unwrap_or_default(),
        document_id,
        document_title: raw.document_title.unwrap_or_default(),
        timestamp,
    }))
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, FrameError> {
    let parsed = match value {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|timestamp| timestamp.with_timezone(&Utc))
                .ok()
                .or_else(|| text.parse::<i64>().ok().and_then(from_epoch))
        }
        Value::Number(number) => number.as_i64().and_then(from_epoch),
        _ => None,
    };

    parsed.ok_or_else(|| FrameError::InvalidTimestamp(value.to_string()))
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() > EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}
