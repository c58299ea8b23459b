//! Request body validation
//!
//! Bodies arrive as untyped JSON. Each parser checks presence, type and
//! range of every field it reads and only then builds the typed request.
//! Unknown fields are ignored.

use serde_json::{Map, Value};
use vtc_common::models::RequesterInfo;
use vtc_common::transcript::parse_transcript;
use vtc_common::{Error, Result, TranscriptMessage};

use crate::services::lifecycle::{EndRequest, StartRequest};
use crate::services::orchestrator::AnalyzeRequest;

pub const MAX_SESSION_ID_LEN: usize = 128;

fn as_object(body: &Value) -> Result<&Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| Error::InvalidInput("request body must be a JSON object".to_string()))
}

/// First present, non-null field among `names`
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

/// Validate a session id string
pub fn validate_session_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput("sessionId must not be empty".to_string()));
    }
    if id.chars().count() > MAX_SESSION_ID_LEN {
        return Err(Error::InvalidInput(format!(
            "sessionId must be at most {} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    Ok(id.to_string())
}

fn required_session_id(obj: &Map<String, Value>) -> Result<String> {
    match field(obj, &["sessionId", "session_id"]) {
        Some(Value::String(id)) => validate_session_id(id),
        Some(_) => Err(Error::InvalidInput("sessionId must be a string".to_string())),
        None => Err(Error::InvalidInput("sessionId is required".to_string())),
    }
}

fn optional_string(obj: &Map<String, Value>, names: &[&str]) -> Result<Option<String>> {
    match field(obj, names) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::InvalidInput(format!("{} must be a string", names[0]))),
    }
}

fn optional_number(obj: &Map<String, Value>, names: &[&str]) -> Result<Option<f64>> {
    match field(obj, names) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| Error::InvalidInput(format!("{} must be a number", names[0]))),
    }
}

fn optional_transcript(obj: &Map<String, Value>) -> Result<Option<Vec<TranscriptMessage>>> {
    field(obj, &["transcript"]).map(parse_transcript).transpose()
}

/// POST /api/sessions/start (the body is optional)
pub fn parse_start_request(body: Option<&Value>) -> Result<StartRequest> {
    let obj = match body {
        None | Some(Value::Null) => return Ok(StartRequest::default()),
        Some(body) => as_object(body)?,
    };

    Ok(StartRequest {
        session_id: optional_string(obj, &["sessionId", "session_id"])?
            .map(|id| validate_session_id(&id))
            .transpose()?,
        scenario: optional_string(obj, &["scenario"])?,
        owner_id: optional_string(obj, &["ownerId", "owner_id"])?,
    })
}

/// POST /api/sessions/end
pub fn parse_end_request(body: &Value) -> Result<EndRequest> {
    let obj = as_object(body)?;

    let duration_seconds = optional_number(obj, &["durationSeconds", "duration_seconds", "duration"])?
        .ok_or_else(|| Error::InvalidInput("durationSeconds is required".to_string()))?;
    if duration_seconds <= 0.0 {
        return Err(Error::InvalidInput("durationSeconds must be greater than 0".to_string()));
    }

    let audio_quality = match field(obj, &["audioQuality", "audio_quality"]) {
        None => None,
        Some(value @ Value::Object(_)) => Some(value.clone()),
        Some(_) => return Err(Error::InvalidInput("audioQuality must be an object".to_string())),
    };

    Ok(EndRequest {
        session_id: required_session_id(obj)?,
        duration_seconds,
        transcript: optional_transcript(obj)?,
        audio_quality,
    })
}

/// POST /api/analyze
pub fn parse_analyze_request(body: &Value) -> Result<AnalyzeRequest> {
    let obj = as_object(body)?;

    let duration_seconds = optional_number(obj, &["duration", "durationSeconds", "duration_seconds"])?;
    if matches!(duration_seconds, Some(d) if d < 0.0) {
        return Err(Error::InvalidInput("duration must not be negative".to_string()));
    }

    let requester = match field(obj, &["requesterInfo", "requester_info"]) {
        None => None,
        Some(value @ Value::Object(_)) => Some(
            serde_json::from_value::<RequesterInfo>(value.clone())
                .map_err(|e| Error::InvalidInput(format!("requesterInfo is invalid: {}", e)))?,
        ),
        Some(_) => return Err(Error::InvalidInput("requesterInfo must be an object".to_string())),
    };

    Ok(AnalyzeRequest {
        session_id: required_session_id(obj)?,
        transcript: optional_transcript(obj)?,
        duration_seconds,
        requester,
    })
}
