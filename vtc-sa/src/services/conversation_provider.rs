//! Conversation provider client (ThirdParty-domain sessions)
//!
//! Sessions with a `conv_` id live entirely at the voice-agent provider.
//! They are fetched on demand and never stored locally.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use vtc_common::TranscriptMessage;

use super::analysis_provider::ProviderError;
use crate::config::ConversationProviderConfig;

const USER_AGENT: &str = concat!("vtc-sa/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Provider-side conversation, already mapped to local field names
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub conversation_id: String,
    /// Mapped with [`map_conversation_status`]
    pub status: String,
    pub duration_seconds: Option<f64>,
    pub transcript: Vec<TranscriptMessage>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Provider `done` is local `completed`; anything else passes through
pub fn map_conversation_status(raw: &str) -> String {
    match raw {
        "done" => "completed".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
pub trait ConversationProvider: Send + Sync {
    async fn fetch_conversation(&self, conversation_id: &str) -> Result<ConversationRecord, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct WireConversation {
    conversation_id: Option<String>,
    status: String,
    #[serde(default)]
    transcript: Vec<WireTurn>,
    #[serde(default)]
    metadata: Option<WireMetadata>,
    #[serde(default)]
    analysis: Option<WireAnalysis>,
}

#[derive(Debug, Deserialize)]
struct WireTurn {
    role: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    time_in_call_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(default)]
    start_time_unix_secs: Option<i64>,
    #[serde(default)]
    call_duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default)]
    transcript_summary: Option<String>,
}

impl WireConversation {
    fn into_record(self, requested_id: &str) -> ConversationRecord {
        let metadata = self.metadata.unwrap_or(WireMetadata {
            start_time_unix_secs: None,
            call_duration_secs: None,
        });
        let start_time = metadata
            .start_time_unix_secs
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let duration_seconds = metadata.call_duration_secs.filter(|d| d.is_finite() && *d >= 0.0);
        let end_time = match (start_time, duration_seconds) {
            // Out-of-range durations leave the end unknown
            (Some(start), Some(duration)) => {
                ChronoDuration::try_milliseconds((duration * 1000.0) as i64)
                    .and_then(|elapsed| start.checked_add_signed(elapsed))
            }
            _ => None,
        };

        // Tool-call turns carry no message text
        let transcript = self
            .transcript
            .into_iter()
            .filter_map(|turn| {
                let message = turn.message?;
                Some(TranscriptMessage {
                    speaker: turn.role,
                    message,
                    timestamp: turn.time_in_call_secs.map(|t| t.to_string()),
                })
            })
            .collect();

        ConversationRecord {
            conversation_id: self.conversation_id.unwrap_or_else(|| requested_id.to_string()),
            status: map_conversation_status(&self.status),
            duration_seconds,
            transcript,
            start_time,
            end_time,
            summary: self.analysis.and_then(|a| a.transcript_summary),
        }
    }
}

/// HTTP client for the provider's conversation API
pub struct HttpConversationProvider {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl HttpConversationProvider {
    pub fn new(config: &ConversationProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ConversationProvider for HttpConversationProvider {
    async fn fetch_conversation(&self, conversation_id: &str) -> Result<ConversationRecord, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;

        let response = self
            .http_client
            .get(format!("{}/v1/convai/conversations/{}", self.base_url, conversation_id))
            .header("xi-api-key", api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(conversation_id.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let wire: WireConversation = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        tracing::debug!(conversation_id, status = %wire.status, "Fetched conversation");
        Ok(wire.into_record(conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_conversation_status("done"), "completed");
        assert_eq!(map_conversation_status("processing"), "processing");
        assert_eq!(map_conversation_status("in-progress"), "in-progress");
    }

    #[test]
    fn test_wire_mapping() {
        let wire: WireConversation = serde_json::from_value(json!({
            "conversation_id": "conv_123",
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "Hello, how can I help?", "time_in_call_secs": 0},
                {"role": "user", "message": null, "time_in_call_secs": 3},
                {"role": "user", "message": "I'm looking at your pricing", "time_in_call_secs": 4}
            ],
            "metadata": {"start_time_unix_secs": 1700000000, "call_duration_secs": 95},
            "analysis": {"transcript_summary": "Pricing inquiry"}
        }))
        .unwrap();

        let record = wire.into_record("conv_123");
        assert_eq!(record.status, "completed");
        assert_eq!(record.transcript.len(), 2);
        assert_eq!(record.transcript[1].speaker, "user");
        assert_eq!(record.duration_seconds, Some(95.0));
        assert_eq!(
            record.end_time.unwrap() - record.start_time.unwrap(),
            ChronoDuration::seconds(95)
        );
        assert_eq!(record.summary.as_deref(), Some("Pricing inquiry"));
    }

    #[test]
    fn test_wire_mapping_huge_duration_has_no_end_time() {
        let wire: WireConversation = serde_json::from_value(json!({
            "status": "done",
            "metadata": {"start_time_unix_secs": 1700000000, "call_duration_secs": 1e18}
        }))
        .unwrap();

        let record = wire.into_record("conv_long");
        assert!(record.start_time.is_some());
        assert!(record.end_time.is_none());
        assert_eq!(record.duration_seconds, Some(1e18));
    }

    #[test]
    fn test_wire_mapping_minimal() {
        let wire: WireConversation =
            serde_json::from_value(json!({"status": "processing"})).unwrap();
        let record = wire.into_record("conv_abc");
        assert_eq!(record.conversation_id, "conv_abc");
        assert!(record.transcript.is_empty());
        assert!(record.start_time.is_none());
        assert!(record.end_time.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_fetch_fails_fast() {
        let provider = HttpConversationProvider::new(&ConversationProviderConfig {
            api_key: None,
            base_url: "http://localhost:1".into(),
        })
        .unwrap();
        assert!(matches!(
            provider.fetch_conversation("conv_1").await,
            Err(ProviderError::NotConfigured)
        ));
    }
}
