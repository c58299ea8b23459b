//! Qualitative analysis provider
//!
//! Talks to an OpenAI-compatible chat-completions endpoint and asks for a
//! JSON object. The returned document is untrusted: mandatory fields are
//! validated before an [`AnalysisResult`] is built, and any shape problem is
//! reported as a [`ProviderError`] so the orchestrator can fall back.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use vtc_common::models::RequesterInfo;
use vtc_common::{AnalysisResult, ScoredSection, SessionMetrics};

use crate::config::AnalysisProviderConfig;

const USER_AGENT: &str = concat!("vtc-sa/", env!("CARGO_PKG_VERSION"));

/// Instructions sent as the system message
pub const SYSTEM_INSTRUCTIONS: &str = "You are an expert sales coach reviewing a recorded \
training call between a trainee (the user) and a simulated prospect. Respond with a single \
JSON object with these fields: overallScore (number 0-10), strengths (array of strings), \
areasForImprovement (array of strings), effectiveTechniques (array of strings), \
techniquesNeedingWork (array of strings), objectionHandling ({score, analysis} or null), \
closingEffectiveness ({score, analysis} or null), keyRecommendations (array of strings), \
detailedAnalysis (string). Sub-scores are on the same 0-10 scale.";

/// Provider errors; every variant leads to the mock fallback
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid field '{0}': {1}")]
    InvalidField(&'static str, String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Everything the provider receives for one analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPrompt {
    pub transcript_text: String,
    pub duration_seconds: Option<f64>,
    pub metrics: SessionMetrics,
    pub requester: Option<RequesterInfo>,
}

impl AnalysisPrompt {
    /// User message: transcript plus context the coach should weigh
    pub fn user_message(&self) -> String {
        let mut message = String::new();

        if let Some(requester) = self.requester.as_ref().filter(|r| !r.is_empty()) {
            message.push_str("Trainee context:\n");
            for (label, value) in [
                ("Name", &requester.name),
                ("Role", &requester.role),
                ("Company", &requester.company),
                ("Experience level", &requester.experience_level),
            ] {
                if let Some(value) = value {
                    message.push_str(&format!("- {}: {}\n", label, value));
                }
            }
            message.push('\n');
        }

        if let Some(duration) = self.duration_seconds {
            message.push_str(&format!("Call duration: {:.0} seconds\n", duration));
        }
        message.push_str(&format!(
            "Measured metrics: talk-time ratio {:.2}, filler words {}, pace {} wpm, sentiment {:.2}\n\n",
            self.metrics.talk_time_ratio,
            self.metrics.filler_words_count,
            self.metrics.speaking_pace_wpm,
            self.metrics.sentiment_score,
        ));
        message.push_str("Transcript:\n");
        message.push_str(&self.transcript_text);
        message
    }
}

/// Source of qualitative analyses
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Whether a real provider is available; `false` routes to the mock path
    fn is_configured(&self) -> bool;

    async fn analyze(&self, prompt: &AnalysisPrompt) -> Result<AnalysisResult, ProviderError>;
}

/// OpenAI-compatible chat-completions client
pub struct ChatCompletionsProvider {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn new(config: &AnalysisProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout + Duration::from_secs(1))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl AnalysisProvider for ChatCompletionsProvider {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze(&self, prompt: &AnalysisPrompt) -> Result<AnalysisResult, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;

        let body = json!({
            "model": self.model,
            "temperature": 0.3,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_INSTRUCTIONS},
                {"role": "user", "content": prompt.user_message()},
            ],
        });

        tracing::debug!(model = %self.model, chars = prompt.transcript_text.len(), "Requesting analysis");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let completion: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let content = completion
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Parse("completion has no message content".to_string()))?;

        let document: Value =
            serde_json::from_str(content).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let analysis = validate_analysis_document(&document)?;
        tracing::info!(overall_score = analysis.overall_score, "Provider analysis received");
        Ok(analysis)
    }
}

/// Build an [`AnalysisResult`] from an untrusted provider document
///
/// `overallScore`, `strengths` and `areasForImprovement` are mandatory.
/// Optional list fields keep only their string items; malformed optional
/// sections are dropped.
pub fn validate_analysis_document(doc: &Value) -> Result<AnalysisResult, ProviderError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| ProviderError::Parse("analysis document is not an object".to_string()))?;

    let overall_score = obj
        .get("overallScore")
        .and_then(Value::as_f64)
        .ok_or_else(|| ProviderError::InvalidField("overallScore", "missing or not a number".into()))?;
    if !(0.0..=10.0).contains(&overall_score) {
        return Err(ProviderError::InvalidField(
            "overallScore",
            format!("{} is outside 0-10", overall_score),
        ));
    }

    Ok(AnalysisResult {
        overall_score,
        strengths: required_strings(obj.get("strengths"), "strengths")?,
        areas_for_improvement: required_strings(
            obj.get("areasForImprovement"),
            "areasForImprovement",
        )?,
        effective_techniques: optional_strings(obj.get("effectiveTechniques")),
        techniques_needing_work: optional_strings(obj.get("techniquesNeedingWork")),
        objection_handling: scored_section(obj.get("objectionHandling")),
        closing_effectiveness: scored_section(obj.get("closingEffectiveness")),
        key_recommendations: optional_strings(obj.get("keyRecommendations")),
        detailed_analysis: obj
            .get("detailedAnalysis")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn required_strings(value: Option<&Value>, field: &'static str) -> Result<Vec<String>, ProviderError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidField(field, "missing or not an array".into()))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ProviderError::InvalidField(field, "contains a non-string item".into()))
        })
        .collect()
}

fn optional_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn scored_section(value: Option<&Value>) -> Option<ScoredSection> {
    let obj = value?.as_object()?;
    let score = obj.get("score")?.as_f64()?;
    Some(ScoredSection {
        score: score.clamp(0.0, 10.0),
        analysis: obj
            .get("analysis")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_doc() -> Value {
        json!({
            "overallScore": 7.5,
            "strengths": ["Clear opening"],
            "areasForImprovement": ["Close harder"],
            "effectiveTechniques": ["Mirroring", 3],
            "objectionHandling": {"score": 6, "analysis": "Handled price"},
            "closingEffectiveness": "not an object",
            "detailedAnalysis": "Good"
        })
    }

    #[test]
    fn test_valid_document() {
        let analysis = validate_analysis_document(&valid_doc()).unwrap();
        assert_eq!(analysis.overall_score, 7.5);
        assert_eq!(analysis.effective_techniques, vec!["Mirroring".to_string()]);
        assert_eq!(analysis.objection_handling.unwrap().score, 6.0);
        assert!(analysis.closing_effectiveness.is_none());
        assert!(analysis.key_recommendations.is_empty());
    }

    #[test]
    fn test_missing_mandatory_fields_rejected() {
        for field in ["overallScore", "strengths", "areasForImprovement"] {
            let mut doc = valid_doc();
            doc.as_object_mut().unwrap().remove(field);
            let err = validate_analysis_document(&doc).unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidField(f, _) if f == field),
                "expected {} to be rejected",
                field
            );
        }
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let mut doc = valid_doc();
        doc["overallScore"] = json!(75);
        assert!(validate_analysis_document(&doc).is_err());
    }

    #[test]
    fn test_non_string_strength_rejected() {
        let mut doc = valid_doc();
        doc["strengths"] = json!(["ok", {"nested": true}]);
        assert!(validate_analysis_document(&doc).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            validate_analysis_document(&json!("text")),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_user_message_includes_context() {
        let prompt = AnalysisPrompt {
            transcript_text: "user: hello".into(),
            duration_seconds: Some(185.0),
            metrics: SessionMetrics {
                talk_time_ratio: 0.6,
                filler_words_count: 2,
                speaking_pace_wpm: 130,
                sentiment_score: 0.5,
            },
            requester: Some(RequesterInfo {
                role: Some("SDR".into()),
                ..Default::default()
            }),
        };
        let message = prompt.user_message();
        assert!(message.contains("- Role: SDR"));
        assert!(message.contains("185 seconds"));
        assert!(message.contains("filler words 2"));
        assert!(message.ends_with("user: hello"));
    }

    #[test]
    fn test_unconfigured_client() {
        let provider = ChatCompletionsProvider::new(&AnalysisProviderConfig {
            api_key: None,
            base_url: "http://localhost:1".into(),
            model: "m".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert!(!provider.is_configured());
    }
}
