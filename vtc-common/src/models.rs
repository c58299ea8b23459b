//! Canonical data model
//!
//! Wire names are camelCase to match the HTTP contract.

use crate::transcript::TranscriptMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw lifecycle status as written by the lifecycle controller
///
/// Reads go through [`crate::normalize::normalize_status`]; this enum is only
/// for writes, so every value written is one the normalizer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Processing,
    Analyzed,
    Demo,
    Archived,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Processing => "processing",
            SessionStatus::Analyzed => "analyzed",
            SessionStatus::Demo => "demo",
            SessionStatus::Archived => "archived",
        }
    }

    /// Parse a stored status; unknown strings yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "processing" => Some(SessionStatus::Processing),
            "analyzed" => Some(SessionStatus::Analyzed),
            "demo" => Some(SessionStatus::Demo),
            "archived" => Some(SessionStatus::Archived),
            _ => None,
        }
    }

    /// Whether the session has already passed its end transition
    pub fn is_ended(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Processing
                | SessionStatus::Analyzed
                | SessionStatus::Archived
        )
    }
}

/// Analysis pipeline sub-state, independent of the top-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Analyzing,
    Completed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Analyzing => "analyzing",
            ProcessingStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "analyzing" => Some(ProcessingStatus::Analyzing),
            "completed" => Some(ProcessingStatus::Completed),
            _ => None,
        }
    }
}

/// One training conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Owning identity; `None` for Local-domain sessions
    pub owner_id: Option<String>,
    /// Raw stored status (see [`SessionStatus`])
    pub status: String,
    pub processing_status: Option<ProcessingStatus>,
    pub scenario: Option<String>,
    pub duration_seconds: Option<f64>,
    pub transcript: Vec<TranscriptMessage>,
    pub audio_quality: Option<serde_json::Value>,
    /// Persisted scale (0–100)
    pub overall_score: Option<f64>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// New active session, started now
    pub fn start(id: String, owner_id: Option<String>, scenario: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            status: SessionStatus::Active.as_str().to_string(),
            processing_status: None,
            scenario,
            duration_seconds: None,
            transcript: Vec::new(),
            audio_quality: None,
            overall_score: None,
            feedback: None,
            created_at: now,
            started_at: Some(now),
            ended_at: None,
            analyzed_at: None,
            updated_at: Some(now),
        }
    }

    pub fn stored_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Whether the end transition has already happened
    pub fn is_ended(&self) -> bool {
        self.stored_status().map_or(false, SessionStatus::is_ended)
    }
}

/// Scored qualitative section (0–10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSection {
    pub score: f64,
    pub analysis: String,
}

/// Qualitative assessment of one session
///
/// `overall_score` is on the provider's 0–10 scale. It is converted to 0–100
/// whenever it is written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_score: f64,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub effective_techniques: Vec<String>,
    #[serde(default)]
    pub techniques_needing_work: Vec<String>,
    #[serde(default)]
    pub objection_handling: Option<ScoredSection>,
    #[serde(default)]
    pub closing_effectiveness: Option<ScoredSection>,
    #[serde(default)]
    pub key_recommendations: Vec<String>,
    #[serde(default)]
    pub detailed_analysis: Option<String>,
}

impl AnalysisResult {
    /// Short feedback text for the session's denormalized summary column
    pub fn feedback_summary(&self, max_chars: usize) -> String {
        let full = match &self.detailed_analysis {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => self.strengths.join("; "),
        };

        if full.chars().count() <= max_chars {
            return full;
        }
        let mut truncated: String = full.chars().take(max_chars.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Deterministic conversational metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Trainee share of messages, [0, 1]
    pub talk_time_ratio: f64,
    pub filler_words_count: u32,
    pub speaking_pace_wpm: u32,
    /// Lexical polarity, [0, 1]
    pub sentiment_score: f64,
}

/// Optional context about the trainee, forwarded to the analysis provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
}

impl RequesterInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.company.is_none()
            && self.experience_level.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_analysis() -> AnalysisResult {
        AnalysisResult {
            overall_score: 7.0,
            strengths: vec!["Clear opening".into(), "Good rapport".into()],
            areas_for_improvement: vec!["Ask more questions".into()],
            effective_techniques: vec![],
            techniques_needing_work: vec![],
            objection_handling: None,
            closing_effectiveness: None,
            key_recommendations: vec![],
            detailed_analysis: None,
        }
    }

    #[test]
    fn test_status_roundtrip_and_ended() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Processing,
            SessionStatus::Analyzed,
            SessionStatus::Demo,
            SessionStatus::Archived,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert!(!SessionStatus::Active.is_ended());
        assert!(!SessionStatus::Demo.is_ended());
        assert!(SessionStatus::Analyzed.is_ended());
        assert_eq!(SessionStatus::parse("bogus"), None);
    }

    #[test]
    fn test_new_session_is_active() {
        let session = Session::start("demo-1".into(), None, None);
        assert_eq!(session.status, "active");
        assert!(!session.is_ended());
        assert!(session.started_at.is_some());
    }

    #[test]
    fn test_analysis_wire_names_camel_case() {
        let value = serde_json::to_value(sample_analysis()).unwrap();
        assert_eq!(value["overallScore"], json!(7.0));
        assert!(value["areasForImprovement"].is_array());
        assert!(value.get("areas_for_improvement").is_none());
    }

    #[test]
    fn test_analysis_optional_fields_default() {
        let parsed: AnalysisResult = serde_json::from_value(json!({
            "overallScore": 6.5,
            "strengths": ["a"],
            "areasForImprovement": ["b"]
        }))
        .unwrap();
        assert!(parsed.key_recommendations.is_empty());
        assert!(parsed.objection_handling.is_none());
    }

    #[test]
    fn test_feedback_summary_prefers_detailed_analysis() {
        let mut analysis = sample_analysis();
        assert_eq!(analysis.feedback_summary(100), "Clear opening; Good rapport");

        analysis.detailed_analysis = Some("x".repeat(50));
        let summary = analysis.feedback_summary(20);
        assert_eq!(summary.chars().count(), 20);
        assert!(summary.ends_with("..."));
    }
}
