//! Score and status normalization
//!
//! Raw statuses come from several writers (lifecycle updates, legacy rows,
//! the demo cache) and scores come on two scales. Everything read out of
//! storage passes through these functions before it is compared or shown.
//!
//! The persisted scale is 0–100. The 0–10 scale is a presentation view only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical lifecycle label used after ingesting any raw status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Completed,
    InProgress,
    Demo,
    Processing,
    Active,
    Analyzed,
    Archived,
}

impl CanonicalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalStatus::Completed => "completed",
            CanonicalStatus::InProgress => "in_progress",
            CanonicalStatus::Demo => "demo",
            CanonicalStatus::Processing => "processing",
            CanonicalStatus::Active => "active",
            CanonicalStatus::Analyzed => "analyzed",
            CanonicalStatus::Archived => "archived",
        }
    }
}

/// Map a raw stored status to its canonical label
///
/// Unknown values fall back to `InProgress`; this never fails.
pub fn normalize_status(raw_status: &str, has_analysis: bool) -> CanonicalStatus {
    match raw_status {
        "analyzed" => CanonicalStatus::Completed,
        "completed" if has_analysis => CanonicalStatus::Completed,
        "completed" => CanonicalStatus::Processing,
        "active" => CanonicalStatus::InProgress,
        "processing" => CanonicalStatus::Processing,
        "demo" => CanonicalStatus::Demo,
        "archived" => CanonicalStatus::Archived,
        _ => CanonicalStatus::InProgress,
    }
}

/// Score scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreScale {
    /// 0–10, as produced by the analysis provider and shown to users
    Ten,
    /// 0–100, the persisted scale
    Hundred,
}

/// Convert a score between scales
///
/// An absent or non-finite score is treated as 0.
pub fn normalize_score(score: Option<f64>, from: ScoreScale, to: ScoreScale) -> f64 {
    let score = match score {
        Some(s) if s.is_finite() => s,
        _ => return 0.0,
    };

    match (from, to) {
        (ScoreScale::Ten, ScoreScale::Hundred) => score * 10.0,
        (ScoreScale::Hundred, ScoreScale::Ten) => score / 10.0,
        _ => score,
    }
}

/// Provider-scale (0–10) score to the persisted scale
pub fn to_persisted_score(score: f64) -> f64 {
    normalize_score(Some(score), ScoreScale::Ten, ScoreScale::Hundred)
}

/// Persisted-scale (0–100) score to the presentation scale
pub fn to_display_score(score: Option<f64>) -> f64 {
    normalize_score(score, ScoreScale::Hundred, ScoreScale::Ten)
}

/// Raw date fields as found in stored or provider documents
///
/// Accepts snake_case, camelCase and the conversation provider's
/// `start_time`/`end_time` naming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDates {
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "startedAt", alias = "start_time", alias = "startTime")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "endedAt", alias = "end_time", alias = "endTime")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "analyzedAt")]
    pub analyzed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Canonical session instants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDates {
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalize raw dates; a missing creation instant becomes `now`
///
/// Falls back to the start instant before `now`, so a provider record with a
/// start time keeps it as its creation time.
pub fn normalize_dates(raw: RawDates, now: DateTime<Utc>) -> SessionDates {
    SessionDates {
        created_at: raw.created_at.or(raw.started_at).unwrap_or(now),
        started_at: raw.started_at,
        ended_at: raw.ended_at,
        analyzed_at: raw.analyzed_at,
        updated_at: raw.updated_at,
    }
}

/// Normalize dates from an untyped document
///
/// Fields that are missing or not valid RFC 3339 instants are treated as absent.
pub fn normalize_dates_value(doc: &serde_json::Value, now: DateTime<Utc>) -> SessionDates {
    let pick = |keys: &[&str]| -> Option<DateTime<Utc>> {
        keys.iter().find_map(|k| {
            doc.get(*k)
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        })
    };

    normalize_dates(
        RawDates {
            created_at: pick(&["created_at", "createdAt"]),
            started_at: pick(&["started_at", "startedAt", "start_time", "startTime"]),
            ended_at: pick(&["ended_at", "endedAt", "end_time", "endTime"]),
            analyzed_at: pick(&["analyzed_at", "analyzedAt"]),
            updated_at: pick(&["updated_at", "updatedAt"]),
        },
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_table() {
        assert_eq!(normalize_status("analyzed", false), CanonicalStatus::Completed);
        assert_eq!(normalize_status("analyzed", true), CanonicalStatus::Completed);
        assert_eq!(normalize_status("completed", true), CanonicalStatus::Completed);
        assert_eq!(normalize_status("completed", false), CanonicalStatus::Processing);
        assert_eq!(normalize_status("active", false), CanonicalStatus::InProgress);
        assert_eq!(normalize_status("processing", true), CanonicalStatus::Processing);
        assert_eq!(normalize_status("demo", false), CanonicalStatus::Demo);
        assert_eq!(normalize_status("archived", true), CanonicalStatus::Archived);
    }

    #[test]
    fn test_unknown_status_defaults_to_in_progress() {
        assert_eq!(normalize_status("unknown-garbage", false), CanonicalStatus::InProgress);
        assert_eq!(normalize_status("", true), CanonicalStatus::InProgress);
        assert_eq!(normalize_status("ANALYZED", true), CanonicalStatus::InProgress);
    }

    #[test]
    fn test_canonical_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(CanonicalStatus::InProgress).unwrap(),
            json!("in_progress")
        );
        assert_eq!(CanonicalStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_score_conversion() {
        assert_eq!(normalize_score(Some(7.5), ScoreScale::Ten, ScoreScale::Hundred), 75.0);
        assert_eq!(normalize_score(Some(82.0), ScoreScale::Hundred, ScoreScale::Ten), 8.2);
        assert_eq!(normalize_score(Some(6.0), ScoreScale::Ten, ScoreScale::Ten), 6.0);
        assert_eq!(normalize_score(Some(60.0), ScoreScale::Hundred, ScoreScale::Hundred), 60.0);
    }

    #[test]
    fn test_absent_score_is_zero() {
        assert_eq!(normalize_score(None, ScoreScale::Ten, ScoreScale::Hundred), 0.0);
        assert_eq!(normalize_score(Some(f64::NAN), ScoreScale::Hundred, ScoreScale::Ten), 0.0);
        assert_eq!(normalize_score(Some(0.0), ScoreScale::Ten, ScoreScale::Hundred), 0.0);
    }

    #[test]
    fn test_score_round_trip() {
        for s in [0.0, 0.5, 1.0, 3.25, 6.5, 7.75, 9.0, 10.0] {
            let up = normalize_score(Some(s), ScoreScale::Ten, ScoreScale::Hundred);
            let back = normalize_score(Some(up), ScoreScale::Hundred, ScoreScale::Ten);
            assert_eq!(back, s, "round trip failed for {}", s);
        }
    }

    #[test]
    fn test_dates_both_conventions() {
        let now = Utc::now();
        let snake = normalize_dates_value(
            &json!({"created_at": "2024-01-02T03:04:05Z", "ended_at": "2024-01-02T03:10:00Z"}),
            now,
        );
        let camel = normalize_dates_value(
            &json!({"createdAt": "2024-01-02T03:04:05Z", "endedAt": "2024-01-02T03:10:00Z"}),
            now,
        );
        assert_eq!(snake, camel);
        assert_eq!(snake.created_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_missing_created_at_defaults_to_now() {
        let now = Utc::now();
        let dates = normalize_dates_value(&json!({"updatedAt": "not-a-date"}), now);
        assert_eq!(dates.created_at, now);
        assert!(dates.updated_at.is_none());
    }

    #[test]
    fn test_raw_dates_deserialize_provider_names() {
        let raw: RawDates = serde_json::from_value(json!({
            "start_time": "2024-01-02T03:04:05Z",
            "end_time": "2024-01-02T03:09:05Z"
        }))
        .unwrap();
        let dates = normalize_dates(raw, Utc::now());
        assert_eq!(dates.created_at, dates.started_at.unwrap());
        assert!(dates.ended_at.is_some());
    }
}
