//! Analysis result persistence
//!
//! One row per session. Re-analysis replaces the row in place, so readers
//! never see two results or a half-written one.

use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::{Row, SqliteConnection, SqlitePool};
use vtc_common::normalize::{to_display_score, to_persisted_score};
use vtc_common::time::to_db_string;
use vtc_common::{AnalysisResult, Error, Result};

/// Analysis as stored, with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnalysis {
    /// `overall_score` converted back to the 0–10 scale
    pub analysis: AnalysisResult,
    /// True when the result came from the mock generator
    pub is_mock: bool,
}

/// Insert or replace the analysis for a session
pub async fn upsert_analysis(
    conn: &mut SqliteConnection,
    session_id: &str,
    analysis: &AnalysisResult,
    is_mock: bool,
) -> Result<()> {
    let now = to_db_string(Utc::now());
    let overall_score = to_persisted_score(analysis.overall_score).clamp(0.0, 100.0);

    sqlx::query(
        r#"
        INSERT INTO analysis_results (
            session_id, overall_score, strengths, areas_for_improvement,
            effective_techniques, techniques_needing_work, objection_handling,
            closing_effectiveness, key_recommendations, detailed_analysis,
            is_mock, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            overall_score = excluded.overall_score,
            strengths = excluded.strengths,
            areas_for_improvement = excluded.areas_for_improvement,
            effective_techniques = excluded.effective_techniques,
            techniques_needing_work = excluded.techniques_needing_work,
            objection_handling = excluded.objection_handling,
            closing_effectiveness = excluded.closing_effectiveness,
            key_recommendations = excluded.key_recommendations,
            detailed_analysis = excluded.detailed_analysis,
            is_mock = excluded.is_mock,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(session_id)
    .bind(overall_score)
    .bind(serde_json::to_string(&analysis.strengths)?)
    .bind(serde_json::to_string(&analysis.areas_for_improvement)?)
    .bind(serde_json::to_string(&analysis.effective_techniques)?)
    .bind(serde_json::to_string(&analysis.techniques_needing_work)?)
    .bind(analysis.objection_handling.as_ref().map(serde_json::to_string).transpose()?)
    .bind(analysis.closing_effectiveness.as_ref().map(serde_json::to_string).transpose()?)
    .bind(serde_json::to_string(&analysis.key_recommendations)?)
    .bind(&analysis.detailed_analysis)
    .bind(is_mock)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load the analysis for a session, if any
pub async fn load_analysis(pool: &SqlitePool, session_id: &str) -> Result<Option<StoredAnalysis>> {
    let row = sqlx::query(
        r#"
        SELECT overall_score, strengths, areas_for_improvement, effective_techniques,
               techniques_needing_work, objection_handling, closing_effectiveness,
               key_recommendations, detailed_analysis, is_mock
        FROM analysis_results
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let analysis = AnalysisResult {
        overall_score: to_display_score(row.get("overall_score")),
        strengths: decode(row.get("strengths"), "strengths")?,
        areas_for_improvement: decode(row.get("areas_for_improvement"), "areas_for_improvement")?,
        effective_techniques: decode(row.get("effective_techniques"), "effective_techniques")?,
        techniques_needing_work: decode(
            row.get("techniques_needing_work"),
            "techniques_needing_work",
        )?,
        objection_handling: decode_opt(row.get("objection_handling"), "objection_handling")?,
        closing_effectiveness: decode_opt(
            row.get("closing_effectiveness"),
            "closing_effectiveness",
        )?,
        key_recommendations: decode(row.get("key_recommendations"), "key_recommendations")?,
        detailed_analysis: row.get("detailed_analysis"),
    };

    Ok(Some(StoredAnalysis {
        analysis,
        is_mock: row.get("is_mock"),
    }))
}

/// Number of analysis rows for a session (0 or 1)
pub async fn count_for_session(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn decode<T: DeserializeOwned>(raw: String, column: &str) -> Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

fn decode_opt<T: DeserializeOwned>(raw: Option<String>, column: &str) -> Result<Option<T>> {
    raw.map(|s| decode(s, column)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sessions::insert_session;
    use vtc_common::db::init_memory_database;
    use vtc_common::models::Session;
    use vtc_common::ScoredSection;

    fn analysis(score: f64, strength: &str) -> AnalysisResult {
        AnalysisResult {
            overall_score: score,
            strengths: vec![strength.to_string()],
            areas_for_improvement: vec!["Slow down".into()],
            effective_techniques: vec!["Mirroring".into()],
            techniques_needing_work: vec![],
            objection_handling: Some(ScoredSection {
                score: 6.0,
                analysis: "Acknowledged the concern".into(),
            }),
            closing_effectiveness: None,
            key_recommendations: vec!["Ask for the meeting".into()],
            detailed_analysis: Some("Good call overall".into()),
        }
    }

    async fn setup() -> SqlitePool {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_session(&mut conn, &Session::start("s-1".into(), Some("o".into()), None))
            .await
            .unwrap();
        drop(conn);
        pool
    }

    #[tokio::test]
    async fn test_upsert_and_load() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_analysis(&mut conn, "s-1", &analysis(7.5, "Rapport"), false).await.unwrap();
        drop(conn);

        let stored = load_analysis(&pool, "s-1").await.unwrap().unwrap();
        assert!(!stored.is_mock);
        assert_eq!(stored.analysis, analysis(7.5, "Rapport"));
    }

    #[tokio::test]
    async fn test_second_upsert_replaces_row() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_analysis(&mut conn, "s-1", &analysis(5.0, "First"), true).await.unwrap();
        upsert_analysis(&mut conn, "s-1", &analysis(8.0, "Second"), false).await.unwrap();
        drop(conn);

        assert_eq!(count_for_session(&pool, "s-1").await.unwrap(), 1);
        let stored = load_analysis(&pool, "s-1").await.unwrap().unwrap();
        assert_eq!(stored.analysis.strengths, vec!["Second".to_string()]);
        assert_eq!(stored.analysis.overall_score, 8.0);
        assert!(!stored.is_mock);
    }

    #[tokio::test]
    async fn test_score_stored_on_hundred_scale() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_analysis(&mut conn, "s-1", &analysis(6.5, "x"), false).await.unwrap();
        drop(conn);

        let raw: f64 = sqlx::query_scalar("SELECT overall_score FROM analysis_results")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(raw, 65.0);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let pool = setup().await;
        assert!(load_analysis(&pool, "s-1").await.unwrap().is_none());
    }
}
