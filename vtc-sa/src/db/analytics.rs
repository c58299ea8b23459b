//! Per-session analytics rows (metrics plus denormalized scores)

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use vtc_common::normalize::to_persisted_score;
use vtc_common::time::to_db_string;
use vtc_common::{AnalysisResult, Result, SessionMetrics};

/// Insert or replace the analytics row for a session
///
/// Scores are written on the persisted 0–100 scale.
pub async fn upsert_analytics(
    conn: &mut SqliteConnection,
    session_id: &str,
    owner_id: &str,
    metrics: &SessionMetrics,
    analysis: &AnalysisResult,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO session_analytics (
            session_id, owner_id, talk_time_ratio, filler_words_count,
            speaking_pace_wpm, sentiment_score, overall_score,
            objection_handling_score, closing_score, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            talk_time_ratio = excluded.talk_time_ratio,
            filler_words_count = excluded.filler_words_count,
            speaking_pace_wpm = excluded.speaking_pace_wpm,
            sentiment_score = excluded.sentiment_score,
            overall_score = excluded.overall_score,
            objection_handling_score = excluded.objection_handling_score,
            closing_score = excluded.closing_score,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(session_id)
    .bind(owner_id)
    .bind(metrics.talk_time_ratio)
    .bind(metrics.filler_words_count as i64)
    .bind(metrics.speaking_pace_wpm as i64)
    .bind(metrics.sentiment_score)
    .bind(to_persisted_score(analysis.overall_score))
    .bind(analysis.objection_handling.as_ref().map(|s| to_persisted_score(s.score)))
    .bind(analysis.closing_effectiveness.as_ref().map(|s| to_persisted_score(s.score)))
    .bind(to_db_string(Utc::now()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Stored metrics for a session, if analytics were written
pub async fn load_metrics(pool: &SqlitePool, session_id: &str) -> Result<Option<SessionMetrics>> {
    let row = sqlx::query(
        r#"
        SELECT talk_time_ratio, filler_words_count, speaking_pace_wpm, sentiment_score
        FROM session_analytics
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SessionMetrics {
        talk_time_ratio: row.get("talk_time_ratio"),
        filler_words_count: row.get::<i64, _>("filler_words_count").max(0) as u32,
        speaking_pace_wpm: row.get::<i64, _>("speaking_pace_wpm").max(0) as u32,
        sentiment_score: row.get("sentiment_score"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sessions::insert_session;
    use vtc_common::db::init_memory_database;
    use vtc_common::models::Session;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            overall_score: 7.0,
            strengths: vec![],
            areas_for_improvement: vec![],
            effective_techniques: vec![],
            techniques_needing_work: vec![],
            objection_handling: None,
            closing_effectiveness: None,
            key_recommendations: vec![],
            detailed_analysis: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_metrics() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_session(&mut conn, &Session::start("s-1".into(), Some("o".into()), None))
            .await
            .unwrap();

        let first = SessionMetrics {
            talk_time_ratio: 0.6,
            filler_words_count: 3,
            speaking_pace_wpm: 140,
            sentiment_score: 0.5,
        };
        let second = SessionMetrics {
            filler_words_count: 1,
            ..first
        };
        upsert_analytics(&mut conn, "s-1", "o", &first, &analysis()).await.unwrap();
        upsert_analytics(&mut conn, "s-1", "o", &second, &analysis()).await.unwrap();
        drop(conn);

        assert_eq!(load_metrics(&pool, "s-1").await.unwrap(), Some(second));

        let score: f64 = sqlx::query_scalar("SELECT overall_score FROM session_analytics")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(score, 70.0);
    }
}
