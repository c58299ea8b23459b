//! Session row persistence

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use vtc_common::models::{ProcessingStatus, Session, SessionStatus};
use vtc_common::time::{from_db_opt, from_db_string, to_db_string};
use vtc_common::{Error, Result, TranscriptMessage};

/// Fields written by the end-session transition
#[derive(Debug, Clone)]
pub struct EndUpdate {
    pub duration_seconds: f64,
    pub transcript: Vec<TranscriptMessage>,
    pub audio_quality: Option<Value>,
    pub processing_status: ProcessingStatus,
    pub ended_at: DateTime<Utc>,
}

/// Insert a new persisted session
pub async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> Result<()> {
    let owner_id = session
        .owner_id
        .as_deref()
        .ok_or_else(|| Error::Internal(format!("Session {} has no owner", session.id)))?;
    let transcript = serde_json::to_string(&session.transcript)?;
    let audio_quality = session
        .audio_quality
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO sessions (
            id, owner_id, status, processing_status, scenario, duration_seconds,
            transcript, audio_quality, overall_score, feedback,
            created_at, started_at, ended_at, analyzed_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(owner_id)
    .bind(&session.status)
    .bind(session.processing_status.map(ProcessingStatus::as_str))
    .bind(&session.scenario)
    .bind(session.duration_seconds)
    .bind(&transcript)
    .bind(&audio_quality)
    .bind(session.overall_score)
    .bind(&session.feedback)
    .bind(to_db_string(session.created_at))
    .bind(session.started_at.map(to_db_string))
    .bind(session.ended_at.map(to_db_string))
    .bind(session.analyzed_at.map(to_db_string))
    .bind(session.updated_at.map(to_db_string))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load a session by id
pub async fn load_session(pool: &SqlitePool, session_id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, owner_id, status, processing_status, scenario, duration_seconds,
               transcript, audio_quality, overall_score, feedback,
               created_at, started_at, ended_at, analyzed_at, updated_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| session_from_row(&r)).transpose()
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    let transcript: String = row.get("transcript");
    let transcript: Vec<TranscriptMessage> = serde_json::from_str(&transcript)
        .map_err(|e| Error::Internal(format!("Failed to deserialize transcript: {}", e)))?;

    let audio_quality: Option<String> = row.get("audio_quality");
    let audio_quality = audio_quality
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize audio_quality: {}", e)))?;

    let processing_status: Option<String> = row.get("processing_status");
    let created_at: String = row.get("created_at");

    Ok(Session {
        id: row.get("id"),
        owner_id: Some(row.get("owner_id")),
        status: row.get("status"),
        processing_status: processing_status.as_deref().and_then(ProcessingStatus::parse),
        scenario: row.get("scenario"),
        duration_seconds: row.get("duration_seconds"),
        transcript,
        audio_quality,
        overall_score: row.get("overall_score"),
        feedback: row.get("feedback"),
        created_at: from_db_string(&created_at)?,
        started_at: from_db_opt(row.get("started_at"))?,
        ended_at: from_db_opt(row.get("ended_at"))?,
        analyzed_at: from_db_opt(row.get("analyzed_at"))?,
        updated_at: from_db_opt(row.get("updated_at"))?,
    })
}

/// Apply the end transition
///
/// Guarded on `status = 'active'`: returns `false` without writing anything
/// when the session has already ended, so concurrent or repeated calls only
/// transition once.
pub async fn end_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    update: &EndUpdate,
) -> Result<bool> {
    let transcript = serde_json::to_string(&update.transcript)?;
    let audio_quality = update
        .audio_quality
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let ended_at = to_db_string(update.ended_at);

    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET status = ?,
            processing_status = ?,
            duration_seconds = ?,
            transcript = ?,
            audio_quality = COALESCE(?, audio_quality),
            ended_at = ?,
            updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(SessionStatus::Completed.as_str())
    .bind(update.processing_status.as_str())
    .bind(update.duration_seconds)
    .bind(&transcript)
    .bind(&audio_quality)
    .bind(&ended_at)
    .bind(&ended_at)
    .bind(session_id)
    .bind(SessionStatus::Active.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record the analysis summary on the session row
///
/// `overall_score` is on the persisted 0–100 scale.
pub async fn mark_analyzed(
    conn: &mut SqliteConnection,
    session_id: &str,
    overall_score: f64,
    feedback: &str,
    analyzed_at: DateTime<Utc>,
) -> Result<()> {
    let analyzed_at = to_db_string(analyzed_at);

    sqlx::query(
        r#"
        UPDATE sessions
        SET status = ?,
            processing_status = ?,
            overall_score = ?,
            feedback = ?,
            analyzed_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(SessionStatus::Analyzed.as_str())
    .bind(ProcessingStatus::Completed.as_str())
    .bind(overall_score.clamp(0.0, 100.0))
    .bind(feedback)
    .bind(&analyzed_at)
    .bind(&analyzed_at)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Move an ended session back into analysis
///
/// The only backward status move: `analyzed` returns to `completed` with
/// `processing_status = analyzing` until the new result lands.
pub async fn mark_reprocessing(conn: &mut SqliteConnection, session_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sessions
        SET status = ?,
            processing_status = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(SessionStatus::Completed.as_str())
    .bind(ProcessingStatus::Analyzing.as_str())
    .bind(to_db_string(Utc::now()))
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Close the analysis sub-state without a result
pub async fn set_processing_status(
    pool: &SqlitePool,
    session_id: &str,
    status: ProcessingStatus,
) -> Result<()> {
    sqlx::query("UPDATE sessions SET processing_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(to_db_string(Utc::now()))
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}
