//! Append-only audit trail of session events

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqliteConnection, SqlitePool};
use vtc_common::time::{from_db_string, to_db_string};
use vtc_common::Result;

/// Audited session events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    SessionStarted,
    SessionEnded,
    AnalysisPersisted,
    AnalysisFailed,
    AnalysisReprocessRequested,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::SessionStarted => "session_started",
            AuditAction::SessionEnded => "session_ended",
            AuditAction::AnalysisPersisted => "analysis_persisted",
            AuditAction::AnalysisFailed => "analysis_failed",
            AuditAction::AnalysisReprocessRequested => "analysis_reprocess_requested",
        }
    }
}

/// One audit row
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub session_id: String,
    pub owner_id: Option<String>,
    pub action: String,
    pub details: Option<Value>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Append an audit row
pub async fn record(
    conn: &mut SqliteConnection,
    session_id: &str,
    owner_id: Option<&str>,
    action: AuditAction,
    details: Option<Value>,
) -> Result<()> {
    let details = details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_log (session_id, owner_id, action, details, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(owner_id)
    .bind(action.as_str())
    .bind(&details)
    .bind(to_db_string(Utc::now()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Audit rows for a session, oldest first
pub async fn list_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<AuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT session_id, owner_id, action, details, created_at
        FROM audit_log
        WHERE session_id = ?
        ORDER BY id
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let details: Option<String> = row.get("details");
            let created_at: String = row.get("created_at");
            Ok(AuditEntry {
                session_id: row.get("session_id"),
                owner_id: row.get("owner_id"),
                action: row.get("action"),
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
                created_at: from_db_string(&created_at)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vtc_common::db::init_memory_database;

    #[tokio::test]
    async fn test_record_and_list_in_order() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        record(&mut conn, "s-1", Some("o"), AuditAction::SessionStarted, None).await.unwrap();
        record(
            &mut conn,
            "s-1",
            Some("o"),
            AuditAction::SessionEnded,
            Some(json!({"minuteCost": 4})),
        )
        .await
        .unwrap();
        record(&mut conn, "s-2", None, AuditAction::AnalysisFailed, None).await.unwrap();
        drop(conn);

        let entries = list_for_session(&pool, "s-1").await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["session_started", "session_ended"]);
        assert_eq!(entries[1].details, Some(json!({"minuteCost": 4})));
    }
}
