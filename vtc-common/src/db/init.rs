//! Database initialization
//!
//! Creates the database file on first run and brings the schema up to date.
//! Every statement is idempotent, so this runs on each service start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every SQLite in-memory connection is its own
/// database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_sessions_table(pool).await?;
    create_analysis_results_table(pool).await?;
    create_session_analytics_table(pool).await?;
    create_subscription_usage_table(pool).await?;
    create_audit_log_table(pool).await?;
    create_access_tokens_table(pool).await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            status TEXT NOT NULL,
            processing_status TEXT CHECK (processing_status IS NULL OR processing_status IN ('analyzing', 'completed')),
            scenario TEXT,
            duration_seconds REAL,
            transcript TEXT NOT NULL DEFAULT '[]',
            audio_quality TEXT,
            overall_score REAL,
            feedback TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            ended_at TEXT,
            analyzed_at TEXT,
            updated_at TEXT,
            CHECK (duration_seconds IS NULL OR duration_seconds > 0),
            CHECK (overall_score IS NULL OR (overall_score >= 0 AND overall_score <= 100))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id, created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per session; `session_id` uniqueness is what makes re-analysis an upsert
async fn create_analysis_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id) ON DELETE CASCADE,
            overall_score REAL NOT NULL,
            strengths TEXT NOT NULL,
            areas_for_improvement TEXT NOT NULL,
            effective_techniques TEXT NOT NULL DEFAULT '[]',
            techniques_needing_work TEXT NOT NULL DEFAULT '[]',
            objection_handling TEXT,
            closing_effectiveness TEXT,
            key_recommendations TEXT NOT NULL DEFAULT '[]',
            detailed_analysis TEXT,
            is_mock INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (overall_score >= 0 AND overall_score <= 100)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_session_analytics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_analytics (
            session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id) ON DELETE CASCADE,
            owner_id TEXT NOT NULL,
            talk_time_ratio REAL NOT NULL,
            filler_words_count INTEGER NOT NULL,
            speaking_pace_wpm INTEGER NOT NULL,
            sentiment_score REAL NOT NULL,
            overall_score REAL NOT NULL,
            objection_handling_score REAL,
            closing_score REAL,
            updated_at TEXT NOT NULL,
            CHECK (talk_time_ratio >= 0 AND talk_time_ratio <= 1),
            CHECK (sentiment_score >= 0 AND sentiment_score <= 1),
            CHECK (filler_words_count >= 0),
            CHECK (speaking_pace_wpm >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_analytics_owner ON session_analytics(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_subscription_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscription_usage (
            owner_id TEXT PRIMARY KEY,
            minutes_used INTEGER NOT NULL DEFAULT 0,
            sessions_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            CHECK (minutes_used >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            owner_id TEXT,
            action TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_session ON audit_log(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Bearer tokens are stored as SHA-256 hex digests, never in clear
async fn create_access_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_tokens (
            token_hash TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT,
            CHECK (length(token_hash) = 64)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
