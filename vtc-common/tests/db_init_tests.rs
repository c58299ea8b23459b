//! Database initialization tests
//!
//! - Database file created on first run
//! - Existing database reopened without error
//! - Schema creation is idempotent
//! - Uniqueness of per-session analysis rows enforced by the schema

use sqlx::Row;
use tempfile::TempDir;
use vtc_common::db::{create_schema, init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("vtc.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("vtc.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    create_schema(&pool).await.unwrap();
    create_schema(&pool).await.unwrap();

    let tables: Vec<String> = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    for expected in [
        "access_tokens",
        "analysis_results",
        "audit_log",
        "session_analytics",
        "sessions",
        "subscription_usage",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_analysis_results_unique_per_session() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO sessions (id, owner_id, status, created_at) VALUES ('s1', 'u1', 'completed', '2024-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO analysis_results (session_id, overall_score, strengths, areas_for_improvement, created_at, updated_at) \
                  VALUES ('s1', 70, '[]', '[]', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')";

    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;

    assert!(duplicate.is_err(), "second plain insert must violate the unique key");
}
