//! Subscription minute accounting

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use vtc_common::time::to_db_string;
use vtc_common::Result;

/// Billable minutes for a duration: whole minutes, rounded up
pub fn minute_cost(duration_seconds: f64) -> i64 {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return 0;
    }
    (duration_seconds / 60.0).ceil() as i64
}

/// Add minutes to an owner's running total and return the new total
///
/// Meant to run inside the end-session transaction so the charge lands
/// together with the status change or not at all.
pub async fn charge_minutes(conn: &mut SqliteConnection, owner_id: &str, minutes: i64) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO subscription_usage (owner_id, minutes_used, sessions_count, updated_at)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(owner_id) DO UPDATE SET
            minutes_used = minutes_used + excluded.minutes_used,
            sessions_count = sessions_count + 1,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(owner_id)
    .bind(minutes)
    .bind(to_db_string(Utc::now()))
    .execute(&mut *conn)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT minutes_used FROM subscription_usage WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(total)
}

/// Current minute total for an owner (0 if never charged)
pub async fn minutes_used(pool: &SqlitePool, owner_id: &str) -> Result<i64> {
    let total: Option<i64> =
        sqlx::query_scalar("SELECT minutes_used FROM subscription_usage WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;
    Ok(total.unwrap_or(0))
}
