use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

/// A failed login. Timestamps are written by the server clock, never by `now()`
/// in SQL, so the throttle window follows the injected clock.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LoginAttempt {
    pub id: i64,
    pub ip_address: String,
    pub username: String,
    pub attempt_time: DateTime<Utc>,
}

impl LoginAttempt {
    pub async fn purge_before<'c, E: PgExecutor<'c>>(db: E, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempt_time < $1")
            .bind(cutoff)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_since<'c, E: PgExecutor<'c>>(db: E, ip: &str, cutoff: DateTime<Utc>) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM login_attempts WHERE ip_address = $1 AND attempt_time >= $2",
        )
        .bind(ip)
        .bind(cutoff)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn record<'c, E: PgExecutor<'c>>(db: E, ip: &str, username: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO login_attempts (ip_address, username, attempt_time) VALUES ($1, $2, $3)")
            .bind(ip)
            .bind(username)
            .bind(at)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn clear_for_ip<'c, E: PgExecutor<'c>>(db: E, ip: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE ip_address = $1")
            .bind(ip)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
