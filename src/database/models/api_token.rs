use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApiToken {
    pub user_id: i64,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl ApiToken {
    /// One token per user: generating again replaces the previous one.
    pub async fn upsert<'c, E: PgExecutor<'c>>(db: E, user_id: i64, access_token: &str, expires_at: DateTime<Utc>) -> Result<ApiToken, DatabaseError> {
        let token = sqlx::query_as::<_, ApiToken>(
            r#"
            INSERT INTO oauth_tokens (user_id, access_token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
              SET access_token = EXCLUDED.access_token,
                  expires_at = EXCLUDED.expires_at
            RETURNING user_id, access_token, expires_at
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(token)
    }

    pub async fn find_for_user<'c, E: PgExecutor<'c>>(db: E, user_id: i64) -> Result<Option<ApiToken>, DatabaseError> {
        let token = sqlx::query_as::<_, ApiToken>(
            "SELECT user_id, access_token, expires_at FROM oauth_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(token)
    }

    pub async fn find_live<'c, E: PgExecutor<'c>>(db: E, access_token: &str, now: DateTime<Utc>) -> Result<Option<ApiToken>, DatabaseError> {
        let token = sqlx::query_as::<_, ApiToken>(
            "SELECT user_id, access_token, expires_at FROM oauth_tokens WHERE access_token = $1 AND expires_at > $2",
        )
        .bind(access_token)
        .bind(now)
        .fetch_optional(db)
        .await?;
        Ok(token)
    }

    pub async fn delete_for_user<'c, E: PgExecutor<'c>>(db: E, user_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM oauth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
