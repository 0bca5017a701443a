use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_new: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Login accepts either the username or the email address.
    pub async fn find_by_login<'c, E: PgExecutor<'c>>(db: E, identifier: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_new, created_at
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id<'c, E: PgExecutor<'c>>(db: E, id: i64) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_new, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn username_or_email_taken<'c, E: PgExecutor<'c>>(db: E, username: &str, email: &str) -> Result<bool, DatabaseError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    /// New accounts start with `is_new = true` so the client can show its welcome flow.
    pub async fn create<'c, E: PgExecutor<'c>>(db: E, username: &str, email: &str, password_hash: &str) -> Result<User, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, is_new)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id, username, email, password_hash, is_new, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password<'c, E: PgExecutor<'c>>(db: E, id: i64, password_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_welcome_seen<'c, E: PgExecutor<'c>>(db: E, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET is_new = FALSE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete<'c, E: PgExecutor<'c>>(db: E, id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
