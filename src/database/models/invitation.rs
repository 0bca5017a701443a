use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invitation {
    pub id: i64,
    pub code: String,
    pub used_by: Option<i64>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// A code is spent once `used_at` is set, even if the claiming account is gone.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub async fn find<'c, E: PgExecutor<'c>>(db: E, code: &str) -> Result<Option<Invitation>, DatabaseError> {
        let invitation = sqlx::query_as::<_, Invitation>(
            "SELECT id, code, used_by, used_at, created_at FROM invitation_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(db)
        .await?;
        Ok(invitation)
    }

    /// Conditional claim. Returns false when another registration got there first.
    pub async fn claim<'c, E: PgExecutor<'c>>(db: E, code: &str, user_id: i64, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE invitation_codes SET used_by = $1, used_at = $2 WHERE code = $3 AND used_at IS NULL",
        )
        .bind(user_id)
        .bind(at)
        .bind(code)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn create<'c, E: PgExecutor<'c>>(db: E, code: &str) -> Result<Invitation, DatabaseError> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitation_codes (code)
            VALUES ($1)
            RETURNING id, code, used_by, used_at, created_at
            "#,
        )
        .bind(code)
        .fetch_one(db)
        .await?;
        Ok(invitation)
    }

    pub async fn list<'c, E: PgExecutor<'c>>(db: E) -> Result<Vec<Invitation>, DatabaseError> {
        let invitations = sqlx::query_as::<_, Invitation>(
            "SELECT id, code, used_by, used_at, created_at FROM invitation_codes ORDER BY id",
        )
        .fetch_all(db)
        .await?;
        Ok(invitations)
    }
}
