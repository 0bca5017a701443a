use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{expiry_from, fingerprint, generate_token, looks_like_token, SessionUser};
use crate::database::models::{profile, ApiToken, User};
use crate::database::DatabaseError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Long-lived bearer tokens for non-browser clients, one per user.
pub struct TokenService<'a> {
    state: &'a AppState,
}

impl<'a> TokenService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Issues a fresh token, replacing any previous one.
    pub async fn generate(&self, user_id: i64) -> Result<IssuedToken, DatabaseError> {
        let token = generate_token();
        let expires_at = expiry_from(self.state.clock.utc(), self.state.config.auth.token_ttl_days);
        let stored = ApiToken::upsert(self.state.db.pool(), user_id, &token, expires_at).await?;
        info!(user_id, expires_at = %stored.expires_at, "api token issued");
        Ok(IssuedToken {
            token: stored.access_token,
            expires_at: stored.expires_at,
        })
    }

    /// The user's current token, if it has not expired.
    pub async fn get(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let now = self.state.clock.utc();
        let token = ApiToken::find_for_user(self.state.db.pool(), user_id).await?;
        Ok(token.filter(|t| t.expires_at > now).map(|t| t.access_token))
    }

    pub async fn revoke(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let removed = ApiToken::delete_for_user(self.state.db.pool(), user_id).await?;
        if removed > 0 {
            info!(user_id, "api token revoked");
        }
        Ok(removed > 0)
    }

    /// Resolves a bearer token to a request-scoped user. Nothing is stored
    /// in the session store; every request re-validates the token.
    pub async fn authenticate(&self, token: &str) -> Result<Option<SessionUser>, DatabaseError> {
        if !looks_like_token(token) {
            return Ok(None);
        }
        let pool = self.state.db.pool();
        let now = self.state.clock.utc();

        let Some(stored) = ApiToken::find_live(pool, token, now).await? else {
            debug!(token = %fingerprint(token), "unknown or expired api token");
            return Ok(None);
        };
        let Some(user) = User::find_by_id(pool, stored.user_id).await? else {
            warn!(user_id = stored.user_id, "api token references a missing user");
            return Ok(None);
        };
        let is_pro = profile::is_pro(pool, &self.state.app.account.profile_table, user.id)
            .await
            .unwrap_or(false);

        Ok(Some(SessionUser {
            user_id: user.id,
            username: user.username,
            email: user.email,
            is_pro,
            is_new: user.is_new,
        }))
    }
}
