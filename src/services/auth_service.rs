use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::{session::Error as SessionError, Session};
use tracing::{error, info, warn};

use crate::auth::{
    current_user, end_session, hash_password, persist_user, start_session, verify_password, PasswordError,
    SessionUser,
};
use crate::database::models::{profile, Invitation, LoginAttempt, User};
use crate::database::query_builder::delete_owned_rows;
use crate::database::DatabaseError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Invalid or already used invitation code")]
    InvalidInvitation,

    #[error("Username or email already taken")]
    DuplicateUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many failed attempts, retry in {minutes} minutes")]
    RateLimited { minutes: i64 },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Registration failed")]
    RegistrationFailed,

    #[error("Account deletion failed")]
    DeletionFailed,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// User fields safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_new: bool,
    pub is_pro: bool,
}

impl From<&SessionUser> for PublicUser {
    fn from(user: &SessionUser) -> Self {
        Self {
            id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_new: user.is_new,
            is_pro: user.is_pro,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub invitation_code: String,
}

/// Login, registration and account lifecycle.
pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Authenticates by username or email. Failed attempts are counted per
    /// client address; once the window holds `max_attempts` failures the
    /// address is locked out without touching the users table. On success the
    /// request's session gets a fresh id holding the user.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        ip: &str,
        remember: bool,
        session: &Session,
    ) -> Result<PublicUser, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let pool = self.state.db.pool();
        let throttle = self.state.throttle();
        let now = self.state.clock.utc();
        let cutoff = throttle.cutoff(now);

        LoginAttempt::purge_before(pool, cutoff).await?;
        let failures = LoginAttempt::count_since(pool, ip, cutoff).await?;
        if throttle.is_locked(failures) {
            warn!(ip, failures, "login locked out");
            return Err(AuthError::RateLimited { minutes: throttle.lockout_minutes() });
        }

        let user = User::find_by_login(pool, identifier).await?;
        let verified = match &user {
            Some(user) => verify_password(password, &user.password_hash).unwrap_or_else(|e| {
                error!(user_id = user.id, error = %e, "stored password hash unusable");
                false
            }),
            None => false,
        };

        let user = match user {
            Some(user) if verified => user,
            _ => {
                LoginAttempt::record(pool, ip, identifier, now).await?;
                info!(ip, "login failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        LoginAttempt::clear_for_ip(pool, ip).await?;
        let is_pro = self.lookup_is_pro(user.id).await;

        let session_user = SessionUser {
            user_id: user.id,
            username: user.username,
            email: user.email,
            is_pro,
            is_new: user.is_new,
        };
        let remember_days = remember.then_some(self.state.config.auth.remember_days);
        start_session(session, &session_user, remember_days).await?;
        info!(user_id = session_user.user_id, remember, "login succeeded");

        Ok(PublicUser::from(&session_user))
    }

    /// Creates the user and an empty profile and claims the invitation, all
    /// in one transaction.
    pub async fn register(&self, request: &RegisterRequest) -> Result<PublicUser, AuthError> {
        let username = request.username.trim();
        let email = request.email.trim();
        let code = request.invitation_code.trim();
        if username.is_empty()
            || email.is_empty()
            || request.password.is_empty()
            || request.password_confirm.is_empty()
            || code.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if request.password != request.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        let min = self.state.config.auth.min_password_length;
        if request.password.chars().count() < min {
            return Err(AuthError::WeakPassword(min));
        }

        let pool = self.state.db.pool();
        match Invitation::find(pool, code).await? {
            Some(invitation) if !invitation.is_used() => {}
            _ => return Err(AuthError::InvalidInvitation),
        }
        if User::username_or_email_taken(pool, username, email).await? {
            return Err(AuthError::DuplicateUser);
        }

        let password_hash = hash_password(&request.password)?;
        let now = self.state.clock.utc();
        let profile_table = &self.state.app.account.profile_table;

        let mut tx = pool.begin().await.map_err(DatabaseError::from)?;
        let result: Result<Option<User>, DatabaseError> = async {
            let user = User::create(&mut *tx, username, email, &password_hash).await?;
            profile::create_empty(&mut *tx, profile_table, user.id).await?;
            let claimed = Invitation::claim(&mut *tx, code, user.id, now).await?;
            Ok(claimed.then_some(user))
        }
        .await;

        match result {
            Ok(Some(user)) => {
                tx.commit().await.map_err(|e| {
                    error!(error = %e, "registration commit failed");
                    AuthError::RegistrationFailed
                })?;
                info!(user_id = user.id, "user registered");
                Ok(PublicUser {
                    id: user.id,
                    username: user.username,
                    email: user.email,
                    is_new: user.is_new,
                    is_pro: false,
                })
            }
            Ok(None) => {
                // Another registration claimed the code between the check and the claim.
                rollback(tx).await;
                Err(AuthError::InvalidInvitation)
            }
            Err(e) => {
                error!(error = %e, "registration rolled back");
                rollback(tx).await;
                Err(AuthError::RegistrationFailed)
            }
        }
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        new_password: &str,
        confirm: Option<&str>,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let min = self.state.config.auth.min_password_length;
        if new_password.chars().count() < min {
            return Err(AuthError::WeakPassword(min));
        }
        if confirm.is_some_and(|c| c != new_password) {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = hash_password(new_password)?;
        if !User::update_password(self.state.db.pool(), user_id, &password_hash).await? {
            return Err(AuthError::NotAuthenticated);
        }
        info!(user_id, "password changed");
        Ok(())
    }

    /// Deletes the user's rows in every dependent table, then the user. The
    /// session is only destroyed once the transaction has committed.
    pub async fn delete_account(&self, user_id: i64, session: Option<&Session>) -> Result<(), AuthError> {
        let tables = self.state.app.dependent_tables();
        let pool = self.state.db.pool();

        let mut tx = pool.begin().await.map_err(|e| {
            error!(user_id, error = %e, "could not start deletion");
            AuthError::DeletionFailed
        })?;
        let result: Result<(), DatabaseError> = async {
            for table in &tables {
                delete_owned_rows(&mut *tx, table, user_id).await?;
            }
            User::delete(&mut *tx, user_id).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(user_id, error = %e, "account deletion rolled back");
            rollback(tx).await;
            return Err(AuthError::DeletionFailed);
        }
        tx.commit().await.map_err(|e| {
            error!(user_id, error = %e, "account deletion commit failed");
            AuthError::DeletionFailed
        })?;

        info!(user_id, tables = tables.len(), "account deleted");
        if let Some(session) = session {
            end_session(session).await?;
        }
        Ok(())
    }

    /// Reloads the user's fields into the session. If storage is unreachable
    /// the caller stays logged in with the stale values and `is_new = false`.
    pub async fn check_auth(&self, session: Option<&Session>, mut current: SessionUser) -> Result<SessionUser, AuthError> {
        match User::find_by_id(self.state.db.pool(), current.user_id).await {
            Ok(Some(user)) => {
                current.username = user.username;
                current.email = user.email;
                current.is_new = user.is_new;
                current.is_pro = self.lookup_is_pro(user.id).await;
            }
            Ok(None) => {
                if let Some(session) = session {
                    end_session(session).await?;
                }
                return Err(AuthError::NotAuthenticated);
            }
            Err(e) => {
                warn!(user_id = current.user_id, error = %e, "checkAuth falling back to session values");
                current.is_new = false;
            }
        }

        if let Some(session) = session {
            persist_user(session, &current).await?;
        }
        Ok(current)
    }

    pub async fn mark_welcome_seen(&self, user_id: i64, session: Option<&Session>) -> Result<(), AuthError> {
        User::mark_welcome_seen(self.state.db.pool(), user_id).await?;
        if let Some(session) = session {
            if let Some(mut current) = current_user(session).await? {
                current.is_new = false;
                persist_user(session, &current).await?;
            }
        }
        Ok(())
    }

    pub async fn logout(&self, session: Option<&Session>) -> Result<(), AuthError> {
        if let Some(session) = session {
            end_session(session).await?;
            info!("logged out");
        }
        Ok(())
    }

    async fn lookup_is_pro(&self, user_id: i64) -> bool {
        let table = &self.state.app.account.profile_table;
        profile::is_pro(self.state.db.pool(), table, user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "profile lookup failed, assuming not pro");
                false
            })
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Postgres>) {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "rollback failed");
    }
}
