use serde::{Deserialize, Serialize};
use tower_sessions::{
    cookie::SameSite, session::Error as SessionError, Expiry, MemoryStore, Session, SessionManagerLayer,
};

use crate::config::AppConfig;

/// Session key holding the logged-in user.
pub const USER_KEY: &str = "user";

/// Per-login user fields kept server-side and referenced by the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub is_pro: bool,
    pub is_new: bool,
}

/// Cookie session layer over the in-process store. Sessions expire after
/// `session_idle_minutes` without a request.
pub fn session_layer(config: &AppConfig, store: MemoryStore) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(store)
        .with_name(config.security.session_cookie.clone())
        .with_path("/")
        .with_http_only(true)
        .with_secure(config.security.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.auth.session_idle_minutes,
        )))
}

pub async fn current_user(session: &Session) -> Result<Option<SessionUser>, SessionError> {
    session.get::<SessionUser>(USER_KEY).await
}

pub async fn persist_user(session: &Session, user: &SessionUser) -> Result<(), SessionError> {
    session.insert(USER_KEY, user).await
}

/// Replaces the session id and stores `user` under it. Remembered logins
/// stay alive for `remember_days` instead of the idle timeout.
pub async fn start_session(
    session: &Session,
    user: &SessionUser,
    remember: Option<i64>,
) -> Result<(), SessionError> {
    session.cycle_id().await?;
    if let Some(days) = remember {
        session.set_expiry(Some(Expiry::OnInactivity(time::Duration::days(days))));
    }
    persist_user(session, user).await
}

/// Drops the stored record; the layer then expires the cookie.
pub async fn end_session(session: &Session) -> Result<(), SessionError> {
    session.flush().await
}
