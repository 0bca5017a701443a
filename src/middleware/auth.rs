use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::convert::Infallible;
use tower_sessions::Session;
use tracing::warn;

use crate::auth::{current_user, SessionUser};
use crate::services::TokenService;
use crate::state::AppState;

/// Authenticated caller, from the session cookie or a bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub user: SessionUser,
    /// Set for cookie sessions; bearer-token callers have no stored session.
    pub session: Option<Session>,
}

impl AuthUser {
    fn from_session(user: SessionUser, session: Session) -> Self {
        Self {
            user_id: user.user_id,
            user,
            session: Some(session),
        }
    }

    fn from_token(user: SessionUser) -> Self {
        Self {
            user_id: user.user_id,
            user,
            session: None,
        }
    }
}

/// Optional identity. Never rejects: the dispatcher decides per action
/// whether an anonymous caller is acceptable.
#[derive(Clone, Debug, Default)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = from_session(parts).await {
            return Ok(MaybeAuthUser(Some(user)));
        }

        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok();
        let Some(TypedHeader(Authorization(bearer))) = bearer else {
            return Ok(MaybeAuthUser(None));
        };

        match TokenService::new(state).authenticate(bearer.token()).await {
            Ok(Some(user)) => Ok(MaybeAuthUser(Some(AuthUser::from_token(user)))),
            Ok(None) => Ok(MaybeAuthUser(None)),
            Err(e) => {
                warn!(error = %e, "bearer token lookup failed");
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

async fn from_session(parts: &Parts) -> Option<AuthUser> {
    let session = parts.extensions.get::<Session>()?.clone();
    match current_user(&session).await {
        Ok(user) => user.map(|user| AuthUser::from_session(user, session)),
        Err(e) => {
            warn!(error = %e, "session lookup failed");
            None
        }
    }
}
