use serde_json::json;

use crate::handlers::dispatch::not_logged_in;
use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{AuthError, AuthService, PublicUser};

/// `logout` - destroy the session; the layer clears the cookie
pub async fn logout(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    AuthService::new(&ctx.state).logout(user.session.as_ref()).await?;
    Ok(ApiResponse::message("Logged out"))
}

/// `checkAuth` - `{ "isLoggedIn": true, "user": {...} }` with values refreshed from storage
pub async fn check_auth(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let refreshed = AuthService::new(&ctx.state)
        .check_auth(user.session.as_ref(), user.user.clone())
        .await;

    match refreshed {
        Ok(current) => Ok(ApiResponse::bare(json!({
            "isLoggedIn": true,
            "user": PublicUser::from(&current),
        }))),
        Err(AuthError::NotAuthenticated) => Ok(not_logged_in()),
        Err(e) => Err(e.into()),
    }
}

/// `markWelcomeAsSeen` - clear the first-login flag
pub async fn mark_welcome_seen(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    AuthService::new(&ctx.state)
        .mark_welcome_seen(user.user_id, user.session.as_ref())
        .await?;
    Ok(ApiResponse::message("Welcome message marked as seen"))
}
