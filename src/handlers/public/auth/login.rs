// handlers/public/auth/login.rs - `login` action

use crate::error::ApiError;
use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AuthService;

/// `login` - authenticate by username or email and start a session
///
/// Input: `{ "email": "alice or alice@example.com", "password": "...", "remember": true }`
/// (`username` and `identifier` are accepted in place of `email`)
///
/// Output: `{ "success": true, "message": "Login successful!", "user": {...} }`
/// plus the session cookie. The session id is replaced on every login.
pub async fn login(ctx: &ActionContext) -> ApiResult {
    let payload = &ctx.payload;
    let identifier = payload
        .field("email")
        .or_else(|| payload.field("username"))
        .or_else(|| payload.field("identifier"))
        .unwrap_or_default();
    let password = payload.field("password").unwrap_or_default();
    let remember = payload.flag("remember");

    let user = AuthService::new(&ctx.state)
        .login(&identifier, &password, &ctx.ip, remember, &ctx.session)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiResponse::message("Login successful!").with("user", &user))
}
