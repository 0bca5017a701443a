// handlers/public/auth/register.rs - `register` action

use tracing::info;

use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthService, RegisterRequest};

/// `register` - create an account with a single-use invitation code
///
/// Input (top level or nested in `formData`):
/// `{ "username", "email", "password", "password_confirm", "invitation_code" }`
///
/// The user does not get a session; the client logs in afterwards.
pub async fn register(ctx: &ActionContext) -> ApiResult {
    let request: RegisterRequest = ctx.payload.decode()?;
    let user = AuthService::new(&ctx.state).register(&request).await?;
    info!(user_id = user.id, ip = %ctx.ip, "registration completed");

    Ok(ApiResponse::message("Registration successful! You can now log in.").with("user", &user))
}
