use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AuthService;

/// `changePassword` - `{ "newPassword": "...", "confirmPassword"?: "..." }`
pub async fn change_password(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let new_password = ctx.payload.field("newPassword").unwrap_or_default();
    let confirm = ctx.payload.field("confirmPassword");

    AuthService::new(&ctx.state)
        .change_password(user.user_id, &new_password, confirm.as_deref())
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

/// `deleteAccount` - remove the user and every row they own, then end the session
pub async fn delete_account(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    AuthService::new(&ctx.state)
        .delete_account(user.user_id, user.session.as_ref())
        .await?;
    Ok(ApiResponse::message("Account deleted"))
}
