use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TokenService;

/// `generateApiToken` - issue (or replace) the caller's bearer token
pub async fn generate_api_token(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let issued = TokenService::new(&ctx.state).generate(user.user_id).await?;
    Ok(ApiResponse::success()
        .with("token", issued.token)
        .with("expires_at", issued.expires_at))
}

/// `getApiToken` - `{ "token": "..." | null }`
pub async fn get_api_token(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let token = TokenService::new(&ctx.state).get(user.user_id).await?;
    Ok(ApiResponse::success().with("token", token))
}

/// `deleteApiToken`
pub async fn delete_api_token(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    TokenService::new(&ctx.state).revoke(user.user_id).await?;
    Ok(ApiResponse::message("API token deleted"))
}
