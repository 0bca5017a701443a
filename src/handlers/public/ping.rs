use serde_json::json;

use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult};

/// `ping` - liveness plus server time, no database access
pub async fn ping(ctx: &ActionContext) -> ApiResult {
    Ok(ApiResponse::message("pong")
        .with("time", ctx.state.clock.utc())
        .with("version", json!(env!("CARGO_PKG_VERSION"))))
}
