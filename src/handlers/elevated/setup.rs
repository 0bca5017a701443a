use tracing::{info, warn};

use crate::error::ApiError;
use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// `setup` - run the configured `tables_sql` statements
///
/// Every statement is attempted; failures are logged server-side and only
/// counted in the response. The schema cache is dropped afterwards so new
/// or altered tables are re-read.
pub async fn setup(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    if !ctx.state.config.security.setup_enabled {
        warn!(user_id = user.user_id, "setup requested while disabled");
        return Err(ApiError::forbidden("Setup is disabled"));
    }

    let statements = &ctx.state.app.tables_sql;
    let report = ctx.state.db.run_setup(statements).await;
    ctx.state.schemas.clear().await;
    info!(
        user_id = user.user_id,
        executed = report.executed,
        failed = report.failures.len(),
        "setup finished"
    );

    if !report.is_success() {
        return Err(ApiError::internal_server_error(format!(
            "Setup finished with {} of {} statements failing",
            report.failures.len(),
            statements.len()
        )));
    }
    Ok(ApiResponse::message(format!(
        "Setup successful! {} statements processed.",
        report.executed
    )))
}
