use crate::handlers::ActionContext;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::DataService;

/// `saveFormData` / `save` - insert or update one row of the mapped table
///
/// Input: `{ "mappingName": "...", "formData": {...} }` (or `data`)
///
/// Output: `{ "success": true, "message", "affectedRows": 1, "type": "insert"|"update", "id" }`
pub async fn save_form_data(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let mapping = ctx.payload.mapping()?;
    let data = ctx.payload.data()?;

    let outcome = DataService::new(&ctx.state)
        .save(user.user_id, mapping, data)
        .await?;

    Ok(ApiResponse::message("Data saved successfully")
        .with("affectedRows", outcome.affected_rows)
        .with("type", outcome.operation)
        .with("id", outcome.id))
}
