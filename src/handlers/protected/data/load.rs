use chrono::NaiveDate;

use crate::error::ApiError;
use crate::handlers::{ActionContext, Payload};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::DataService;

/// Mapping `getHistoryData` falls back to when the client names none.
const DEFAULT_HISTORY_MAPPING: &str = "protokollForm";

/// `getFormData` / `load` - first row matching `filter` (or `where`), `{}` if none
pub async fn get_form_data(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let mapping = ctx.payload.mapping()?;
    let row = DataService::new(&ctx.state)
        .load_one(user.user_id, mapping, ctx.payload.filter())
        .await?;
    Ok(ApiResponse::data(row))
}

/// `loadAll` - every matching row
pub async fn load_all(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let mapping = ctx.payload.mapping()?;
    let rows = DataService::new(&ctx.state)
        .load_many(user.user_id, mapping, ctx.payload.filter())
        .await?;
    Ok(ApiResponse::data(rows))
}

/// `getTableData` - optional `filter.days` window (top-level `days` also accepted)
pub async fn get_table_data(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let mapping = ctx.payload.mapping()?;
    let filter = ctx.payload.filter();
    let days = Payload::int(filter.get("days").or_else(|| ctx.payload.get("days")), "days")?;

    let rows = DataService::new(&ctx.state)
        .table_data(user.user_id, mapping, days)
        .await?;
    Ok(ApiResponse::data(rows))
}

/// `getHistoryData` - `{ mappingName?, endDate?: "YYYY-MM-DD", limit? }`
pub async fn get_history_data(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let payload = &ctx.payload;
    let mapping = payload
        .str("mappingName")
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_HISTORY_MAPPING);
    let end_date = match payload.str("endDate").filter(|d| !d.is_empty()) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::field_error("endDate", "endDate must be YYYY-MM-DD"))?,
        ),
        None => None,
    };
    let limit = Payload::int(payload.get("limit"), "limit")?;
    if limit.is_some_and(|l| l < 1) {
        return Err(ApiError::field_error("limit", "limit must be positive"));
    }

    let rows = DataService::new(&ctx.state)
        .history(user.user_id, mapping, end_date, limit)
        .await?;
    Ok(ApiResponse::data(rows))
}

/// `exportData` - profile plus recent history in one document
pub async fn export_data(ctx: &ActionContext, user: &AuthUser) -> ApiResult {
    let export = DataService::new(&ctx.state).export(user.user_id).await?;
    Ok(ApiResponse::data(export))
}
