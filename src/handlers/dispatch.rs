// handlers/dispatch.rs - GET/POST /api action dispatcher

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use tower_sessions::Session;
use tracing::{debug, info_span, Instrument};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser, ClientIp, MaybeAuthUser};
use crate::state::AppState;

use super::{elevated, protected, public};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ping,
    Login,
    Register,
    Logout,
    CheckAuth,
    GetFormData,
    LoadAll,
    SaveFormData,
    GetTableData,
    GetHistoryData,
    ExportData,
    ChangePassword,
    DeleteAccount,
    MarkWelcomeAsSeen,
    GenerateApiToken,
    GetApiToken,
    DeleteApiToken,
    Setup,
}

impl Action {
    /// Actions an anonymous caller may invoke.
    pub fn is_public(self) -> bool {
        matches!(self, Action::Ping | Action::Login | Action::Register)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::Login => "login",
            Action::Register => "register",
            Action::Logout => "logout",
            Action::CheckAuth => "checkAuth",
            Action::GetFormData => "getFormData",
            Action::LoadAll => "loadAll",
            Action::SaveFormData => "saveFormData",
            Action::GetTableData => "getTableData",
            Action::GetHistoryData => "getHistoryData",
            Action::ExportData => "exportData",
            Action::ChangePassword => "changePassword",
            Action::DeleteAccount => "deleteAccount",
            Action::MarkWelcomeAsSeen => "markWelcomeAsSeen",
            Action::GenerateApiToken => "generateApiToken",
            Action::GetApiToken => "getApiToken",
            Action::DeleteApiToken => "deleteApiToken",
            Action::Setup => "setup",
        }
    }
}

impl FromStr for Action {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "ping" => Action::Ping,
            "login" => Action::Login,
            "register" => Action::Register,
            "logout" => Action::Logout,
            "checkAuth" => Action::CheckAuth,
            "getFormData" | "load" => Action::GetFormData,
            "loadAll" => Action::LoadAll,
            "saveFormData" | "save" => Action::SaveFormData,
            "getTableData" => Action::GetTableData,
            "getHistoryData" => Action::GetHistoryData,
            "exportData" => Action::ExportData,
            "changePassword" => Action::ChangePassword,
            "deleteAccount" => Action::DeleteAccount,
            "markWelcomeAsSeen" => Action::MarkWelcomeAsSeen,
            "generateApiToken" => Action::GenerateApiToken,
            "getApiToken" => Action::GetApiToken,
            "deleteApiToken" => Action::DeleteApiToken,
            "setup" => Action::Setup,
            other => return Err(ApiError::not_found(format!("Unknown action: {}", other))),
        };
        Ok(action)
    }
}

/// Request fields after merging body and query string.
#[derive(Debug, Clone, Default)]
pub struct Payload(pub Map<String, Value>);

impl Payload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// First present key among aliases, e.g. `data` / `formData`.
    pub fn first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// String field, looked up at the top level and then inside `data`/`formData`.
    pub fn field(&self, key: &str) -> Option<String> {
        let nested = self.first(&["data", "formData"]).and_then(|d| d.get(key));
        let value = self.get(key).or(nested)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "on" | "yes"),
            _ => false,
        }
    }

    /// Integer from a number or numeric string; empty means absent.
    pub fn int(value: Option<&Value>, name: &str) -> Result<Option<i64>, ApiError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| ApiError::field_error(name, format!("{} must be an integer", name))),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ApiError::field_error(name, format!("{} must be an integer", name))),
            Some(_) => Err(ApiError::field_error(name, format!("{} must be an integer", name))),
        }
    }

    pub fn mapping(&self) -> Result<&str, ApiError> {
        self.str("mappingName")
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::field_error("mappingName", "mappingName is required"))
    }

    /// Filter object (`filter` or `where`), `{}` when absent.
    pub fn filter(&self) -> Value {
        self.first(&["filter", "where"]).cloned().unwrap_or_else(|| json!({}))
    }

    /// Save payload (`data` or `formData`).
    pub fn data(&self) -> Result<&Value, ApiError> {
        self.first(&["data", "formData"])
            .ok_or_else(|| ApiError::field_error("data", "data is required"))
    }

    /// Deserializes the nested `data`/`formData` object when present, else the top level.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let source = match self.first(&["data", "formData"]) {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(self.0.clone()),
        };
        serde_json::from_value(source).map_err(|e| ApiError::bad_request(format!("Invalid request: {}", e)))
    }
}

/// Everything an action handler gets to see.
pub struct ActionContext {
    pub state: AppState,
    pub payload: Payload,
    pub ip: String,
    /// Cookie session of this request, logged in or not.
    pub session: Session,
}

/// GET /api?action=...
pub async fn api_get(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    ClientIp(ip): ClientIp,
    session: Session,
    RawQuery(query): RawQuery,
) -> Response {
    let payload = parse_form(query.as_deref().unwrap_or(""));
    run(state, user, ip, session, Ok(payload)).await
}

/// POST /api with a JSON or urlencoded body
pub async fn api_post(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    ClientIp(ip): ClientIp,
    session: Session,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = parse_body(&headers, &body).map(|mut payload| {
        for (key, value) in parse_form(query.as_deref().unwrap_or("")).0 {
            payload.0.entry(key).or_insert(value);
        }
        payload
    });
    run(state, user, ip, session, payload).await
}

async fn run(
    state: AppState,
    user: Option<AuthUser>,
    ip: String,
    session: Session,
    payload: Result<Payload, ApiError>,
) -> Response {
    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };
    let action_name = payload.str("action").unwrap_or_default().to_string();
    let span = info_span!("action", action = %action_name, user_id = user.as_ref().map(|u| u.user_id));

    async move {
        let ctx = ActionContext {
            state,
            payload,
            ip,
            session,
        };
        match dispatch(&ctx, user.as_ref()).await {
            Ok(response) => response.into_response(),
            Err(e) => {
                debug!(code = e.error_code(), "action failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Routes one request to its action handler, enforcing authentication for
/// everything outside the public allow-list.
pub async fn dispatch(ctx: &ActionContext, user: Option<&AuthUser>) -> Result<ApiResponse, ApiError> {
    let name = ctx
        .payload
        .str("action")
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("No action specified"))?;
    let action = Action::from_str(name)?;

    if !action.is_public() && user.is_none() {
        if action == Action::CheckAuth {
            return Ok(not_logged_in());
        }
        return Err(ApiError::unauthorized("Not authenticated"));
    }
    let required = || user.ok_or_else(|| ApiError::unauthorized("Not authenticated"));

    match action {
        Action::Ping => public::ping(ctx).await,
        Action::Login => public::login(ctx).await,
        Action::Register => public::register(ctx).await,
        Action::Logout => protected::logout(ctx, required()?).await,
        Action::CheckAuth => protected::check_auth(ctx, required()?).await,
        Action::GetFormData => protected::get_form_data(ctx, required()?).await,
        Action::LoadAll => protected::load_all(ctx, required()?).await,
        Action::SaveFormData => protected::save_form_data(ctx, required()?).await,
        Action::GetTableData => protected::get_table_data(ctx, required()?).await,
        Action::GetHistoryData => protected::get_history_data(ctx, required()?).await,
        Action::ExportData => protected::export_data(ctx, required()?).await,
        Action::ChangePassword => protected::change_password(ctx, required()?).await,
        Action::DeleteAccount => protected::delete_account(ctx, required()?).await,
        Action::MarkWelcomeAsSeen => protected::mark_welcome_seen(ctx, required()?).await,
        Action::GenerateApiToken => protected::generate_api_token(ctx, required()?).await,
        Action::GetApiToken => protected::get_api_token(ctx, required()?).await,
        Action::DeleteApiToken => protected::delete_api_token(ctx, required()?).await,
        Action::Setup => elevated::setup(ctx, required()?).await,
    }
}

/// `{isLoggedIn: false}` with 401. A stale cookie carries no session data, so
/// the session layer expires it on the way out.
pub fn not_logged_in() -> ApiResponse {
    ApiResponse::bare(json!({ "isLoggedIn": false })).with_status(StatusCode::UNAUTHORIZED)
}

fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Payload, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let raw = std::str::from_utf8(body).map_err(|_| ApiError::bad_request("Body is not UTF-8"))?;
        return Ok(parse_form(raw));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::default());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(Payload(map)),
        Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(e) => Err(ApiError::invalid_json(format!("Invalid JSON: {}", e))),
    }
}

/// Urlencoded fields. `data[field]=x` nests one level; `filter`/`data`
/// values holding JSON text are decoded.
fn parse_form(raw: &str) -> Payload {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        if let Some((outer, inner)) = key.strip_suffix(']').and_then(|k| k.split_once('[')) {
            let entry = map
                .entry(outer.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = entry {
                nested.insert(inner.to_string(), Value::String(value.into_owned()));
            }
            continue;
        }

        let is_structured = matches!(key.as_ref(), "data" | "formData" | "filter" | "where");
        let value = match serde_json::from_str::<Value>(&value) {
            Ok(parsed @ Value::Object(_)) if is_structured => parsed,
            _ => Value::String(value.into_owned()),
        };
        map.insert(key.into_owned(), value);
    }
    Payload(map)
}
