use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Success envelope: `{success: true, ...fields}`.
///
/// Actions answer with flat objects (`message`, `data`, `user`, ...) rather
/// than a nested `data` wrapper, so fields are merged into the envelope.
#[derive(Debug)]
pub struct ApiResponse {
    pub fields: Map<String, Value>,
    pub status_code: Option<StatusCode>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            fields: Map::new(),
            status_code: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::success().with("message", message.into())
    }

    /// `{success: true, data: <data>}`
    pub fn data<T: Serialize>(data: T) -> Self {
        Self::success().with("data", data)
    }

    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::error!(key, error = %e, "failed to serialize response field");
            Value::Null
        });
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Envelope without the `success` flag, for actions whose wire shape
    /// predates it (`checkAuth`).
    pub fn bare(fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self {
            fields,
            status_code: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if !self.fields.contains_key("isLoggedIn") {
            body.insert("success".to_string(), json!(true));
        }
        body.extend(self.fields.clone());
        Value::Object(body)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);
        (status, Json(self.to_json())).into_response()
    }
}

pub type ApiResult = Result<ApiResponse, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_merged_into_envelope() {
        let response = ApiResponse::message("Saved").with("affectedRows", 1);
        assert_eq!(
            response.to_json(),
            json!({"success": true, "message": "Saved", "affectedRows": 1})
        );
    }

    #[test]
    fn check_auth_shape_has_no_success_flag() {
        let response = ApiResponse::bare(json!({"isLoggedIn": true, "user": {"id": 1}}));
        assert_eq!(response.to_json(), json!({"isLoggedIn": true, "user": {"id": 1}}));
    }

    #[test]
    fn explicit_status_is_kept() {
        let response = ApiResponse::bare(json!({"isLoggedIn": false}))
            .with_status(StatusCode::UNAUTHORIZED)
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
