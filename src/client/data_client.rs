use chrono::Duration;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::cache::ResponseCache;
use crate::auth::DefaultClock;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Client for the `/api` action endpoint.
///
/// Browser-style: the session cookie is kept in the client's cookie store, so
/// `login` followed by any other call just works. Machine clients can use a
/// bearer token instead.
pub struct DataClient {
    http: reqwest::Client,
    endpoint: url::Url,
    bearer: Option<String>,
    cache: ResponseCache,
}

impl DataClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = url::Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let endpoint = base.join("api").map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            bearer: None,
            cache: ResponseCache::new(Arc::new(DefaultClock), Duration::minutes(5)),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Invokes `action` with the given fields merged into the envelope.
    pub async fn call(&self, action: &str, payload: Value) -> Result<Value, ClientError> {
        let (status, body) = self.send(action, payload).await?;
        if status.is_success() && body.get("success").and_then(Value::as_bool) != Some(false) {
            return Ok(body);
        }
        Err(api_error(status, &body))
    }

    pub async fn ping(&self) -> Result<Value, ClientError> {
        self.call("ping", json!({})).await
    }

    pub async fn login(&self, identifier: &str, password: &str, remember: bool) -> Result<Value, ClientError> {
        let body = self
            .call(
                "login",
                json!({ "email": identifier, "password": password, "remember": remember }),
            )
            .await?;
        self.reset_cache().await;
        Ok(body.get("user").cloned().unwrap_or(Value::Null))
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.call("logout", json!({})).await?;
        self.reset_cache().await;
        Ok(())
    }

    /// The logged-in user, or `None` when the session is missing or expired.
    pub async fn check_auth(&self) -> Result<Option<Value>, ClientError> {
        let (status, body) = self.send("checkAuth", json!({})).await?;
        match body.get("isLoggedIn").and_then(Value::as_bool) {
            Some(true) => Ok(body.get("user").cloned()),
            Some(false) => Ok(None),
            None => Err(api_error(status, &body)),
        }
    }

    /// First row matching `filter`, cached per mapping and filter.
    pub async fn load(&self, mapping: &str, filter: Value, force_refresh: bool) -> Result<Value, ClientError> {
        let key = format!("{}:{}", mapping, filter);
        self.cache
            .get_or_load(&key, force_refresh, || async {
                let body = self
                    .call("getFormData", json!({ "mappingName": mapping, "filter": filter }))
                    .await?;
                Ok::<_, ClientError>(body.get("data").cloned().unwrap_or(Value::Null))
            })
            .await
    }

    pub async fn load_all(&self, mapping: &str, filter: Value, force_refresh: bool) -> Result<Vec<Value>, ClientError> {
        let key = format!("{}:all:{}", mapping, filter);
        let data = self
            .cache
            .get_or_load(&key, force_refresh, || async {
                let body = self
                    .call("loadAll", json!({ "mappingName": mapping, "filter": filter }))
                    .await?;
                Ok::<_, ClientError>(body.get("data").cloned().unwrap_or(Value::Null))
            })
            .await?;
        match data {
            Value::Array(rows) => Ok(rows),
            other => Err(ClientError::UnexpectedResponse(format!("expected an array, got {}", other))),
        }
    }

    /// Saves one row and drops every cached read of the mapping.
    pub async fn save(&self, mapping: &str, data: Value) -> Result<Value, ClientError> {
        let body = self
            .call("saveFormData", json!({ "mappingName": mapping, "formData": data }))
            .await?;
        self.cache.invalidate(mapping).await;
        Ok(body)
    }

    /// Cached reads belong to one identity; drop them when it changes.
    async fn reset_cache(&self) {
        let stats = self.cache.stats().await;
        debug!(
            keys = stats.keys,
            hits = stats.hits,
            misses = stats.misses,
            stale = stats.stale_served,
            "dropping cached responses"
        );
        self.cache.clear().await;
    }

    async fn send(&self, action: &str, payload: Value) -> Result<(StatusCode, Value), ClientError> {
        let mut envelope = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::UnexpectedResponse(format!(
                    "payload must be an object, got {}",
                    other
                )))
            }
        };
        envelope.insert("action".to_string(), json!(action));

        let mut request = self.http.post(self.endpoint.clone()).json(&envelope);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        debug!(action, status = status.as_u16(), "api call");
        Ok((status, body))
    }
}

fn api_error(status: StatusCode, body: &Value) -> ClientError {
    ClientError::Api {
        status: status.as_u16(),
        code: body.get("code").and_then(Value::as_str).map(str::to_string),
        message: body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Request failed")
            .to_string(),
    }
}
