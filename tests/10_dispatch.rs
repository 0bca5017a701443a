mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower_sessions::{session::Id, SessionStore};

use common::{app, cookie_header, lazy_state, post_json, send, session_for};

#[tokio::test]
async fn ping_is_public() -> Result<()> {
    let state = lazy_state();
    let res = post_json(&app(&state), json!({"action": "ping"}), None).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], json!(true));
    assert_eq!(res.body["message"], json!("pong"));
    Ok(())
}

#[tokio::test]
async fn ping_over_get_query() -> Result<()> {
    let state = lazy_state();
    let request = Request::builder().uri("/api?action=ping").body(Body::empty())?;
    let res = send(&app(&state), request).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], json!(true));
    Ok(())
}

#[tokio::test]
async fn missing_action_is_bad_request() -> Result<()> {
    let state = lazy_state();
    let res = post_json(&app(&state), json!({"mappingName": "protokollForm"}), None).await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], json!(false));
    assert_eq!(res.body["message"], json!("No action specified"));
    Ok(())
}

#[tokio::test]
async fn unknown_action_is_not_found() -> Result<()> {
    let state = lazy_state();
    let res = post_json(&app(&state), json!({"action": "dropEverything"}), None).await?;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["code"], json!("NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn protected_actions_require_identity() -> Result<()> {
    let state = lazy_state();
    let router = app(&state);

    for action in ["loadAll", "saveFormData", "setup", "deleteAccount", "generateApiToken"] {
        let res = post_json(&router, json!({"action": action, "mappingName": "protokollForm"}), None).await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "action {}", action);
        assert_eq!(res.body["success"], json!(false));
    }
    Ok(())
}

#[tokio::test]
async fn check_auth_without_session_reports_logged_out() -> Result<()> {
    let state = lazy_state();
    let res = post_json(&app(&state), json!({"action": "checkAuth"}), None).await?;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body, json!({"isLoggedIn": false}));
    Ok(())
}

#[tokio::test]
async fn stale_cookie_is_cleared_on_check_auth() -> Result<()> {
    let state = lazy_state();
    let cookie = cookie_header(&Id::default());
    let res = post_json(&app(&state), json!({"action": "checkAuth"}), Some(&cookie)).await?;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body, json!({"isLoggedIn": false}));
    let set_cookie = res.set_cookie.unwrap_or_default();
    assert!(set_cookie.starts_with("formbase_session="), "got {}", set_cookie);
    assert!(set_cookie.contains("Max-Age=0"), "got {}", set_cookie);
    Ok(())
}

#[tokio::test]
async fn check_auth_falls_back_to_session_when_database_is_down() -> Result<()> {
    let state = lazy_state();
    let cookie = cookie_header(&session_for(&state, 7).await?);
    let res = post_json(&app(&state), json!({"action": "checkAuth"}), Some(&cookie)).await?;

    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["isLoggedIn"], json!(true));
    assert_eq!(res.body["user"]["id"], json!(7));
    assert_eq!(res.body["user"]["username"], json!("user7"));
    assert_eq!(res.body["user"]["is_new"], json!(false));
    Ok(())
}

#[tokio::test]
async fn unknown_mapping_is_not_found() -> Result<()> {
    let state = lazy_state();
    let cookie = cookie_header(&session_for(&state, 7).await?);

    let res = post_json(
        &app(&state),
        json!({"action": "load", "mappingName": "nope", "filter": {}}),
        Some(&cookie),
    )
    .await?;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], json!("Mapping not found: nope"));
    Ok(())
}

#[tokio::test]
async fn save_without_mapping_name_is_rejected() -> Result<()> {
    let state = lazy_state();
    let cookie = cookie_header(&session_for(&state, 7).await?);

    let res = post_json(&app(&state), json!({"action": "save", "formData": {"notiz": "x"}}), Some(&cookie)).await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], json!("VALIDATION_ERROR"));
    assert!(res.body["field_errors"].get("mappingName").is_some());
    Ok(())
}

#[tokio::test]
async fn login_requires_both_fields() -> Result<()> {
    let state = lazy_state();
    let res = post_json(&app(&state), json!({"action": "login", "email": "alice"}), None).await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.set_cookie.is_none());
    Ok(())
}

#[tokio::test]
async fn register_rejects_mismatched_passwords_before_storage() -> Result<()> {
    let state = lazy_state();
    let res = post_json(
        &app(&state),
        json!({
            "action": "register",
            "formData": {
                "username": "alice",
                "email": "alice@example.com",
                "password": "secret1",
                "password_confirm": "secret2",
                "invitation_code": "ABC"
            }
        }),
        None,
    )
    .await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"].get("password_confirm").is_some());
    Ok(())
}

#[tokio::test]
async fn logout_destroys_session_and_clears_cookie() -> Result<()> {
    let state = lazy_state();
    let id = session_for(&state, 7).await?;
    let cookie = cookie_header(&id);
    let router = app(&state);

    let res = post_json(&router, json!({"action": "logout"}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(state.sessions.load(&id).await?.is_none());
    let set_cookie = res.set_cookie.unwrap_or_default();
    assert!(set_cookie.contains("Max-Age=0"), "got {}", set_cookie);

    let again = post_json(&router, json!({"action": "loadAll", "mappingName": "protokollForm"}), Some(&cookie)).await?;
    assert_eq!(again.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn urlencoded_bodies_are_accepted() -> Result<()> {
    let state = lazy_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("action=ping"))?;
    let res = send(&app(&state), request).await?;

    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_rejected() -> Result<()> {
    let state = lazy_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let res = send(&app(&state), request).await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], json!("INVALID_JSON"));
    Ok(())
}

#[tokio::test]
async fn setup_is_forbidden_when_disabled() -> Result<()> {
    let mut state = lazy_state();
    let mut config = (*state.config).clone();
    config.security.setup_enabled = false;
    state.config = std::sync::Arc::new(config);

    let cookie = cookie_header(&session_for(&state, 7).await?);
    let res = post_json(&app(&state), json!({"action": "setup"}), Some(&cookie)).await?;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}
