mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;
use tower_sessions::{session::Id, SessionStore};

use common::{app, db_state, post_json, session_for};
use formbase::database::models::{Invitation, User};
use formbase::services::{AuthError, AuthService, RegisterRequest};
use formbase::state::AppState;

fn request(name: &str, code: &str) -> RegisterRequest {
    RegisterRequest {
        username: name.to_string(),
        email: format!("{}@example.com", name),
        password: "secret123".to_string(),
        password_confirm: "secret123".to_string(),
        invitation_code: code.to_string(),
    }
}

async fn register(state: &AppState, name: &str) -> Result<i64> {
    let code = format!("CODE-{}", name);
    Invitation::create(state.db.pool(), &code).await?;
    Ok(AuthService::new(state).register(&request(name, &code)).await?.id)
}

fn login(identifier: &str, password: &str) -> serde_json::Value {
    json!({"action": "login", "email": identifier, "password": password})
}

#[tokio::test]
async fn login_sets_cookie_and_check_auth_sees_it() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    register(&state, "alice").await?;
    let router = app(&state);

    let res = post_json(&router, login("alice@example.com", "secret123"), None).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["message"], json!("Login successful!"));
    assert_eq!(res.body["user"]["username"], json!("alice"));
    assert_eq!(res.body["user"]["is_new"], json!(true));
    let cookie = res.session_cookie().ok_or_else(|| anyhow::anyhow!("no session cookie"))?;

    let check = post_json(&router, json!({"action": "checkAuth"}), Some(&cookie)).await?;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.body["isLoggedIn"], json!(true));
    assert_eq!(check.body["user"]["email"], json!("alice@example.com"));

    post_json(&router, json!({"action": "markWelcomeAsSeen"}), Some(&cookie)).await?;
    let check = post_json(&router, json!({"action": "checkAuth"}), Some(&cookie)).await?;
    assert_eq!(check.body["user"]["is_new"], json!(false));
    Ok(())
}

#[tokio::test]
async fn repeated_failures_lock_out_until_window_passes() -> Result<()> {
    let Some((state, clock)) = db_state().await? else { return Ok(()) };
    register(&state, "alice").await?;
    let router = app(&state);

    for _ in 0..5 {
        let res = post_json(&router, login("alice", "wrong"), None).await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let locked = post_json(&router, login("alice", "secret123"), None).await?;
    assert_eq!(locked.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(locked.set_cookie.is_none());
    let (attempts,): (i64,) = sqlx::query_as("SELECT count(*) FROM login_attempts")
        .fetch_one(state.db.pool())
        .await?;
    assert_eq!(attempts, 5);

    clock.advance(Duration::minutes(16));
    let res = post_json(&router, login("alice", "secret123"), None).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn login_replaces_existing_session_id() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    let alice = register(&state, "alice").await?;
    let router = app(&state);

    let before = session_for(&state, alice).await?;
    let res = post_json(
        &router,
        login("alice", "secret123"),
        Some(&common::cookie_header(&before)),
    )
    .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let cookie = res.session_cookie().ok_or_else(|| anyhow::anyhow!("no session cookie"))?;
    let after: Id = cookie.trim_start_matches("formbase_session=").parse()?;
    assert_ne!(after, before);
    assert!(state.sessions.load(&before).await?.is_none());
    assert!(state.sessions.load(&after).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn used_invitation_is_rejected() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    Invitation::create(state.db.pool(), "ONCE").await?;
    let auth = AuthService::new(&state);

    auth.register(&request("alice", "ONCE")).await?;
    let second = auth.register(&request("bob", "ONCE")).await;
    assert!(matches!(second, Err(AuthError::InvalidInvitation)));

    let unknown = auth.register(&request("carol", "NOPE")).await;
    assert!(matches!(unknown, Err(AuthError::InvalidInvitation)));
    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_rejected() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    register(&state, "alice").await?;
    Invitation::create(state.db.pool(), "SECOND").await?;

    let again = AuthService::new(&state).register(&request("alice", "SECOND")).await;
    assert!(matches!(again, Err(AuthError::DuplicateUser)));

    let invitation = Invitation::find(state.db.pool(), "SECOND").await?;
    assert!(invitation.is_some_and(|i| !i.is_used()));
    Ok(())
}

#[tokio::test]
async fn failed_claim_rolls_back_registration() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    let pool = state.db.pool();
    Invitation::create(pool, "BROKEN").await?;
    sqlx::query(
        "CREATE FUNCTION refuse_claim() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'claim refused'; END; $$ LANGUAGE plpgsql",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TRIGGER refuse_claim BEFORE UPDATE ON invitation_codes \
         FOR EACH ROW EXECUTE FUNCTION refuse_claim()",
    )
    .execute(pool)
    .await?;

    let result = AuthService::new(&state).register(&request("alice", "BROKEN")).await;
    assert!(matches!(result, Err(AuthError::RegistrationFailed)));

    assert!(User::find_by_login(pool, "alice").await?.is_none());
    let (profiles,): (i64,) = sqlx::query_as("SELECT count(*) FROM user_profiles").fetch_one(pool).await?;
    assert_eq!(profiles, 0);
    Ok(())
}

#[tokio::test]
async fn change_password_replaces_credentials() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    let alice = register(&state, "alice").await?;
    let auth = AuthService::new(&state);

    let weak = auth.change_password(alice, "abc", None).await;
    assert!(matches!(weak, Err(AuthError::WeakPassword(6))));

    auth.change_password(alice, "another456", Some("another456")).await?;
    let router = app(&state);
    let old = post_json(&router, login("alice", "secret123"), None).await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = post_json(&router, login("alice", "another456"), None).await?;
    assert_eq!(new.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn delete_account_removes_rows_and_session() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    register(&state, "alice").await?;
    let router = app(&state);

    let res = post_json(&router, login("alice", "secret123"), None).await?;
    let cookie = res.session_cookie().ok_or_else(|| anyhow::anyhow!("no session cookie"))?;
    post_json(
        &router,
        json!({"action": "save", "mappingName": "protokollForm", "formData": {"datum": "2024-05-01"}}),
        Some(&cookie),
    )
    .await?;

    let deleted = post_json(&router, json!({"action": "deleteAccount"}), Some(&cookie)).await?;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.body);
    assert!(deleted.session_cookie().is_none());

    let pool = state.db.pool();
    assert!(User::find_by_login(pool, "alice").await?.is_none());
    let (rows,): (i64,) = sqlx::query_as("SELECT count(*) FROM protokolle").fetch_one(pool).await?;
    assert_eq!(rows, 0);

    let check = post_json(&router, json!({"action": "checkAuth"}), Some(&cookie)).await?;
    assert_eq!(check.body, json!({"isLoggedIn": false}));
    Ok(())
}

#[tokio::test]
async fn api_token_authenticates_without_cookie() -> Result<()> {
    let Some((state, _clock)) = db_state().await? else { return Ok(()) };
    register(&state, "alice").await?;
    let router = app(&state);

    let res = post_json(&router, login("alice", "secret123"), None).await?;
    let cookie = res.session_cookie().ok_or_else(|| anyhow::anyhow!("no session cookie"))?;
    let issued = post_json(&router, json!({"action": "generateApiToken"}), Some(&cookie)).await?;
    let token = issued.body["token"].as_str().unwrap_or_default().to_string();
    assert_eq!(token.len(), 48);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::AUTHORIZATION, format!("Bearer {}", token))
        .body(axum::body::Body::from(json!({"action": "loadAll", "mappingName": "protokollForm"}).to_string()))?;
    let res = common::send(&router, request).await?;
    assert_eq!(res.status, StatusCode::OK);

    post_json(&router, json!({"action": "deleteApiToken"}), Some(&cookie)).await?;
    let fetched = post_json(&router, json!({"action": "getApiToken"}), Some(&cookie)).await?;
    assert_eq!(fetched.body["token"], json!(null));
    Ok(())
}
