use std::any::Any;
use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::session_layer;
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::handlers;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);
    let sessions = session_layer(&state.config, state.sessions.clone());

    Router::new()
        .route("/api", get(handlers::api_get).post(handlers::api_post))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            let method = req.method().clone();
                            let uri = req.uri().clone();
                            tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                let status = res.status();
                                span.record("status", tracing::field::display(status));
                                if status.is_server_error() {
                                    tracing::error!(%status, ?latency, "response");
                                } else {
                                    tracing::info!(%status, ?latency, "response");
                                }
                            },
                        ),
                )
                .layer(cors)
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(sessions),
        )
}

/// Credentialed CORS for the configured origins; the session cookie has to
/// travel with cross-origin requests from the frontend.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    ApiError::internal_server_error("An unexpected error occurred").into_response()
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
