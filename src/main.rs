use formbase::app::{build_app, serve};
use formbase::config::AppConfig;
use formbase::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "formbase=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env();
    tracing::info!("Starting formbase in {:?} mode", config.environment);
    let (host, port) = (config.server.host.clone(), config.server.port);

    let state = AppState::init(config).await?;
    tracing::info!(mappings = state.mappings.len(), "application file loaded");

    let app = build_app(state);
    serve(app, &host, port).await
}
