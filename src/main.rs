use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gymbook::config::AppConfig;
use gymbook::db;
use gymbook::handlers;
use gymbook::services::notify::expo::ExpoPushSink;
use gymbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" || config.token_secret == "changeme" {
        tracing::warn!("ADMIN_TOKEN or TOKEN_SECRET left at its default value");
    }

    let conn = db::init_db(&config.database_url)?;
    let notifier = ExpoPushSink::new(config.push_api_url.clone());
    let state = Arc::new(AppState::new(conn, config.clone(), Box::new(notifier)));

    tracing::info!(
        hours = ?state.hours,
        utc_offset = %state.config.timezone(),
        "gym schedule loaded"
    );

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
