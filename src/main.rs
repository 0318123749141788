mod agent;
mod config;
mod errors;
mod models;
mod quotes;
mod routes;
mod service;
mod session;
mod suggestions;

use std::sync::Arc;

use tracing::info;

use crate::agent::animation::HttpAnimationFetcher;
use crate::agent::GeminiAgentService;
use crate::config::AppConfig;
use crate::service::chat_service::ChatService;
use crate::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_chat=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let agent = GeminiAgentService::new(&config.google_api_key, &config.gemini_model)?;
    info!("Using Gemini model {}", config.gemini_model);

    let chat_service = ChatService::new(
        SessionStore::with_idle_timeout(config.session_idle_timeout),
        Arc::new(agent),
        Arc::new(HttpAnimationFetcher::new()),
        config.lottie_url.clone(),
    );

    let app = routes::router(chat_service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
