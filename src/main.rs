//! Lynx AI - single-page chat backed by Google Gemini
//!
//! Serves the chat page and relays each user message to the Gemini
//! `generateContent` endpoint, one request at a time per session.

mod api;
mod config;
mod conversation;
mod llm;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::ServerConfig;
use llm::{GeminiService, LlmConfig, LoggingService};
use runtime::ServiceCompletionClient;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lynx_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let server_config = ServerConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid server configuration");
    })?;

    let llm_config = LlmConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid LLM configuration");
    })?;

    // Provider stack: Gemini, wrapped for logging, adapted for the runtime
    let gemini = GeminiService::new(&llm_config)?;
    let service = LoggingService::new(Arc::new(gemini));
    let client = ServiceCompletionClient::new(Arc::new(service));

    tracing::info!(model = %llm_config.model, "Gemini client initialized");

    // Create application state
    let state = AppState::new(Arc::new(client), server_config.session_idle_timeout);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = server_config.addr();
    tracing::info!("Lynx AI server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
