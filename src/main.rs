//! a2a-chat - streaming conversation client for A2A agents
//!
//! Sends user turns to an agent over `tasks/sendSubscribe`, folds the
//! streamed updates into a conversation, and serves it over HTTP and SSE.

mod a2a;
mod api;
mod config;
mod conversation;
mod runtime;

use a2a::{A2aHttpClient, LoggingTransport};
use api::{create_router, AppState};
use config::AppConfig;
use runtime::ConversationRuntime;
use std::net::SocketAddr;
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
                .unwrap_or_else(|_| "a2a_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env();
    if config.agents.is_empty() {
        tracing::warn!("No agents configured. Set A2A_AGENTS=name=url,...");
    } else {
        tracing::info!(
            agents = ?config.agents.iter().map(|a| &a.name).collect::<Vec<_>>(),
            "Agents configured"
        );
    }

    // Transport and runtime
    let client = A2aHttpClient::new(config.connect_timeout)?;
    let transport = LoggingTransport::new(Arc::new(client));
    let runtime = ConversationRuntime::start(transport);

    if let Some(target) = config.startup_agent() {
        runtime.select_target(target.clone()).await?;
    }

    // Create application state
    let state = AppState::new(runtime, config.agents.clone());

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
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("a2a-chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
