mod config;
mod errors;
mod evaluation;
mod extraction;
mod llm_client;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::evaluation::cache::EvaluationCache;
use crate::evaluation::pipeline::EvaluationPipeline;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; a missing credential stops the service here.
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting evaluator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize generation client
    let generator = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        &config.gemini_api_base,
        config.generation_timeout,
    )
    .context("Failed to initialize the Gemini client")?;
    info!(
        "Gemini client initialized (model: {}, timeout: {:?})",
        config.gemini_model, config.generation_timeout
    );

    let cache = EvaluationCache::new(config.cache_capacity);
    info!(
        "Evaluation cache capacity: {}, prompt limit: {} chars per document",
        config.cache_capacity, config.prompt_char_limit
    );

    let pipeline = EvaluationPipeline::new(Arc::new(generator), cache, config.prompt_char_limit);

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
