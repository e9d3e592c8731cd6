//! neofinance HTTP Server
//!
//! Axum-based server exposing the advice pipeline, the Plaid token and
//! transaction endpoints, and spending insights over the local store.

mod config;
mod error;
mod extract;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finance_core::{
    provider::GenerationOptions, AdviceCache, AdvicePipeline, IngestionService, JsonFileStore,
    LlmProvider, MemoryCache, PipelineConfig, TransactionStore,
};
use finance_runtime::{PerplexityProvider, PlaidClient, RedisCache, RedisConfig};

use crate::config::ServerConfig;
use crate::handlers::{
    advice_handler, exchange_token_handler, health_check, link_token_handler, summary_handler,
    transactions_handler, trends_handler,
};
use crate::state::AppState;

/// Build the router with every route and middleware layer
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Advice
        .route("/advice", post(advice_handler))
        // Plaid
        .route("/plaid/link-token", post(link_token_handler))
        .route("/plaid/exchange-token", post(exchange_token_handler))
        .route("/plaid/transactions", post(transactions_handler))
        // Insights
        .route("/insights/summary", get(summary_handler))
        .route("/insights/trends", get(trends_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider = Arc::new(PerplexityProvider::from_env()?);
    if provider.is_configured() {
        tracing::info!("✓ Perplexity configured (model: {})", config.model);
    } else {
        tracing::warn!("⚠ Perplexity not configured - /advice will fail");
        tracing::warn!("  Set PERPLEXITY_API_KEY in .env");
    }

    // Initialize advice cache
    let cache: Arc<dyn AdviceCache> = match RedisConfig::from_env() {
        Some(redis_config) => match RedisCache::connect(&redis_config).await {
            Ok(redis) => {
                tracing::info!("✓ Connected to Redis");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("⚠ Redis unavailable ({}) - using in-memory cache", e);
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            tracing::info!("REDIS_URL not set - using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    // Transaction store
    let store: Arc<dyn TransactionStore> =
        Arc::new(JsonFileStore::new(config.transactions_path.clone()).with_mode(config.write_mode));
    tracing::info!("Transactions file: {}", config.transactions_path.display());

    // Initialize Plaid
    let ingestion = match PlaidClient::from_env() {
        Ok(plaid) => {
            tracing::info!("✓ Plaid configured");
            Some(Arc::new(IngestionService::new(Arc::new(plaid), store.clone())))
        }
        Err(e) => {
            tracing::warn!("⚠ Plaid not configured - /plaid routes disabled ({})", e);
            tracing::warn!("  Set PLAID_CLIENT_ID and PLAID_SECRET in .env");
            None
        }
    };

    let pipeline_config = PipelineConfig {
        cache_mode: config.cache_mode,
        cache_ttl: config.cache_ttl,
        generation: GenerationOptions {
            model: config.model.clone(),
            ..GenerationOptions::default()
        },
    };
    tracing::info!(
        mode = ?pipeline_config.cache_mode,
        ttl = ?pipeline_config.cache_ttl,
        "Advice cache: {}",
        cache.name()
    );
    let pipeline = AdvicePipeline::new(provider, cache, store.clone(), pipeline_config);

    // Build application state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        ingestion,
        store,
        config: Arc::new(config.clone()),
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 neofinance server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /advice               - Budgeting advice");
    tracing::info!("  POST /plaid/link-token     - Create link token");
    tracing::info!("  POST /plaid/exchange-token - Exchange public token");
    tracing::info!("  POST /plaid/transactions   - Fetch and store transactions");
    tracing::info!("  GET  /insights/summary     - Category totals");
    tracing::info!("  GET  /insights/trends      - Month-over-month changes");
    tracing::info!("");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
