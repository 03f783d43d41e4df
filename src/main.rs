// =============================================================================
// Vault Execution Engine -- Main Entry Point
// =============================================================================
//
// Thin binary: load configuration, wire up the shared subsystems, spawn the
// scheduler's background loops, and serve the HTTP API until `ctrl_c`.
// Everything else lives in the library crate (`src/lib.rs`).
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vault_execution_engine::api;
use vault_execution_engine::app_state::AppState;
use vault_execution_engine::chain::ChainReader;
use vault_execution_engine::config::AppConfig;
use vault_execution_engine::market_data::{MarketDataFeed, PythClient};
use vault_execution_engine::persistence::PersistenceGateway;
use vault_execution_engine::scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("vault execution engine starting up");

    let config = Arc::new(AppConfig::load()?);
    info!(
        trading_enabled = config.trading_enabled(),
        assets = ?config.pyth_symbols,
        "configuration ready"
    );

    let persistence = Arc::new(PersistenceGateway::connect(&config.database_url).await?);

    let pyth = PythClient::new(
        config.pyth_benchmarks_url.clone(),
        config.pyth_price_ids.clone(),
        config.pyth_oracle_address,
        &config.arbitrum_rpc_url,
    )?;
    let market_data = Arc::new(MarketDataFeed::new(pyth, persistence.clone(), 2000));
    if !config.pyth_symbols.is_empty() {
        market_data.clone().start_polling(30, config.pyth_symbols.clone());
        info!(count = config.pyth_symbols.len(), "market data polling started");
    } else {
        warn!("no PYTH_SYMBOLS configured, market data polling is idle");
    }

    let chain = Arc::new(ChainReader::new(config.as_ref())?);

    let state = Arc::new(AppState::new(config.clone(), market_data, chain, persistence));

    scheduler::spawn_all(state.clone());
    info!("scheduler loops spawned");

    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    info!(addr = %config.api_bind_addr, "API server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping gracefully");
    server.abort();

    info!("vault execution engine shut down complete");
    Ok(())
}
