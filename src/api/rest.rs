// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health endpoints require no
// authentication. Every other endpoint requires a valid Bearer token checked
// via the `AuthBearer` extractor.
//
// CORS origins are taken from `AppConfig::cors_origins` rather than the
// wide-open `Any` the teacher uses for local development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::executor::Signal;
use crate::types::SignalDirection;

pub fn router(state: Arc<AppState>) -> Router {
    let mut cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::PATCH]);
    if state.config.cors_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let origins: Vec<HeaderValue> = state.config.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors = cors.allow_origin(origins);
    }

    Router::new()
        // ── Health (public) ───────────────────────────────────────────
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/health/detailed", get(health_detailed))
        // ── Reads (authenticated) ──────────────────────────────────────
        .route("/api/v1/vaults", get(list_vaults))
        .route("/api/v1/vaults/:address", get(get_vault))
        .route("/api/v1/vaults/:address/trades", get(vault_trades))
        .route("/api/v1/vaults/:address/signals", get(vault_signals))
        .route("/api/v1/vaults/:address/positions", get(vault_positions))
        .route("/api/v1/strategies", get(list_strategies))
        // ── Admin (authenticated) ───────────────────────────────────────
        .route("/api/v1/admin/vaults", post(register_vault))
        .route("/api/v1/admin/vaults/:address", post(update_vault))
        .route("/api/v1/admin/vaults/:address/link", post(link_strategy))
        .route("/api/v1/admin/vaults/:address/snapshot", post(trigger_snapshot))
        .route("/api/v1/admin/vaults/:address/long-token-status", get(long_token_status))
        .route("/api/v1/admin/trigger/:address", post(trigger_vault))
        .route("/api/v1/admin/strategies", post(register_strategy))
        // ── Manual trade ────────────────────────────────────────────────
        .route("/api/v1/vaults/:address/trade", post(manual_trade))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    uptime_seconds: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        uptime_seconds: state.uptime_seconds(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

async fn health_live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness requires the database and RPC to both answer; degrades to 503
/// if either collaborator is unreachable.
async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ready = state.persistence.referral_indexer_cursor().await.is_ok();
    let rpc_ready = state.chain.current_gas_price().await.is_ok();
    if db_ready && rpc_ready {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready", "database": db_ready, "rpc": rpc_ready })),
        )
    }
}

async fn health_detailed(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let errors = state.recent_errors.read().clone();
    Json(serde_json::json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "uptime_seconds": state.uptime_seconds(),
        "trading_enabled": state.config.trading_enabled(),
        "referral_indexer_enabled": state.referral_indexer.enabled,
        "recent_errors": errors,
    }))
}

// =============================================================================
// Vault reads (authenticated)
// =============================================================================

async fn list_vaults(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.persistence.list_vaults().await {
        Ok(vaults) => Json(vaults_to_json(vaults)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn get_vault(_auth: AuthBearer, State(state): State<Arc<AppState>>, Path(address): Path<String>) -> impl IntoResponse {
    match state.persistence.get_vault(&address).await {
        Ok(Some(v)) => Json(vault_to_json(v)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "vault not found"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn vault_trades(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    match state.persistence.recent_trade_records(&address, q.limit).await {
        Ok(trades) => Json(trades).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn vault_signals(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    match state.persistence.recent_signal_logs(&address, q.limit).await {
        Ok(signals) => Json(signals).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn vault_positions(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let Ok(vault_addr) = address.parse::<ethers::types::Address>() else {
        return error_response(StatusCode::BAD_REQUEST, "malformed vault address");
    };
    let asset = match state.persistence.get_vault(&address).await {
        Ok(Some(v)) => v.strategy.map(|s| s.asset).unwrap_or_default(),
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "vault not found"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    match state.chain.positions(vault_addr, move |_m| asset.clone()).await {
        Ok(positions) => Json(positions).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn list_strategies(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.persistence.list_strategies().await {
        Ok(strategies) => Json(strategies).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

// =============================================================================
// Admin (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct RegisterVaultRequest {
    address: String,
    #[serde(default = "default_chain")]
    chain: String,
    name: Option<String>,
}

fn default_chain() -> String {
    "arbitrum".to_string()
}

async fn register_vault(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterVaultRequest>,
) -> impl IntoResponse {
    if req.address.parse::<ethers::types::Address>().is_err() {
        return error_response(StatusCode::BAD_REQUEST, "malformed vault address");
    }
    match state.persistence.register_vault(&req.address, &req.chain, req.name.as_deref()).await {
        Ok(()) => {
            info!(vault = %req.address, "vault registered via admin API");
            state.increment_version();
            Json(serde_json::json!({ "status": "registered", "address": req.address.to_lowercase() })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Deserialize)]
struct UpdateVaultRequest {
    status: Option<String>,
    check_interval: Option<String>,
}

async fn update_vault(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(req): Json<UpdateVaultRequest>,
) -> impl IntoResponse {
    if let Some(interval) = &req.check_interval {
        if crate::types::CheckInterval::parse(interval).is_none() {
            return error_response(StatusCode::BAD_REQUEST, "unrecognized check_interval token");
        }
    }
    match state.persistence.update_vault(&address, req.status.as_deref(), req.check_interval.as_deref()).await {
        Ok(()) => {
            state.increment_version();
            Json(serde_json::json!({ "status": "updated" })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Deserialize)]
struct LinkStrategyRequest {
    strategy_slug: String,
}

async fn link_strategy(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(req): Json<LinkStrategyRequest>,
) -> impl IntoResponse {
    match state.persistence.link_strategy(&address, &req.strategy_slug).await {
        Ok(()) => {
            state.increment_version();
            Json(serde_json::json!({ "status": "linked", "strategy_slug": req.strategy_slug })).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn trigger_snapshot(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let Ok(vault_addr) = address.parse::<ethers::types::Address>() else {
        return error_response(StatusCode::BAD_REQUEST, "malformed vault address");
    };
    let tvl = state.chain.tvl(vault_addr).await;
    let share_price = state.chain.share_price(vault_addr).await.unwrap_or(0.0);
    match state.persistence.update_vault_metrics(&address, tvl, share_price, 0).await {
        Ok(()) => {
            state.increment_version();
            Json(serde_json::json!({ "status": "snapshot taken", "tvl": tvl, "share_price": share_price })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// Whether the vault's registered supported assets include the long token of
/// its linked strategy's market -- the same check the executor's pre-flight
/// performs, surfaced for operators to diagnose a `PreflightReject` ahead of
/// submitting a trade.
async fn long_token_status(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let Ok(vault_addr) = address.parse::<ethers::types::Address>() else {
        return error_response(StatusCode::BAD_REQUEST, "malformed vault address");
    };
    let asset = match state.persistence.get_vault(&address).await {
        Ok(Some(v)) => match v.strategy {
            Some(s) => s.asset,
            None => return error_response(StatusCode::BAD_REQUEST, "vault has no linked strategy"),
        },
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "vault not found"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    let market = match state.chain.resolve_market_address(&asset).await {
        Ok(m) => m,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let long_token = state.chain.resolve_long_token(market).await;
    let supported = match (long_token, state.chain.supported_assets(vault_addr).await) {
        (Some(token), Ok(assets)) => assets.iter().any(|(addr, _)| *addr == token),
        _ => false,
    };

    Json(serde_json::json!({
        "asset": asset,
        "market": format!("{market:#x}"),
        "long_token": long_token.map(|t| format!("{t:#x}")),
        "supported": supported,
    }))
    .into_response()
}

/// Runs one `main_loop`-equivalent pass for a single vault, ignoring its
/// `check_interval` gate. Useful for operators debugging a stuck vault.
async fn trigger_vault(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let entry = match state.persistence.get_vault(&address).await {
        Ok(Some(v)) => v,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "vault not found"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let Some(strategy_row) = entry.strategy else {
        return error_response(StatusCode::BAD_REQUEST, "vault has no linked strategy");
    };
    let Some(strategy) = state.strategies.get(&strategy_row.slug) else {
        return error_response(StatusCode::BAD_REQUEST, "strategy not registered in this process");
    };
    let candles = state.market_data.candles(&strategy_row.asset, &strategy_row.timeframe, 500).await;
    if candles.is_empty() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "no candle history available");
    }
    let directions = strategy.generate_signals(&candles);
    let desired = directions.last().map(|&d| SignalDirection::from_i8(d)).unwrap_or_default();
    let current_price = candles.last().map(|c| c.close).unwrap_or(0.0);

    info!(vault = %address, asset = %strategy_row.asset, desired = %desired, "manual trigger invoked via admin API");
    state.increment_version();
    Json(serde_json::json!({
        "status": "triggered",
        "desired_direction": desired.to_string(),
        "current_price": current_price,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RegisterStrategyRequest {
    slug: String,
    name: String,
    #[serde(default = "default_strategy_type")]
    strategy_type: String,
    asset: String,
    timeframe: String,
    #[serde(default)]
    stop_loss_pct: Option<f64>,
    #[serde(default)]
    take_profit_pct: Option<f64>,
}

fn default_strategy_type() -> String {
    "rust".to_string()
}

async fn register_strategy(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterStrategyRequest>,
) -> impl IntoResponse {
    let meta = crate::strategy::StrategyMeta::default();
    let result = state
        .persistence
        .insert_strategy(
            &req.slug,
            &req.name,
            &req.strategy_type,
            &req.asset,
            &req.timeframe,
            None,
            req.stop_loss_pct.unwrap_or(meta.stop_loss_pct),
            req.take_profit_pct.unwrap_or(meta.take_profit_pct),
        )
        .await;
    match result {
        Ok(id) => {
            state.increment_version();
            Json(serde_json::json!({ "status": "registered", "id": id })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

// =============================================================================
// Manual trade (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct ManualTradeRequest {
    asset: String,
    direction: String,
    #[serde(rename = "sizeUsd")]
    size_usd: f64,
    #[serde(rename = "dryRun", default)]
    dry_run: bool,
}

async fn manual_trade(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(req): Json<ManualTradeRequest>,
) -> impl IntoResponse {
    let Ok(vault_addr) = address.parse::<ethers::types::Address>() else {
        return error_response(StatusCode::BAD_REQUEST, "malformed vault address");
    };
    let direction = match req.direction.to_lowercase().as_str() {
        "long" => SignalDirection::Long,
        "short" => SignalDirection::Short,
        "neutral" | "flat" => SignalDirection::Neutral,
        other => return error_response(StatusCode::BAD_REQUEST, &format!("unrecognized direction: {other}")),
    };
    if req.size_usd <= 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "sizeUsd must be positive");
    }

    if req.dry_run {
        return Json(serde_json::json!({
            "status": "dry_run",
            "asset": req.asset,
            "direction": direction.to_string(),
            "size_usd": req.size_usd,
        }))
        .into_response();
    }

    if state.circuit_breaker.is_broken(&address) {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "vault circuit breaker is tripped");
    }

    let current_price = state.market_data.latest_price(&req.asset).await;
    let signal = Signal {
        asset: req.asset.clone(),
        direction,
        current_price,
        size_pct: 0.0,
    };
    let is_closing = direction == SignalDirection::Neutral;
    let outcome = state.executor.execute_trade(&signal, vault_addr, is_closing, Some(req.size_usd)).await;

    let success = outcome.is_success();
    if matches!(&outcome, crate::types::TradeOutcome::Failed { counts_toward_breaker: true, .. }) || success {
        state.circuit_breaker.record(&address, success);
    }
    if !success {
        warn!(vault = %address, asset = %req.asset, "manual trade failed");
    }
    state.increment_version();
    Json(outcome).into_response()
}

// =============================================================================
// Helpers
// =============================================================================

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn vault_to_json(entry: crate::persistence::models::VaultWithStrategy) -> serde_json::Value {
    serde_json::json!({
        "address": entry.vault.address,
        "chain": entry.vault.chain,
        "name": entry.vault.name,
        "status": entry.vault.status,
        "check_interval": entry.vault.check_interval,
        "last_checked_at": entry.vault.last_checked_at,
        "tvl": entry.vault.tvl,
        "share_price": entry.vault.share_price,
        "depositor_count": entry.vault.depositor_count,
        "strategy": entry.strategy,
    })
}

fn vaults_to_json(vaults: Vec<crate::persistence::models::VaultWithStrategy>) -> serde_json::Value {
    serde_json::Value::Array(vaults.into_iter().map(vault_to_json).collect())
}
