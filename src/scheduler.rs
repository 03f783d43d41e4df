// =============================================================================
// Scheduler -- independent tokio loops driving the engine (SPEC_FULL.md §4.G)
// =============================================================================
//
// Grounded in `main.rs`'s independent `tokio::spawn` loop pattern (strategy
// loop, exit monitor, reconciliation loop, regime loop all run as separate
// tasks sharing one `Arc<AppState>`). Each loop here owns its own interval
// and failure handling; a panic or stall in one never blocks the others.
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::executor::Signal;
use crate::types::{reconcile, CheckInterval, ReconcileAction, SignalDirection};

/// Spawn every background loop the engine needs, per SPEC_FULL.md §4.G.
pub fn spawn_all(state: Arc<AppState>) {
    tokio::spawn(main_loop(state.clone()));
    tokio::spawn(snapshot_loop(state.clone()));
    tokio::spawn(health_loop(state.clone()));
    if state.referral_indexer.enabled {
        tokio::spawn(referral_index_loop(state));
    } else {
        info!("referral indexer disabled, skipping referral_index_loop");
    }
}

/// Runs every 60s: for each active vault whose `check_interval` token has
/// elapsed since `last_checked_at`, pull candles, run its strategy, and
/// reconcile the position against the signal.
async fn main_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
    loop {
        interval.tick().await;
        if let Err(e) = run_main_loop_once(&state).await {
            error!(error = %e, "main loop iteration failed");
        }
    }
}

async fn run_main_loop_once(state: &Arc<AppState>) -> anyhow::Result<()> {
    let vaults = state.persistence.active_vaults_with_strategies().await?;
    let now = chrono::Utc::now();

    for entry in vaults {
        let vault_address = entry.vault.address.clone();

        if state.circuit_breaker.is_broken(&vault_address) {
            continue;
        }

        let Some(strategy_row) = &entry.strategy else {
            continue;
        };
        let interval_token = CheckInterval::parse(&entry.vault.check_interval).unwrap_or(CheckInterval::OneHour);
        if let Some(last_checked) = entry.vault.last_checked_at {
            let elapsed = now.timestamp() - last_checked;
            if elapsed < interval_token.as_seconds() {
                continue;
            }
        }

        let Some(strategy) = state.strategies.get(&strategy_row.slug) else {
            warn!(vault = %vault_address, slug = %strategy_row.slug, "strategy not registered, skipping vault");
            continue;
        };

        let candles = state.market_data.candles(&strategy_row.asset, &strategy_row.timeframe, 500).await;
        if candles.is_empty() {
            warn!(vault = %vault_address, asset = %strategy_row.asset, "no candle history available, skipping vault");
            continue;
        }
        let directions = strategy.generate_signals(&candles);
        let Some(&desired_raw) = directions.last() else {
            continue;
        };
        let desired = SignalDirection::from_i8(desired_raw);
        let current_price = candles.last().map(|c| c.close).unwrap_or(0.0);

        let confidence = signal_confidence(&directions);
        let size_pct = signal_size_pct(desired, confidence);
        let (stop_loss, take_profit) = risk_levels(strategy_row, desired, current_price);

        let vault_addr: ethers::types::Address = match vault_address.parse() {
            Ok(a) => a,
            Err(e) => {
                warn!(vault = %vault_address, error = %e, "malformed vault address, skipping");
                continue;
            }
        };

        let current_direction = current_position_direction(state, vault_addr, &strategy_row.asset).await;
        let action = reconcile(desired, current_direction);

        state
            .persistence
            .insert_signal_log(
                &vault_address,
                Some(strategy_row.id),
                &strategy_row.asset,
                &strategy_row.timeframe,
                desired.as_i8() as i32,
                confidence,
                size_pct,
                &format!("{action:?}"),
                current_price,
                stop_loss,
                take_profit,
            )
            .await?;

        if !matches!(action, ReconcileAction::Noop) {
            run_reconcile_action(state, vault_addr, &vault_address, strategy_row, desired, current_price, size_pct, action).await;
        }

        state.persistence.update_last_checked_at(&vault_address, now).await?;
        state.increment_version();
    }

    Ok(())
}

async fn current_position_direction(state: &Arc<AppState>, vault: ethers::types::Address, asset: &str) -> SignalDirection {
    let asset_owned = asset.to_string();
    match state.chain.positions(vault, move |_market| asset_owned.clone()).await {
        Ok(positions) => positions
            .into_iter()
            .find(|p| p.asset.eq_ignore_ascii_case(asset))
            .map(|p| if p.is_long { SignalDirection::Long } else { SignalDirection::Short })
            .unwrap_or(SignalDirection::Neutral),
        Err(e) => {
            warn!(vault = ?vault, error = %e, "failed to read open positions, assuming flat");
            SignalDirection::Neutral
        }
    }
}

async fn run_reconcile_action(
    state: &Arc<AppState>,
    vault_addr: ethers::types::Address,
    vault_address: &str,
    strategy_row: &crate::persistence::models::StrategyRow,
    desired: SignalDirection,
    current_price: f64,
    size_pct: f64,
    action: ReconcileAction,
) {
    let signal = Signal {
        asset: strategy_row.asset.clone(),
        direction: desired,
        current_price,
        size_pct,
    };

    if matches!(action, ReconcileAction::Close | ReconcileAction::CloseThenOpen) {
        let outcome = state.executor.execute_trade(&signal, vault_addr, true, None).await;
        record_trade_outcome(state, vault_address, strategy_row, "close", current_price, &outcome).await;
    }
    if matches!(action, ReconcileAction::Open | ReconcileAction::CloseThenOpen) {
        let outcome = state.executor.execute_trade(&signal, vault_addr, false, None).await;
        let side = if desired == SignalDirection::Long { "long" } else { "short" };
        record_trade_outcome(state, vault_address, strategy_row, side, current_price, &outcome).await;
    }
}

async fn record_trade_outcome(
    state: &Arc<AppState>,
    vault_address: &str,
    strategy_row: &crate::persistence::models::StrategyRow,
    side: &str,
    current_price: f64,
    outcome: &crate::types::TradeOutcome,
) {
    use crate::types::TradeOutcome;

    let success = outcome.is_success();
    let counts = matches!(outcome, TradeOutcome::Failed { counts_toward_breaker, .. } if *counts_toward_breaker) || success;
    if counts {
        state.circuit_breaker.record(vault_address, success);
    }

    // A no-op Success (not-actionable signal, or size computed to zero) never
    // reached the chain -- spec.md requires it "causes skip without a trade;
    // not counted", so no TradeRecord is written for it.
    let (tx_hash, error_message) = match outcome {
        TradeOutcome::Success { tx_hash: None, .. } => return,
        TradeOutcome::Success { tx_hash, .. } => (tx_hash.clone(), None),
        TradeOutcome::Failed { error, .. } => (None, Some(error.clone())),
    };
    let result = if success { "success" } else { "failed" };

    if let Err(e) = state
        .persistence
        .insert_trade_record(
            vault_address,
            Some(strategy_row.id),
            side,
            &strategy_row.asset,
            0.0,
            current_price,
            result,
            tx_hash.as_deref(),
            error_message.as_deref(),
        )
        .await
    {
        error!(vault = %vault_address, error = %e, "failed to persist trade record");
    }

    if !success {
        state.push_error(format!("trade failed for {vault_address}: {error_message:?}"));
    }
}

/// Agreement-based confidence over the last 5 signal values, matching
/// `signal_generator.py::_calculate_confidence`: fewer than 5 points yields
/// a neutral 0.5; a latest value of 0 yields 0 confidence; otherwise the
/// fraction of the last 5 points agreeing with the latest value.
fn signal_confidence(directions: &[i8]) -> f64 {
    if directions.len() < 5 {
        return 0.5;
    }
    let recent = &directions[directions.len() - 5..];
    let latest = recent[recent.len() - 1];
    if latest == 0 {
        return 0.0;
    }
    let agreeing = recent.iter().filter(|&&s| s == latest).count();
    (agreeing as f64 / recent.len() as f64).clamp(0.0, 1.0)
}

/// `size_pct = confidence`, clamped to [0.1, 1.0], per
/// `signal_generator.py::_calculate_size`. Zero for a neutral signal, which
/// also satisfies SPEC_FULL.md §3's "direction = 0 ⇒ size_pct = 0" invariant.
fn signal_size_pct(desired: SignalDirection, confidence: f64) -> f64 {
    if desired == SignalDirection::Neutral {
        return 0.0;
    }
    confidence.clamp(0.1, 1.0)
}

/// Stop-loss/take-profit levels from the strategy's configured percentages
/// applied to the current price, per `signal_generator.py::_calculate_risk_levels`.
fn risk_levels(
    strategy_row: &crate::persistence::models::StrategyRow,
    desired: SignalDirection,
    current_price: f64,
) -> (Option<f64>, Option<f64>) {
    if desired == SignalDirection::Neutral || current_price <= 0.0 {
        return (None, None);
    }
    let stop_pct = strategy_row.stop_loss_pct;
    let take_pct = strategy_row.take_profit_pct;
    if desired == SignalDirection::Long {
        (Some(current_price * (1.0 - stop_pct)), Some(current_price * (1.0 + take_pct)))
    } else {
        (Some(current_price * (1.0 + stop_pct)), Some(current_price * (1.0 - take_pct)))
    }
}

/// Runs on the top of every minute: persists a TVL/share-price/positions
/// snapshot for every active vault, independent of whether its strategy's
/// check interval has elapsed.
async fn snapshot_loop(state: Arc<AppState>) {
    loop {
        let now = chrono::Utc::now();
        let seconds_into_minute = now.timestamp() % 60;
        let sleep_for = if seconds_into_minute == 0 { 60 } else { 60 - seconds_into_minute };
        tokio::time::sleep(tokio::time::Duration::from_secs(sleep_for as u64)).await;

        if let Err(e) = run_snapshot_loop_once(&state).await {
            error!(error = %e, "snapshot loop iteration failed");
        }
    }
}

async fn run_snapshot_loop_once(state: &Arc<AppState>) -> anyhow::Result<()> {
    let vaults = state.persistence.active_vaults_with_strategies().await?;
    for entry in vaults {
        let vault_address = entry.vault.address.clone();
        let Ok(vault_addr) = vault_address.parse::<ethers::types::Address>() else {
            continue;
        };

        let tvl = state.chain.tvl(vault_addr).await;
        let share_price = state.chain.share_price(vault_addr).await.unwrap_or(0.0);
        let total_supply = state.chain.total_supply(vault_addr).await.unwrap_or(0.0);
        let depositor_count = 0i64; // not derivable without an indexer of Transfer events; left at 0.

        state
            .persistence
            .update_vault_metrics(&vault_address, tvl, share_price, depositor_count)
            .await?;

        let asset = entry.strategy.as_ref().map(|s| s.asset.clone()).unwrap_or_default();
        let positions = state
            .chain
            .positions(vault_addr, move |_m| asset.clone())
            .await
            .unwrap_or_default();
        let unrealized_pnl = 0.0; // mark-to-market PnL requires entry price bookkeeping, out of scope here.
        let positions_json = serde_json::to_string(&positions).unwrap_or_else(|_| "[]".to_string());

        state
            .persistence
            .insert_performance_snapshot(&vault_address, tvl, share_price, depositor_count, &positions_json, unrealized_pnl)
            .await?;

        let _ = total_supply;
    }
    state.increment_version();
    Ok(())
}

/// Runs every 5 minutes: a lightweight liveness check over the RPC endpoint
/// and the database, logged so operators can alert on repeated failures.
async fn health_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
    loop {
        interval.tick().await;
        match state.chain.current_gas_price().await {
            Ok(_) => info!("health check: RPC reachable"),
            Err(e) => {
                warn!(error = %e, "health check: RPC unreachable");
                state.push_error(format!("RPC health check failed: {e}"));
            }
        }
    }
}

/// Runs at the operator-configured interval, gated on `referral_indexer_enabled`:
/// advances the referral indexer's cursor by one chunk and logs the count of
/// events observed. Event decoding is out of core scope (SPEC_FULL.md §1).
async fn referral_index_loop(state: Arc<AppState>) {
    let period = state.config.referral_indexer_interval_seconds.max(1);
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(period));
    loop {
        interval.tick().await;
        match state.referral_indexer.index_once().await {
            Ok(result) => info!(?result, "referral index pass complete"),
            Err(e) => warn!(error = %e, "referral index pass failed"),
        }
    }
}
