// =============================================================================
// Operator CLI -- `backfill` and `import-strategy` subcommands (SPEC_FULL.md §6)
// =============================================================================
//
// Grounded in `examples/cooprefr-bettersys/rust-backend/src/bin/dataset_inspect.rs`
// for the clap derive shape (`Parser` + `Subcommand`, `#[arg(short, long)]`),
// and in `original_source/api/cli/{backfill,import_strategy}.py` for the
// subcommands' exact behavior and exit codes.
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::market_data::PythClient;
use crate::persistence::PersistenceGateway;

#[derive(Parser, Debug)]
#[command(name = "vault-cli")]
#[command(about = "Operator tooling for the vault execution engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backfill historical candles from the Pyth Benchmarks API.
    Backfill {
        /// Report what's already stored instead of fetching anything.
        #[arg(long)]
        check: bool,
        /// Restrict the run to one asset (default: every configured symbol).
        #[arg(long)]
        asset: Option<String>,
    },
    /// Import a strategy artifact from an analytics results folder.
    ImportStrategy {
        /// Folder containing `llm_context.json` and optionally `strategy.py`.
        path: std::path::PathBuf,
        /// Validate the folder without writing anything.
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Overwrite an existing strategy with the same slug.
        #[arg(long)]
        force: bool,
        #[arg(short, long)]
        verbose: bool,
    },
}

/// One (resolution, timeframe, lookback-days) tier backfilled per asset,
/// matching `BACKFILL_CONFIG` in `original_source/api/services/backfill.py`.
const BACKFILL_TIERS: &[(&str, &str, i64)] = &[
    ("1", "1m", 3),
    ("5", "5m", 7),
    ("60", "1h", 30),
    ("240", "4h", 90),
    ("D", "1d", 365),
];

/// Run `backfill`, returning the process exit code.
pub async fn run_backfill(config: &AppConfig, gateway: &PersistenceGateway, check: bool, asset: Option<String>) -> Result<i32> {
    let assets: Vec<String> = match asset {
        Some(a) => vec![a.to_uppercase()],
        None => {
            if config.pyth_symbols.is_empty() {
                bail!("no assets configured (PYTH_SYMBOLS is empty) and none given via --asset");
            }
            config.pyth_symbols.clone()
        }
    };

    if check {
        for asset in &assets {
            for (_, timeframe, _) in BACKFILL_TIERS {
                let candles = gateway.recent_candles(asset, timeframe, 1).await?;
                info!(asset, timeframe, stored = !candles.is_empty(), "backfill status");
            }
        }
        return Ok(0);
    }

    let pyth = PythClient::new(
        config.pyth_benchmarks_url.clone(),
        config.pyth_price_ids.clone(),
        config.pyth_oracle_address,
        &config.arbitrum_rpc_url,
    )?;

    let now = chrono::Utc::now().timestamp();
    let mut any_failed = false;
    for asset in &assets {
        for (resolution, timeframe, days) in BACKFILL_TIERS {
            let from = now - days * 86_400;
            info!(asset, timeframe, days, "fetching candles");
            match pyth.fetch_history(asset, resolution, from, now).await {
                Ok(candles) if candles.is_empty() => {
                    warn!(asset, timeframe, "no data returned");
                }
                Ok(candles) => {
                    let count = candles.len();
                    for candle in candles {
                        gateway.insert_historical_candle(asset, timeframe, candle).await?;
                    }
                    info!(asset, timeframe, count, "stored candles");
                }
                Err(e) => {
                    warn!(asset, timeframe, error = %e, "backfill fetch failed");
                    any_failed = true;
                }
            }
        }
    }

    Ok(if any_failed { 1 } else { 0 })
}

/// Metadata expected in a strategy folder's `llm_context.json`, mirroring
/// `StrategyImportPayload` in `original_source/api/models/import_schema.py`.
#[derive(Debug, Deserialize)]
struct StrategyImportPayload {
    strategy: StrategyMetaPayload,
    #[serde(default)]
    source_code: Option<String>,
    #[serde(default)]
    vault: Option<VaultMetaPayload>,
}

#[derive(Debug, Deserialize)]
struct StrategyMetaPayload {
    name: String,
    slug: String,
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

#[derive(Debug, Deserialize)]
struct VaultMetaPayload {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_chain")]
    chain: String,
}

fn default_chain() -> String {
    "arbitrum".to_string()
}

/// Run `import-strategy`, returning the process exit code (0 success, 1 failure).
pub async fn run_import_strategy(
    gateway: &PersistenceGateway,
    folder: &Path,
    dry_run: bool,
    force: bool,
    verbose: bool,
) -> Result<i32> {
    if !folder.exists() {
        eprintln!("path not found: {}", folder.display());
        return Ok(1);
    }

    let context_path = folder.join("llm_context.json");
    let raw = match std::fs::read_to_string(&context_path) {
        Ok(s) => s,
        Err(_) => {
            eprintln!("llm_context.json not found in {}", folder.display());
            return Ok(1);
        }
    };
    let payload: StrategyImportPayload =
        serde_json::from_str(&raw).with_context(|| format!("invalid llm_context.json in {}", folder.display()))?;

    if verbose {
        println!("loaded metadata: {}", payload.strategy.name);
    }

    let code_path = folder.join("strategy.py");
    let source_present = code_path.exists() || payload.source_code.is_some();
    if !source_present {
        eprintln!("no strategy code found (neither strategy.py nor source_code in JSON)");
        return Ok(1);
    }
    if verbose && code_path.exists() {
        let len = std::fs::metadata(&code_path).map(|m| m.len()).unwrap_or(0);
        println!("found strategy.py ({len} bytes)");
    }

    let existing = gateway.list_strategies().await?.into_iter().find(|s| s.slug == payload.strategy.slug);
    if existing.is_some() && !force {
        eprintln!("strategy '{}' already exists; use --force to overwrite", payload.strategy.slug);
        return Ok(1);
    }

    if dry_run {
        println!("dry run - would import: {}", payload.strategy.name);
        return Ok(0);
    }

    let stop_loss_pct = payload.strategy.stop_loss_pct.unwrap_or(0.02);
    let take_profit_pct = payload.strategy.take_profit_pct.unwrap_or(0.05);
    let strategy_id = gateway
        .insert_strategy(
            &payload.strategy.slug,
            &payload.strategy.name,
            &payload.strategy.strategy_type,
            &payload.strategy.asset,
            &payload.strategy.timeframe,
            code_path.to_str(),
            stop_loss_pct,
            take_profit_pct,
        )
        .await?;

    println!("imported: {}", payload.strategy.name);
    println!("  database id: {strategy_id}");
    if let Some(p) = code_path.to_str() {
        if code_path.exists() {
            println!("  code file: {p}");
        }
    }

    if let Some(vault) = &payload.vault {
        gateway.register_vault(&vault.address, &vault.chain, vault.name.as_deref()).await?;
        gateway.link_strategy(&vault.address, &payload.strategy.slug).await?;
        println!("  linked vault: {}", vault.address.to_lowercase());
    }

    Ok(0)
}
