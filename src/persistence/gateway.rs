// =============================================================================
// Persistence Gateway -- thin async CRUD over the entities in SPEC_FULL.md §3
// =============================================================================
//
// Backed by `sqlx`'s driver-agnostic `Any` pool so the same binary runs
// against either Postgres or SQLite, selected by the `DATABASE_URL` scheme.
// Every write here is a single-row insert; the only multi-table read in the
// hot path is `active_vaults_with_strategies` (SPEC_FULL.md §4.H).
//
// Queries are built with the raw query builder (`sqlx::query`), not the
// compile-time-checked `query!` macros, since those require a live database
// connection at build time that this environment does not have -- the same
// raw-query-builder idiom used in `examples/other_examples/..._executor-
// mod.rs.rs`.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{Row, Pool};
use tracing::info;

use super::models::{StrategyRow, TradeRecordRow, VaultRow, VaultWithStrategy};
use crate::market_data::Candle;

pub struct PersistenceGateway {
    pool: Pool<sqlx::Any>,
}

fn to_unix(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_unix(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

impl PersistenceGateway {
    pub async fn connect(database_url: &str) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;
        let gateway = Self { pool };
        gateway.ensure_schema().await?;
        Ok(gateway)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS strategies (
                id INTEGER PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                strategy_type TEXT NOT NULL,
                asset TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                code_path TEXT,
                stop_loss_pct REAL NOT NULL,
                take_profit_pct REAL NOT NULL,
                status TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS vaults (
                address TEXT PRIMARY KEY,
                chain TEXT NOT NULL,
                name TEXT,
                strategy_id INTEGER,
                status TEXT NOT NULL,
                check_interval TEXT NOT NULL,
                last_checked_at BIGINT,
                tvl REAL,
                share_price REAL,
                depositor_count BIGINT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS signal_logs (
                id INTEGER PRIMARY KEY,
                vault_address TEXT NOT NULL,
                strategy_id INTEGER,
                timestamp BIGINT NOT NULL,
                asset TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                direction INTEGER NOT NULL,
                confidence REAL NOT NULL,
                size_pct REAL NOT NULL,
                reason TEXT NOT NULL,
                current_price REAL NOT NULL,
                stop_loss REAL,
                take_profit REAL
            )",
            "CREATE TABLE IF NOT EXISTS trade_records (
                id INTEGER PRIMARY KEY,
                trade_num BIGINT NOT NULL,
                vault_address TEXT NOT NULL,
                strategy_id INTEGER,
                side TEXT NOT NULL,
                asset TEXT NOT NULL,
                size_usd REAL NOT NULL,
                entry_price REAL NOT NULL,
                result TEXT NOT NULL,
                tx_hash TEXT,
                error_message TEXT,
                timestamp BIGINT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS performance_snapshots (
                id INTEGER PRIMARY KEY,
                vault_address TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                tvl REAL NOT NULL,
                share_price REAL NOT NULL,
                depositor_count BIGINT NOT NULL,
                positions_json TEXT NOT NULL,
                unrealized_pnl REAL NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS historical_candles (
                asset TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS referral_indexer_state (
                id INTEGER PRIMARY KEY,
                last_indexed_block BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        info!("persistence schema ensured");
        Ok(())
    }

    // --- Vault registry -----------------------------------------------------

    /// All active vaults joined with their linked strategy -- the only
    /// multi-table query in the scheduler's hot path (SPEC_FULL.md §4.H).
    pub async fn active_vaults_with_strategies(&self) -> Result<Vec<VaultWithStrategy>> {
        let rows = sqlx::query(
            "SELECT v.*, s.id as s_id, s.slug as s_slug, s.name as s_name,
                    s.strategy_type as s_strategy_type, s.asset as s_asset,
                    s.timeframe as s_timeframe, s.code_path as s_code_path,
                    s.stop_loss_pct as s_stop_loss_pct, s.take_profit_pct as s_take_profit_pct,
                    s.status as s_status, s.created_at as s_created_at
             FROM vaults v LEFT JOIN strategies s ON v.strategy_id = s.id
             WHERE v.status = 'active'",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load active vaults")?;

        rows.into_iter().map(row_to_vault_with_strategy).collect()
    }

    pub async fn update_last_checked_at(&self, vault_address: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE vaults SET last_checked_at = ?, updated_at = ? WHERE address = ?")
            .bind(to_unix(at))
            .bind(to_unix(at))
            .bind(vault_address.to_lowercase())
            .execute(&self.pool)
            .await
            .context("failed to update last_checked_at")?;
        Ok(())
    }

    pub async fn update_vault_metrics(
        &self,
        vault_address: &str,
        tvl: f64,
        share_price: f64,
        depositor_count: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE vaults SET tvl = ?, share_price = ?, depositor_count = ?, updated_at = ? WHERE address = ?",
        )
        .bind(tvl)
        .bind(share_price)
        .bind(depositor_count)
        .bind(to_unix(Utc::now()))
        .bind(vault_address.to_lowercase())
        .execute(&self.pool)
        .await
        .context("failed to update vault metrics")?;
        Ok(())
    }

    // --- Signal log -----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_signal_log(
        &self,
        vault_address: &str,
        strategy_id: Option<i64>,
        asset: &str,
        timeframe: &str,
        direction: i32,
        confidence: f64,
        size_pct: f64,
        reason: &str,
        current_price: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_logs
                (vault_address, strategy_id, timestamp, asset, timeframe, direction,
                 confidence, size_pct, reason, current_price, stop_loss, take_profit)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(vault_address.to_lowercase())
        .bind(strategy_id)
        .bind(to_unix(Utc::now()))
        .bind(asset.to_uppercase())
        .bind(timeframe.to_string())
        .bind(direction)
        .bind(confidence)
        .bind(size_pct)
        .bind(reason.to_string())
        .bind(current_price)
        .bind(stop_loss)
        .bind(take_profit)
        .execute(&self.pool)
        .await
        .context("failed to insert signal log")?;
        Ok(())
    }

    // --- Trade records ----------------------------------------------------

    /// Next `trade_num` for `vault_address`: current max + 1, keeping the
    /// strictly-increasing gap-free invariant (SPEC_FULL.md §3, §8.3).
    async fn next_trade_num(&self, vault_address: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(trade_num), 0) as max_num FROM trade_records WHERE vault_address = ?",
        )
        .bind(vault_address.to_lowercase())
        .fetch_one(&self.pool)
        .await
        .context("failed to read max trade_num")?;
        let max_num: i64 = row.try_get("max_num").unwrap_or(0);
        Ok(max_num + 1)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_trade_record(
        &self,
        vault_address: &str,
        strategy_id: Option<i64>,
        side: &str,
        asset: &str,
        size_usd: f64,
        entry_price: f64,
        result: &str,
        tx_hash: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<i64> {
        let trade_num = self.next_trade_num(vault_address).await?;
        sqlx::query(
            "INSERT INTO trade_records
                (trade_num, vault_address, strategy_id, side, asset, size_usd, entry_price,
                 result, tx_hash, error_message, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(trade_num)
        .bind(vault_address.to_lowercase())
        .bind(strategy_id)
        .bind(side.to_string())
        .bind(asset.to_uppercase())
        .bind(size_usd)
        .bind(entry_price)
        .bind(result.to_string())
        .bind(tx_hash.map(|s| s.to_string()))
        .bind(error_message.map(|s| s.to_string()))
        .bind(to_unix(Utc::now()))
        .execute(&self.pool)
        .await
        .context("failed to insert trade record")?;
        Ok(trade_num)
    }

    pub async fn recent_trade_records(&self, vault_address: &str, limit: i64) -> Result<Vec<TradeRecordRow>> {
        let rows = sqlx::query(
            "SELECT * FROM trade_records WHERE vault_address = ? ORDER BY trade_num DESC LIMIT ?",
        )
        .bind(vault_address.to_lowercase())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to read trade records")?;
        rows.iter().map(row_to_trade_record).collect()
    }

    // --- Performance snapshots ---------------------------------------------

    pub async fn insert_performance_snapshot(
        &self,
        vault_address: &str,
        tvl: f64,
        share_price: f64,
        depositor_count: i64,
        positions_json: &str,
        unrealized_pnl: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO performance_snapshots
                (vault_address, timestamp, tvl, share_price, depositor_count, positions_json, unrealized_pnl)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(vault_address.to_lowercase())
        .bind(to_unix(Utc::now()))
        .bind(tvl)
        .bind(share_price)
        .bind(depositor_count)
        .bind(positions_json.to_string())
        .bind(unrealized_pnl)
        .execute(&self.pool)
        .await
        .context("failed to insert performance snapshot")?;
        Ok(())
    }

    // --- Candles ------------------------------------------------------------

    /// Insert one historical candle. Does **not** upsert/dedupe by
    /// (asset, timeframe, timestamp) -- preserved as a known limitation
    /// (SPEC_FULL.md §9, DESIGN.md resolution 2): re-running backfill over
    /// an already-backfilled window will insert duplicate rows.
    pub async fn insert_historical_candle(&self, asset: &str, timeframe: &str, candle: Candle) -> Result<()> {
        sqlx::query(
            "INSERT INTO historical_candles (asset, timeframe, timestamp, open, high, low, close, volume)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(asset.to_uppercase())
        .bind(timeframe.to_string())
        .bind(candle.timestamp)
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .bind(candle.volume)
        .execute(&self.pool)
        .await
        .context("failed to insert historical candle")?;
        Ok(())
    }

    pub async fn recent_candles(&self, asset: &str, timeframe: &str, limit: i64) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            "SELECT timestamp, open, high, low, close, volume FROM historical_candles
             WHERE asset = ? AND timeframe = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(asset.to_uppercase())
        .bind(timeframe.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to read historical candles")?;

        let mut candles: Vec<Candle> = rows
            .iter()
            .map(|r| Candle {
                timestamp: r.try_get("timestamp").unwrap_or(0),
                open: r.try_get("open").unwrap_or(0.0),
                high: r.try_get("high").unwrap_or(0.0),
                low: r.try_get("low").unwrap_or(0.0),
                close: r.try_get("close").unwrap_or(0.0),
                volume: r.try_get("volume").unwrap_or(0.0),
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    // --- Referral indexer cursor -------------------------------------------

    pub async fn referral_indexer_cursor(&self) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT last_indexed_block FROM referral_indexer_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to read referral indexer cursor")?;
        Ok(row.and_then(|r| r.try_get("last_indexed_block").ok()))
    }

    pub async fn set_referral_indexer_cursor(&self, block: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO referral_indexer_state (id, last_indexed_block, updated_at) VALUES (1, ?, ?)
             ON CONFLICT (id) DO UPDATE SET last_indexed_block = excluded.last_indexed_block, updated_at = excluded.updated_at",
        )
        .bind(block)
        .bind(to_unix(Utc::now()))
        .execute(&self.pool)
        .await
        .context("failed to upsert referral indexer cursor")?;
        Ok(())
    }

    // --- Vault registry (admin surface) ------------------------------------

    /// Register a new vault in `paused` status, or no-op if it already
    /// exists (idempotent, matching the admin registration endpoint's
    /// "safe to call twice" contract).
    pub async fn register_vault(&self, address: &str, chain: &str, name: Option<&str>) -> Result<()> {
        let now = to_unix(Utc::now());
        sqlx::query(
            "INSERT INTO vaults (address, chain, name, status, check_interval, created_at, updated_at)
             VALUES (?, ?, ?, 'paused', '1h', ?, ?)
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address.to_lowercase())
        .bind(chain.to_string())
        .bind(name.map(|n| n.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to register vault")?;
        Ok(())
    }

    pub async fn get_vault(&self, address: &str) -> Result<Option<VaultWithStrategy>> {
        let row = sqlx::query(
            "SELECT v.*, s.id as s_id, s.slug as s_slug, s.name as s_name,
                    s.strategy_type as s_strategy_type, s.asset as s_asset,
                    s.timeframe as s_timeframe, s.code_path as s_code_path,
                    s.stop_loss_pct as s_stop_loss_pct, s.take_profit_pct as s_take_profit_pct,
                    s.status as s_status, s.created_at as s_created_at
             FROM vaults v LEFT JOIN strategies s ON v.strategy_id = s.id
             WHERE v.address = ?",
        )
        .bind(address.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load vault")?;
        row.map(row_to_vault_with_strategy).transpose()
    }

    pub async fn list_vaults(&self) -> Result<Vec<VaultWithStrategy>> {
        let rows = sqlx::query(
            "SELECT v.*, s.id as s_id, s.slug as s_slug, s.name as s_name,
                    s.strategy_type as s_strategy_type, s.asset as s_asset,
                    s.timeframe as s_timeframe, s.code_path as s_code_path,
                    s.stop_loss_pct as s_stop_loss_pct, s.take_profit_pct as s_take_profit_pct,
                    s.status as s_status, s.created_at as s_created_at
             FROM vaults v LEFT JOIN strategies s ON v.strategy_id = s.id
             ORDER BY v.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list vaults")?;
        rows.into_iter().map(row_to_vault_with_strategy).collect()
    }

    /// Link a vault to a strategy by slug, returning an error if the slug is
    /// unknown (the admin link endpoint surfaces this as a 404).
    pub async fn link_strategy(&self, vault_address: &str, strategy_slug: &str) -> Result<()> {
        let strategy_id: i64 = sqlx::query("SELECT id FROM strategies WHERE slug = ?")
            .bind(strategy_slug.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up strategy")?
            .and_then(|r: AnyRow| r.try_get("id").ok())
            .with_context(|| format!("unknown strategy slug: {strategy_slug}"))?;

        sqlx::query("UPDATE vaults SET strategy_id = ?, updated_at = ? WHERE address = ?")
            .bind(strategy_id)
            .bind(to_unix(Utc::now()))
            .bind(vault_address.to_lowercase())
            .execute(&self.pool)
            .await
            .context("failed to link strategy to vault")?;
        Ok(())
    }

    /// Update a vault's status and/or check_interval token (admin update
    /// endpoint). `None` leaves the corresponding column untouched.
    pub async fn update_vault(&self, vault_address: &str, status: Option<&str>, check_interval: Option<&str>) -> Result<()> {
        if let Some(status) = status {
            sqlx::query("UPDATE vaults SET status = ?, updated_at = ? WHERE address = ?")
                .bind(status.to_string())
                .bind(to_unix(Utc::now()))
                .bind(vault_address.to_lowercase())
                .execute(&self.pool)
                .await
                .context("failed to update vault status")?;
        }
        if let Some(check_interval) = check_interval {
            sqlx::query("UPDATE vaults SET check_interval = ?, updated_at = ? WHERE address = ?")
                .bind(check_interval.to_string())
                .bind(to_unix(Utc::now()))
                .bind(vault_address.to_lowercase())
                .execute(&self.pool)
                .await
                .context("failed to update vault check_interval")?;
        }
        Ok(())
    }

    // --- Strategies -----------------------------------------------------------

    pub async fn list_strategies(&self) -> Result<Vec<StrategyRow>> {
        let rows = sqlx::query("SELECT * FROM strategies ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list strategies")?;
        rows.iter().map(|r| row_to_strategy(r, "")).filter_map(Result::transpose).collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_strategy(
        &self,
        slug: &str,
        name: &str,
        strategy_type: &str,
        asset: &str,
        timeframe: &str,
        code_path: Option<&str>,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    ) -> Result<i64> {
        sqlx::query(
            "INSERT INTO strategies
                (slug, name, strategy_type, asset, timeframe, code_path, stop_loss_pct, take_profit_pct, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'deployable', ?)
             ON CONFLICT (slug) DO UPDATE SET name = excluded.name, strategy_type = excluded.strategy_type,
                asset = excluded.asset, timeframe = excluded.timeframe, code_path = excluded.code_path,
                stop_loss_pct = excluded.stop_loss_pct, take_profit_pct = excluded.take_profit_pct",
        )
        .bind(slug.to_string())
        .bind(name.to_string())
        .bind(strategy_type.to_string())
        .bind(asset.to_uppercase())
        .bind(timeframe.to_string())
        .bind(code_path.map(|s| s.to_string()))
        .bind(stop_loss_pct)
        .bind(take_profit_pct)
        .bind(to_unix(Utc::now()))
        .execute(&self.pool)
        .await
        .context("failed to insert strategy")?;

        let row = sqlx::query("SELECT id FROM strategies WHERE slug = ?")
            .bind(slug.to_string())
            .fetch_one(&self.pool)
            .await
            .context("failed to read back inserted strategy id")?;
        row.try_get("id").context("strategy row missing id")
    }

    // --- Signal log reads ---------------------------------------------------

    pub async fn recent_signal_logs(&self, vault_address: &str, limit: i64) -> Result<Vec<super::models::SignalLogRow>> {
        let rows = sqlx::query("SELECT * FROM signal_logs WHERE vault_address = ? ORDER BY id DESC LIMIT ?")
            .bind(vault_address.to_lowercase())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to read signal logs")?;
        rows.iter()
            .map(|r| {
                Ok(super::models::SignalLogRow {
                    id: r.try_get("id")?,
                    vault_address: r.try_get("vault_address")?,
                    strategy_id: r.try_get("strategy_id").ok(),
                    timestamp: r.try_get("timestamp")?,
                    asset: r.try_get("asset")?,
                    timeframe: r.try_get("timeframe")?,
                    direction: r.try_get("direction")?,
                    confidence: r.try_get("confidence")?,
                    size_pct: r.try_get("size_pct")?,
                    reason: r.try_get("reason")?,
                    current_price: r.try_get("current_price")?,
                    stop_loss: r.try_get("stop_loss").ok(),
                    take_profit: r.try_get("take_profit").ok(),
                })
            })
            .collect()
    }
}

fn row_to_strategy(row: &AnyRow, prefix: &str) -> Result<Option<StrategyRow>> {
    let id: Option<i64> = row.try_get(format!("{prefix}id").as_str()).ok();
    let Some(id) = id else { return Ok(None) };
    Ok(Some(StrategyRow {
        id,
        slug: row.try_get(format!("{prefix}slug").as_str())?,
        name: row.try_get(format!("{prefix}name").as_str())?,
        strategy_type: row.try_get(format!("{prefix}strategy_type").as_str())?,
        asset: row.try_get(format!("{prefix}asset").as_str())?,
        timeframe: row.try_get(format!("{prefix}timeframe").as_str())?,
        code_path: row.try_get(format!("{prefix}code_path").as_str()).ok(),
        stop_loss_pct: row.try_get(format!("{prefix}stop_loss_pct").as_str())?,
        take_profit_pct: row.try_get(format!("{prefix}take_profit_pct").as_str())?,
        status: row.try_get(format!("{prefix}status").as_str())?,
        created_at: row.try_get(format!("{prefix}created_at").as_str())?,
    }))
}

fn row_to_vault(row: &AnyRow) -> Result<VaultRow> {
    Ok(VaultRow {
        address: row.try_get("address")?,
        chain: row.try_get("chain")?,
        name: row.try_get("name").ok(),
        strategy_id: row.try_get("strategy_id").ok(),
        status: row.try_get("status")?,
        check_interval: row.try_get("check_interval")?,
        last_checked_at: row.try_get("last_checked_at").ok(),
        tvl: row.try_get("tvl").ok(),
        share_price: row.try_get("share_price").ok(),
        depositor_count: row.try_get("depositor_count").ok(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_vault_with_strategy(row: AnyRow) -> Result<VaultWithStrategy> {
    let vault = row_to_vault(&row)?;
    let strategy = row_to_strategy(&row, "s_")?;
    Ok(VaultWithStrategy { vault, strategy })
}

fn row_to_trade_record(row: &AnyRow) -> Result<TradeRecordRow> {
    Ok(TradeRecordRow {
        id: row.try_get("id")?,
        trade_num: row.try_get("trade_num")?,
        vault_address: row.try_get("vault_address")?,
        strategy_id: row.try_get("strategy_id").ok(),
        side: row.try_get("side")?,
        asset: row.try_get("asset")?,
        size_usd: row.try_get("size_usd")?,
        entry_price: row.try_get("entry_price")?,
        result: row.try_get("result")?,
        tx_hash: row.try_get("tx_hash").ok(),
        error_message: row.try_get("error_message").ok(),
        timestamp: row.try_get("timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_round_trip() {
        let now = Utc::now();
        let ts = to_unix(now);
        let back = from_unix(ts);
        assert_eq!(now.timestamp(), back.timestamp());
    }
}
