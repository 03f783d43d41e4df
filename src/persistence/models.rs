// =============================================================================
// Persisted row types (SPEC_FULL.md §3)
// =============================================================================
//
// Timestamps are stored and passed around as Unix seconds (`i64`) rather
// than `DateTime<Utc>` directly on the row types: the gateway talks to the
// database through `sqlx`'s driver-agnostic `Any` pool (so the same binary
// works against either Postgres or SQLite, per SPEC_FULL.md §4.H), and the
// `Any` backend's column decoding only covers a small set of primitive
// types. Conversion to/from `chrono::DateTime<Utc>` happens at the edges
// (gateway row-mapping functions), not in the row structs themselves.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{StrategyStatus, TradeSide, VaultStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub strategy_type: String,
    pub asset: String,
    pub timeframe: String,
    pub code_path: Option<String>,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub status: String,
    pub created_at: i64,
}

impl StrategyRow {
    pub fn status(&self) -> Option<StrategyStatus> {
        match self.status.as_str() {
            "preview" => Some(StrategyStatus::Preview),
            "deployable" => Some(StrategyStatus::Deployable),
            "deployed" => Some(StrategyStatus::Deployed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRow {
    /// 20-byte chain address, lowercased, primary key.
    pub address: String,
    pub chain: String,
    pub name: Option<String>,
    pub strategy_id: Option<i64>,
    pub status: String,
    pub check_interval: String,
    pub last_checked_at: Option<i64>,
    pub tvl: Option<f64>,
    pub share_price: Option<f64>,
    pub depositor_count: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl VaultRow {
    pub fn status(&self) -> VaultStatus {
        match self.status.as_str() {
            "active" => VaultStatus::Active,
            _ => VaultStatus::Paused,
        }
    }
}

/// Vault joined with its linked strategy (the one multi-table query in the
/// scheduler's hot path, per SPEC_FULL.md §4.H).
#[derive(Debug, Clone)]
pub struct VaultWithStrategy {
    pub vault: VaultRow,
    pub strategy: Option<StrategyRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalLogRow {
    pub id: i64,
    pub vault_address: String,
    pub strategy_id: Option<i64>,
    pub timestamp: i64,
    pub asset: String,
    pub timeframe: String,
    pub direction: i32,
    pub confidence: f64,
    pub size_pct: f64,
    pub reason: String,
    pub current_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecordRow {
    pub id: i64,
    pub trade_num: i64,
    pub vault_address: String,
    pub strategy_id: Option<i64>,
    pub side: String,
    pub asset: String,
    pub size_usd: f64,
    pub entry_price: f64,
    pub result: String,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: i64,
}

impl TradeRecordRow {
    pub fn side(&self) -> Option<TradeSide> {
        match self.side.as_str() {
            "long" => Some(TradeSide::Long),
            "short" => Some(TradeSide::Short),
            "close" => Some(TradeSide::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshotRow {
    pub id: i64,
    pub vault_address: String,
    pub timestamp: i64,
    pub tvl: f64,
    pub share_price: f64,
    pub depositor_count: i64,
    pub positions_json: String,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalCandleRow {
    pub asset: String,
    pub timeframe: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Cursor for the referral indexer's chunked block-range scan
/// (SPEC_FULL.md §4.G `referral_index_loop`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralIndexerStateRow {
    pub id: i64,
    pub last_indexed_block: i64,
    pub updated_at: i64,
}
