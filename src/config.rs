// =============================================================================
// Configuration — environment-driven settings for the vault execution engine
// =============================================================================
//
// Every tunable lives here, sourced from the process environment (optionally
// via a `.env` file loaded by `main`). Unlike a hot-reloadable file, this
// configuration is read once at startup; `TRADING_ENABLED` is the one knob
// operators are expected to flip without a restart, and it is re-read from
// the environment on every check rather than cached (see `AppConfig::trading_enabled`).
//
// =============================================================================

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use ethers::types::{Address, Chain, H256};
use ethers::utils::hex;
use tracing::{info, warn};

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_var(key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_var(key)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_var(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parses `A:0x...,B:0x...` or a JSON object `{"A": "0x...", ...}` into an
/// asset-symbol -> address map.
fn parse_address_map(raw: &str) -> Result<HashMap<String, Address>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        let parsed: HashMap<String, String> =
            serde_json::from_str(trimmed).context("failed to parse address map as JSON")?;
        let mut out = HashMap::with_capacity(parsed.len());
        for (symbol, addr) in parsed {
            let addr = Address::from_str(addr.trim())
                .with_context(|| format!("invalid address for asset {symbol}: {addr}"))?;
            out.insert(symbol.to_ascii_uppercase(), addr);
        }
        Ok(out)
    } else {
        let mut out = HashMap::new();
        for pair in trimmed.split(',').filter(|s| !s.trim().is_empty()) {
            let (symbol, addr) = pair
                .split_once(':')
                .with_context(|| format!("malformed address map entry: {pair}"))?;
            let addr = Address::from_str(addr.trim())
                .with_context(|| format!("invalid address for asset {symbol}: {addr}"))?;
            out.insert(symbol.trim().to_ascii_uppercase(), addr);
        }
        Ok(out)
    }
}

/// GMX V2 protocol contract addresses on the configured chain.
#[derive(Debug, Clone)]
pub struct GmxContracts {
    pub exchange_router: Address,
    pub data_store: Address,
    pub order_vault: Address,
    pub reader: Address,
    pub callback_contract: Address,
    pub collateral_token: Address,
    pub ui_fee_receiver: Address,
}

/// Top-level configuration for the vault execution engine, sourced entirely
/// from environment variables (SPEC_FULL.md §6).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub arbitrum_rpc_url: String,
    pub arbitrum_chain_id: u64,
    pub trader_private_key: Option<H256>,

    pub gmx_execution_fee_wei_floor: u64,
    pub gmx_default_leverage: f64,
    pub gmx_slippage_bps: u32,
    pub gmx_market_addresses: HashMap<String, Address>,
    pub gmx: GmxContracts,

    pub pyth_symbols: Vec<String>,
    pub pyth_price_ids: HashMap<String, H256>,
    pub pyth_benchmarks_url: String,
    pub pyth_oracle_address: Option<Address>,

    pub referral_indexer_enabled: bool,
    pub referral_chain_id: u64,
    pub referral_registry_address: Option<Address>,
    pub referral_deposit_router_address: Option<Address>,
    pub referral_reward_pool_address: Option<Address>,
    pub referral_indexer_start_block: u64,
    pub referral_indexer_chunk_size: u64,
    pub referral_indexer_confirmations: u64,
    pub referral_indexer_interval_seconds: u64,

    pub backfill_on_startup: bool,
    pub cors_origins: Vec<String>,
    pub api_bind_addr: String,
    pub admin_token: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Fails if a value required for correct operation is malformed (e.g. an
    /// address string that does not parse), but tolerates a missing signing
    /// key — the engine can still serve read endpoints, it simply refuses to
    /// submit trades (SPEC_FULL.md §7, `MissingCredential`).
    pub fn load() -> Result<Self> {
        let database_url = env_var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;
        let database_url = normalize_database_url(&database_url);

        let arbitrum_rpc_url =
            env_var("ARBITRUM_RPC_URL").context("ARBITRUM_RPC_URL must be set")?;

        let arbitrum_chain_id = env_u64("ARBITRUM_CHAIN_ID", Chain::Arbitrum as u64);

        let trader_private_key = match env_var("TRADER_PRIVATE_KEY") {
            Some(raw) => Some(parse_private_key(&raw)?),
            None => {
                warn!("TRADER_PRIVATE_KEY not set -- trade submission is disabled");
                None
            }
        };

        let gmx_market_addresses = match env_var("GMX_MARKET_ADDRESSES") {
            Some(raw) => parse_address_map(&raw)?,
            None => HashMap::new(),
        };

        let gmx = GmxContracts {
            exchange_router: parse_addr_or(
                "GMX_EXCHANGE_ROUTER",
                // Address actually used by the original executor's submitted
                // transactions -- see DESIGN.md open-question resolution 4.
                "0x1C3fa76e6E1088bCE750f23a5BFcffa1efEF6A41",
            )?,
            data_store: parse_addr_or(
                "GMX_DATA_STORE",
                "0xFD70de6b91282D8017aA4E741e9Ae325CAb992d8",
            )?,
            order_vault: parse_addr_or(
                "GMX_ORDER_VAULT",
                "0x31eF83a530Fde1B38EE9A18093A333D8Bbbc40D5",
            )?,
            reader: parse_addr_or(
                "GMX_READER",
                "0xf60becbba223EEA9495Da3f606753867eC10d139",
            )?,
            callback_contract: parse_addr_or("GMX_CALLBACK_CONTRACT", &zero_address_str())?,
            collateral_token: parse_addr_or(
                "GMX_COLLATERAL_TOKEN",
                "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", // USDC (native) on Arbitrum
            )?,
            ui_fee_receiver: parse_addr_or("GMX_UI_FEE_RECEIVER", &zero_address_str())?,
        };

        let pyth_symbols = env_var("PYTH_SYMBOLS")
            .map(|v| v.split(',').map(|s| s.trim().to_uppercase()).collect())
            .unwrap_or_default();

        let pyth_price_ids = match env_var("PYTH_PRICE_IDS") {
            Some(raw) => parse_price_id_map(&raw)?,
            None => HashMap::new(),
        };

        let referral_registry_address = env_var("REFERRAL_REGISTRY_ADDRESS")
            .map(|v| Address::from_str(&v))
            .transpose()
            .context("invalid REFERRAL_REGISTRY_ADDRESS")?;
        let referral_deposit_router_address = env_var("REFERRAL_DEPOSIT_ROUTER_ADDRESS")
            .map(|v| Address::from_str(&v))
            .transpose()
            .context("invalid REFERRAL_DEPOSIT_ROUTER_ADDRESS")?;
        let referral_reward_pool_address = env_var("REFERRAL_REWARD_POOL_ADDRESS")
            .map(|v| Address::from_str(&v))
            .transpose()
            .context("invalid REFERRAL_REWARD_POOL_ADDRESS")?;

        let referral_indexer_enabled = env_bool("REFERRAL_INDEXER_ENABLED", false)
            && !arbitrum_rpc_url.is_empty()
            && referral_registry_address.is_some()
            && referral_deposit_router_address.is_some()
            && referral_reward_pool_address.is_some();

        let cors_origins = env_var("CORS_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let config = Self {
            database_url,
            arbitrum_rpc_url,
            arbitrum_chain_id,
            trader_private_key,
            gmx_execution_fee_wei_floor: env_u64("GMX_EXECUTION_FEE_WEI", 100_000_000_000_000),
            gmx_default_leverage: env_f64("GMX_DEFAULT_LEVERAGE", 5.0),
            gmx_slippage_bps: env_u64("GMX_SLIPPAGE_BPS", 50) as u32,
            gmx_market_addresses,
            gmx,
            pyth_symbols,
            pyth_price_ids,
            pyth_benchmarks_url: env_var("PYTH_BENCHMARKS_URL").unwrap_or_else(|| {
                "https://benchmarks.pyth.network/v1/shims/tradingview/history".to_string()
            }),
            pyth_oracle_address: env_var("PYTH_ORACLE_ADDRESS")
                .map(|v| Address::from_str(&v))
                .transpose()
                .context("invalid PYTH_ORACLE_ADDRESS")?,
            referral_indexer_enabled,
            referral_chain_id: env_u64("REFERRAL_CHAIN_ID", arbitrum_chain_id),
            referral_registry_address,
            referral_deposit_router_address,
            referral_reward_pool_address,
            referral_indexer_start_block: env_u64("REFERRAL_INDEXER_START_BLOCK", 0),
            referral_indexer_chunk_size: env_u64("REFERRAL_INDEXER_CHUNK_SIZE", 2000),
            referral_indexer_confirmations: env_u64("REFERRAL_INDEXER_CONFIRMATIONS", 12),
            referral_indexer_interval_seconds: env_u64(
                "REFERRAL_INDEXER_INTERVAL_SECONDS",
                60,
            ),
            backfill_on_startup: env_bool("BACKFILL_ON_STARTUP", false),
            cors_origins,
            api_bind_addr: env_var("API_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            admin_token: env_var("ADMIN_TOKEN").unwrap_or_default(),
        };

        info!(
            chain_id = config.arbitrum_chain_id,
            has_signing_key = config.trader_private_key.is_some(),
            markets = config.gmx_market_addresses.len(),
            referral_indexer_enabled = config.referral_indexer_enabled,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Master trading switch, re-read from the environment on every call so
    /// operators can flip it without a restart.
    pub fn trading_enabled(&self) -> bool {
        env_bool("TRADING_ENABLED", false)
    }
}

fn zero_address_str() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn parse_addr_or(key: &str, default: &str) -> Result<Address> {
    let raw = env_var(key).unwrap_or_else(|| default.to_string());
    Address::from_str(&raw).with_context(|| format!("invalid address for {key}: {raw}"))
}

fn parse_private_key(raw: &str) -> Result<H256> {
    let cleaned = raw.strip_prefix("0x").unwrap_or(raw);
    if cleaned.len() != 64 {
        bail!(
            "TRADER_PRIVATE_KEY must be 32 bytes (64 hex chars), got {} chars",
            cleaned.len()
        );
    }
    let bytes = hex::decode(cleaned).context("TRADER_PRIVATE_KEY is not valid hex")?;
    Ok(H256::from_slice(&bytes))
}

fn parse_price_id_map(raw: &str) -> Result<HashMap<String, H256>> {
    let trimmed = raw.trim();
    let parsed: HashMap<String, String> = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).context("failed to parse PYTH_PRICE_IDS as JSON")?
    } else {
        let mut m = HashMap::new();
        for pair in trimmed.split(',').filter(|s| !s.trim().is_empty()) {
            let (symbol, id) = pair
                .split_once(':')
                .with_context(|| format!("malformed PYTH_PRICE_IDS entry: {pair}"))?;
            m.insert(symbol.trim().to_string(), id.trim().to_string());
        }
        m
    };
    let mut out = HashMap::with_capacity(parsed.len());
    for (symbol, id) in parsed {
        let cleaned = id.strip_prefix("0x").unwrap_or(&id);
        let bytes = hex::decode(cleaned)
            .with_context(|| format!("invalid Pyth price id for {symbol}: {id}"))?;
        out.insert(symbol.to_ascii_uppercase(), H256::from_slice(&bytes));
    }
    Ok(out)
}

/// Adds an async driver prefix and maps `sslmode` to `ssl` the way the
/// original Python service normalizes a synchronous SQLAlchemy DSN into one
/// its async driver accepts. `sqlx` doesn't need a driver-name swap, but it
/// does not understand `sslmode=require` -- this rewrites it to `ssl=true`.
fn normalize_database_url(raw: &str) -> String {
    if let Some(idx) = raw.find("sslmode=") {
        let (head, tail) = raw.split_at(idx);
        let tail = tail.replacen("sslmode=", "ssl=", 1);
        format!("{head}{tail}")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_map_handles_csv_form() {
        let map = parse_address_map(
            "BTC:0x47c031236e19d024b42f8AE6780E44A573170703,ETH:0x70d95587d40A2caf56bd97485aB3Eec10Bee6336",
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("BTC"));
        assert!(map.contains_key("ETH"));
    }

    #[test]
    fn parse_address_map_handles_json_form() {
        let map = parse_address_map(
            r#"{"BTC": "0x47c031236e19d024b42f8AE6780E44A573170703"}"#,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("BTC"));
    }

    #[test]
    fn parse_private_key_rejects_wrong_length() {
        assert!(parse_private_key("0xabc123").is_err());
    }

    #[test]
    fn parse_private_key_accepts_0x_prefixed_32_bytes() {
        let key = "0".repeat(64);
        assert!(parse_private_key(&format!("0x{key}")).is_ok());
        assert!(parse_private_key(&key).is_ok());
    }

    #[test]
    fn normalize_database_url_maps_sslmode() {
        let normalized = normalize_database_url("postgres://u:p@host/db?sslmode=require");
        assert!(normalized.contains("ssl=require"));
        assert!(!normalized.contains("sslmode="));
    }

    #[test]
    fn normalize_database_url_is_noop_without_sslmode() {
        let url = "sqlite://local.db";
        assert_eq!(normalize_database_url(url), url);
    }
}
