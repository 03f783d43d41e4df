// =============================================================================
// Chain Reader -- view-only adapter over the vault, GMX, and ERC-20 contracts
// (SPEC_FULL.md §4.C). Grounded in `original_source/api/onchain/{gmx,
// vault_reader}.py`.
// =============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use ethers::abi::Abi;
use ethers::contract::Contract;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use tracing::warn;

use super::abi::{ERC20_ABI, ERC20_SYMBOL_ABI, GMX_READER_ABI, POOL_LOGIC_ABI, POOL_MANAGER_LOGIC_ABI};
use crate::config::AppConfig;

const PRICE_SCALE: f64 = 1e30;
const USDC_SCALE: f64 = 1e6;

/// A single open position on a GMX market, as read from the chain.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Position {
    pub market: Address,
    pub asset: String,
    pub size_usd: f64,
    /// Signed: positive for long, negative for short.
    pub size_tokens: f64,
    pub collateral_usd: f64,
    pub is_long: bool,
}

#[derive(Debug, Clone, Copy)]
enum CachedValue {
    F64(f64),
    Address(Address),
}

struct CacheEntry {
    value: CachedValue,
    stored_at: DateTime<Utc>,
}

/// Per-address-and-field TTL cache, matching `VaultReader._cache` in
/// `original_source/api/onchain/vault_reader.py`.
struct TtlCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if (Utc::now() - entry.stored_at).to_std().unwrap_or(Duration::MAX) > self.ttl {
            None
        } else {
            Some(entry.value)
        }
    }

    fn set(&self, key: &str, value: CachedValue) {
        self.entries.write().insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Utc::now(),
            },
        );
    }

    fn purge(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// Retry `f` up to `max_retries` additional times with exponential backoff,
/// purging `cache_key` (if given) before each retry -- mirrors
/// `VaultReader._retry_call`.
async fn retry_call<T, F, Fut>(
    cache: &TtlCache,
    cache_key: Option<&str>,
    max_retries: u32,
    backoff: Duration,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if let Some(key) = cache_key {
                    cache.purge(key);
                }
                last_err = Some(e);
                if attempt < max_retries {
                    tokio::time::sleep(backoff * 2u32.pow(attempt)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("unknown RPC error")))
}

pub struct ChainReader {
    provider: Arc<Provider<Http>>,
    gmx_reader: Address,
    gmx_data_store: Address,
    static_market_addresses: HashMap<String, Address>,
    static_long_tokens: HashMap<Address, Address>,
    cache: TtlCache,
    max_retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReader")
            .field("gmx_reader", &self.gmx_reader)
            .field("markets", &self.static_market_addresses.len())
            .finish()
    }
}

impl ChainReader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let provider =
            Provider::<Http>::try_from(config.arbitrum_rpc_url.as_str()).context("invalid Arbitrum RPC URL")?;

        // Well-known GMX market -> long-token pairs on Arbitrum, grounded in
        // `GMX_MARKET_LONG_TOKENS` in the original source.
        let static_long_tokens = [
            // BTC market -> WBTC
            ("0x47c031236e19d024b42f8AE6780E44A573170703", "0x2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f"),
            // ETH market -> WETH
            ("0x70d95587d40A2caf56bd97485aB3Eec10Bee6336", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            // SOL market -> SOL
            ("0x09400D9DB990D5ed3f35D7be61DfAEB900Af03C9", "0x2bcC6D6CdBbDC0a4071e48bb3B969b06B3330c07"),
        ]
        .iter()
        .filter_map(|(m, t)| Some((m.parse().ok()?, t.parse().ok()?)))
        .collect();

        Ok(Self {
            provider: Arc::new(provider),
            gmx_reader: config.gmx.reader,
            gmx_data_store: config.gmx.data_store,
            static_market_addresses: config.gmx_market_addresses.clone(),
            static_long_tokens,
            cache: TtlCache::new(Duration::from_secs(300)),
            max_retries: 2,
            backoff: Duration::from_millis(500),
        })
    }

    fn contract(&self, address: Address, abi_json: &str) -> Contract<Provider<Http>> {
        let abi: Abi = serde_json::from_str(abi_json).expect("static ABI is valid JSON");
        Contract::new(address, abi, self.provider.clone())
    }

    /// Resolve a perp market address for `asset`: configured map first, then
    /// on-chain enumeration matching the index token's ERC-20 symbol.
    pub async fn resolve_market_address(&self, asset: &str) -> Result<Address> {
        let asset = asset.to_uppercase();
        if let Some(addr) = self.static_market_addresses.get(&asset) {
            return Ok(*addr);
        }

        let (symbol_to_market, _) = self.enumerate_markets().await?;
        symbol_to_market
            .get(&asset)
            .copied()
            .ok_or_else(|| anyhow!("missing GMX market address for {asset}"))
    }

    async fn enumerate_markets(&self) -> Result<(HashMap<String, Address>, HashMap<Address, String>)> {
        let reader = self.contract(self.gmx_reader, GMX_READER_ABI);
        let markets: Vec<(Address, Address, Address, Address)> = reader
            .method("getMarkets", (self.gmx_data_store, U256::from(0), U256::from(50)))
            .context("failed to build getMarkets call")?
            .call()
            .await
            .context("getMarkets call failed")?;

        let mut symbol_to_market = HashMap::new();
        let mut market_to_symbol = HashMap::new();
        for (market_token, index_token, _long, _short) in markets {
            let symbol_contract = self.contract(index_token, ERC20_SYMBOL_ABI);
            let symbol: String = match symbol_contract.method::<_, String>("symbol", ()) {
                Ok(call) => match call.call().await {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Err(_) => continue,
            };
            let normalized = normalize_symbol(&symbol);
            symbol_to_market.insert(normalized.clone(), market_token);
            market_to_symbol.insert(market_token, normalized);
        }
        Ok((symbol_to_market, market_to_symbol))
    }

    /// Resolve the long-token address for `market`, static table first, then
    /// an on-chain `getMarkets` scan. Returns `None` (logged) rather than an
    /// error -- the caller's pre-flight check turns a `None` into a
    /// `PreflightReject`.
    pub async fn resolve_long_token(&self, market: Address) -> Option<Address> {
        if let Some(addr) = self.static_long_tokens.get(&market) {
            return Some(*addr);
        }
        let reader = self.contract(self.gmx_reader, GMX_READER_ABI);
        let result: Result<Vec<(Address, Address, Address, Address)>, _> = reader
            .method("getMarkets", (self.gmx_data_store, U256::from(0), U256::from(100)))
            .ok()?
            .call()
            .await;
        match result {
            Ok(markets) => markets
                .into_iter()
                .find(|(m, _, _, _)| *m == market)
                .map(|(_, _, long, _)| long),
            Err(e) => {
                warn!(market = ?market, error = %e, "failed to fetch long token for market");
                None
            }
        }
    }

    fn pool_manager_logic_key(vault: Address) -> String {
        format!("{:#x}:pool_manager_logic", vault)
    }

    pub async fn pool_manager_logic(&self, vault: Address) -> Result<Address> {
        let key = Self::pool_manager_logic_key(vault);
        if let Some(CachedValue::Address(addr)) = self.cache.get(&key) {
            return Ok(addr);
        }
        let contract = self.contract(vault, POOL_LOGIC_ABI);
        let addr: Address = retry_call(&self.cache, Some(&key), self.max_retries, self.backoff, || async {
            contract
                .method::<_, Address>("poolManagerLogic", ())
                .context("failed to build poolManagerLogic call")?
                .call()
                .await
                .context("poolManagerLogic call failed")
        })
        .await?;
        self.cache.set(&key, CachedValue::Address(addr));
        Ok(addr)
    }

    /// Supported-asset set for the vault's PoolManagerLogic, used by the
    /// Trade Executor's long-token pre-flight (SPEC_FULL.md §4.E step 5).
    pub async fn supported_assets(&self, vault: Address) -> Result<Vec<(Address, bool)>> {
        let manager_logic = self.pool_manager_logic(vault).await?;
        let contract = self.contract(manager_logic, POOL_MANAGER_LOGIC_ABI);
        let assets: Vec<(Address, bool)> = contract
            .method::<_, Vec<(Address, bool)>>("getSupportedAssets", ())
            .context("failed to build getSupportedAssets call")?
            .call()
            .await
            .context("getSupportedAssets call failed")?;
        Ok(assets)
    }

    /// TVL with the documented 3-strategy fallback, returning 0.0 if all
    /// three fail (SPEC_FULL.md §4.C).
    pub async fn tvl(&self, vault: Address) -> f64 {
        let key = format!("{:#x}:tvl", vault);
        if let Some(CachedValue::F64(v)) = self.cache.get(&key) {
            return v;
        }

        let contract = self.contract(vault, POOL_LOGIC_ABI);

        // Strategy 1: PoolManagerLogic.totalFundValue(), via the pool's
        // manager-logic proxy -- the most reliable source.
        if let Ok(manager_logic) = self.pool_manager_logic(vault).await {
            let manager_contract = self.contract(manager_logic, POOL_LOGIC_ABI);
            if let Ok(call) = manager_contract.method::<_, U256>("totalFundValue", ()) {
                if let Ok(wei) = call.call().await {
                    let tvl = u256_to_f64(wei) / 1e18;
                    self.cache.set(&key, CachedValue::F64(tvl));
                    return tvl;
                }
            }
        }

        // Strategy 2: PoolLogic.totalFundValue() directly.
        let direct: Option<U256> = match contract.method::<_, U256>("totalFundValue", ()) {
            Ok(call) => call.call().await.ok(),
            Err(_) => None,
        };
        if let Some(wei) = direct {
            let tvl = u256_to_f64(wei) / 1e18;
            self.cache.set(&key, CachedValue::F64(tvl));
            return tvl;
        }

        // Strategy 3: tokenPrice() * totalSupply().
        let price = contract.method::<_, U256>("tokenPrice", ()).ok();
        let supply = contract.method::<_, U256>("totalSupply", ()).ok();
        if let (Some(price_call), Some(supply_call)) = (price, supply) {
            if let (Ok(price), Ok(supply)) = (price_call.call().await, supply_call.call().await) {
                let tvl = (u256_to_f64(price) / 1e18) * (u256_to_f64(supply) / 1e18);
                self.cache.set(&key, CachedValue::F64(tvl));
                return tvl;
            }
        }

        warn!(vault = ?vault, "all TVL strategies failed, returning 0.0");
        0.0
    }

    pub async fn share_price(&self, vault: Address) -> Result<f64> {
        let contract = self.contract(vault, POOL_LOGIC_ABI);
        let price: U256 = contract
            .method::<_, U256>("tokenPrice", ())
            .context("failed to build tokenPrice call")?
            .call()
            .await
            .context("tokenPrice call failed")?;
        Ok(u256_to_f64(price) / 1e18)
    }

    pub async fn total_supply(&self, vault: Address) -> Result<f64> {
        let contract = self.contract(vault, POOL_LOGIC_ABI);
        let supply: U256 = contract
            .method::<_, U256>("totalSupply", ())
            .context("failed to build totalSupply call")?
            .call()
            .await
            .context("totalSupply call failed")?;
        Ok(u256_to_f64(supply) / 1e18)
    }

    /// ERC-20 balance of `owner` for `token`, in human units (assumes 6 or
    /// 18 decimals as configured by the caller via `decimals`).
    pub async fn token_balance(&self, token: Address, owner: Address, decimals: u32) -> Result<f64> {
        let contract = self.contract(token, ERC20_ABI);
        let balance: U256 = contract
            .method::<_, U256>("balanceOf", owner)
            .context("failed to build balanceOf call")?
            .call()
            .await
            .context("balanceOf call failed")?;
        Ok(u256_to_f64(balance) / 10f64.powi(decimals as i32))
    }

    /// Open positions for `vault`, parsed into [`Position`] values with the
    /// documented GMX precision (size / 10^30, collateral / 10^6).
    pub async fn positions(&self, vault: Address, asset_for_market: impl Fn(Address) -> String) -> Result<Vec<Position>> {
        let reader = self.contract(self.gmx_reader, GMX_READER_ABI);
        type RawPosition = (
            (Address, Address, Address),
            (U256, U256, U256, U256, U256, U256, U256, U256, U256, U256, U256),
            (bool,),
        );
        let raw: Vec<RawPosition> = reader
            .method("getAccountPositions", (self.gmx_data_store, vault, U256::from(0), U256::from(10)))
            .context("failed to build getAccountPositions call")?
            .call()
            .await
            .context("getAccountPositions call failed")?;

        let mut positions = Vec::new();
        for (addresses, numbers, flags) in raw {
            let (_account, market, _collateral_token) = addresses;
            let size_in_usd = numbers.0;
            let size_in_tokens = numbers.1;
            let collateral_amount = numbers.2;
            let is_long = flags.0;

            let size_usd = u256_to_f64(size_in_usd) / PRICE_SCALE;
            if size_usd == 0.0 {
                continue;
            }
            let size_tokens_signed = u256_to_f64(size_in_tokens) / PRICE_SCALE * if is_long { 1.0 } else { -1.0 };

            positions.push(Position {
                market,
                asset: asset_for_market(market),
                size_usd,
                size_tokens: size_tokens_signed,
                collateral_usd: u256_to_f64(collateral_amount) / USDC_SCALE,
                is_long,
            });
        }
        Ok(positions)
    }

    pub async fn current_gas_price(&self) -> Result<U256> {
        self.provider.get_gas_price().await.context("failed to fetch gas price")
    }
}

fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    if let Some(stripped) = upper.strip_prefix('W') {
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }
    upper
}

fn u256_to_f64(v: U256) -> f64 {
    v.to_string().parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_symbol_strips_leading_w() {
        assert_eq!(normalize_symbol("WBTC"), "BTC");
        assert_eq!(normalize_symbol("WETH"), "ETH");
        assert_eq!(normalize_symbol("SOL"), "SOL");
        assert_eq!(normalize_symbol("W"), "W");
    }

    #[test]
    fn u256_to_f64_handles_large_values() {
        let v = U256::from(10u64).pow(U256::from(18u64));
        assert!((u256_to_f64(v) - 1e18).abs() / 1e18 < 1e-9);
    }
}
