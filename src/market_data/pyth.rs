// =============================================================================
// Pyth price client -- HTTP benchmark history + on-chain oracle fallback
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ethers::abi::Abi;
use ethers::contract::Contract;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, H256};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::candle_buffer::Candle;

/// `getPriceUnsafe(bytes32) -> (int64 price, uint64 conf, int32 expo, uint256 publishTime)`
const PYTH_ORACLE_ABI: &str = r#"[
    {
        "name": "getPriceUnsafe",
        "type": "function",
        "stateMutability": "view",
        "inputs": [{ "name": "id", "type": "bytes32" }],
        "outputs": [
            { "name": "price", "type": "int64" },
            { "name": "conf", "type": "uint64" },
            { "name": "expo", "type": "int32" },
            { "name": "publishTime", "type": "uint256" }
        ]
    }
]"#;

#[derive(Debug, Deserialize)]
struct BenchmarksHistoryResponse {
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
    #[serde(default)]
    s: Option<String>,
}

/// HTTP + on-chain Pyth client. The HTTP client is used for historical
/// candle backfill and as the `latest_price` fallback; the on-chain oracle,
/// when configured, is consulted first for `latest_price` since it is
/// harder to spoof and does not depend on a third-party HTTP endpoint
/// staying up (SPEC_FULL.md §4.A).
pub struct PythClient {
    http: reqwest::Client,
    benchmarks_url: String,
    price_ids: HashMap<String, H256>,
    oracle: Option<Contract<Provider<Http>>>,
}

impl std::fmt::Debug for PythClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythClient")
            .field("benchmarks_url", &self.benchmarks_url)
            .field("price_ids", &self.price_ids.len())
            .field("oracle_configured", &self.oracle.is_some())
            .finish()
    }
}

impl PythClient {
    pub fn new(
        benchmarks_url: String,
        price_ids: HashMap<String, H256>,
        oracle_address: Option<Address>,
        rpc_url: &str,
    ) -> Result<Self> {
        let oracle = match oracle_address {
            Some(addr) => {
                let provider =
                    Provider::<Http>::try_from(rpc_url).context("invalid Arbitrum RPC URL")?;
                let abi: Abi =
                    serde_json::from_str(PYTH_ORACLE_ABI).expect("static ABI is valid JSON");
                Some(Contract::new(addr, abi, Arc::new(provider)))
            }
            None => None,
        };

        Ok(Self {
            http: reqwest::Client::new(),
            benchmarks_url,
            price_ids,
            oracle,
        })
    }

    /// Read the latest price for `asset` from the on-chain oracle if
    /// configured, falling back to the most recent benchmark candle.
    /// Returns `None` (not 0.0) on total failure so the caller decides the
    /// sentinel policy -- `MarketDataFeed` is the one that applies the 0.0
    /// convention documented in SPEC_FULL.md §4.A.
    #[instrument(skip(self), name = "pyth::latest_price")]
    pub async fn latest_price(&self, asset: &str) -> Option<f64> {
        if let Some(price) = self.oracle_price(asset).await {
            return Some(price);
        }
        self.benchmark_latest(asset).await
    }

    async fn oracle_price(&self, asset: &str) -> Option<f64> {
        let contract = self.oracle.as_ref()?;
        let id = self.price_ids.get(&asset.to_uppercase())?;

        let call = contract
            .method::<[u8; 32], (i64, u64, i32, ethers::types::U256)>(
                "getPriceUnsafe",
                id.to_fixed_bytes(),
            )
            .ok()?;
        let result = call.call().await;

        match result {
            Ok((price, _conf, expo, _publish_time)) => {
                Some(price as f64 * 10f64.powi(expo))
            }
            Err(e) => {
                warn!(asset, error = %e, "pyth oracle call failed");
                None
            }
        }
    }

    async fn benchmark_latest(&self, asset: &str) -> Option<f64> {
        let now = chrono::Utc::now().timestamp();
        let from = now - 3600;
        match self.fetch_history(asset, "1", from, now).await {
            Ok(candles) => candles.last().map(|c| c.close),
            Err(e) => {
                warn!(asset, error = %e, "pyth benchmarks fetch failed");
                None
            }
        }
    }

    /// Fetch a window of historical candles at `resolution` minutes from the
    /// Pyth Benchmarks TradingView-shim endpoint.
    #[instrument(skip(self), name = "pyth::fetch_history")]
    pub async fn fetch_history(
        &self,
        asset: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>> {
        let symbol = format!("Crypto.{}/USD", asset.to_uppercase());
        let resp = self
            .http
            .get(&self.benchmarks_url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("resolution", resolution),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
            ])
            .send()
            .await
            .context("pyth benchmarks request failed")?;

        if !resp.status().is_success() {
            bail!("pyth benchmarks returned status {}", resp.status());
        }

        let body: BenchmarksHistoryResponse = resp
            .json()
            .await
            .context("failed to parse pyth benchmarks response")?;

        if body.s.as_deref() == Some("no_data") {
            return Ok(Vec::new());
        }

        let n = body.t.len();
        let mut candles = Vec::with_capacity(n);
        for i in 0..n {
            candles.push(Candle {
                timestamp: body.t[i],
                open: *body.o.get(i).unwrap_or(&0.0),
                high: *body.h.get(i).unwrap_or(&0.0),
                low: *body.l.get(i).unwrap_or(&0.0),
                close: *body.c.get(i).unwrap_or(&0.0),
                volume: *body.v.get(i).unwrap_or(&0.0),
            });
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmarks_response_parses_no_data_sentinel() {
        let json = r#"{"s": "no_data"}"#;
        let parsed: BenchmarksHistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.s.as_deref(), Some("no_data"));
        assert!(parsed.t.is_empty());
    }

    #[test]
    fn benchmarks_response_parses_ok_payload() {
        let json = r#"{"s":"ok","t":[1,2],"o":[10.0,11.0],"h":[11.0,12.0],"l":[9.0,10.0],"c":[10.5,11.5],"v":[100.0,200.0]}"#;
        let parsed: BenchmarksHistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.t.len(), 2);
        assert_eq!(parsed.c[1], 11.5);
    }
}
