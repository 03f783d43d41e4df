use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::persistence::gateway::PersistenceGateway;

use super::candle_buffer::{merge_persisted_and_live, resample, Candle, CandleBuffer};
use super::pyth::PythClient;

/// Combines the in-memory ring buffer with the Pyth client and the
/// persistence gateway into the single `latest_price` / `candles` /
/// `start_polling` surface described in SPEC_FULL.md §4.A.
pub struct MarketDataFeed {
    buffer: Arc<CandleBuffer>,
    pyth: PythClient,
    gateway: Arc<PersistenceGateway>,
    tracked_assets: RwLock<HashSet<String>>,
}

impl MarketDataFeed {
    pub fn new(pyth: PythClient, gateway: Arc<PersistenceGateway>, capacity: usize) -> Self {
        Self {
            buffer: Arc::new(CandleBuffer::new(capacity)),
            pyth,
            gateway,
            tracked_assets: RwLock::new(HashSet::new()),
        }
    }

    pub fn buffer(&self) -> Arc<CandleBuffer> {
        self.buffer.clone()
    }

    fn track(&self, asset: &str) {
        self.tracked_assets.write().insert(asset.to_uppercase());
    }

    /// Latest price for `asset`. Returns 0.0 (the documented sentinel) on
    /// total failure rather than propagating an error -- callers treat
    /// `<= 0.0` as "missing" (SPEC_FULL.md §4.A, §7 `DataMissing`).
    pub async fn latest_price(&self, asset: &str) -> f64 {
        self.track(asset);
        if let Some(close) = self.buffer.last_close(asset) {
            if close > 0.0 {
                return close;
            }
        }
        match self.pyth.latest_price(asset).await {
            Some(price) if price > 0.0 => price,
            _ => {
                warn!(asset, "latest_price unavailable from buffer and oracle/benchmark");
                0.0
            }
        }
    }

    /// Candles for `asset` at `timeframe`, merging persisted rows with the
    /// live ring buffer for the base "1m" timeframe, or resampling for
    /// coarser ones (SPEC_FULL.md §4.A).
    pub async fn candles(&self, asset: &str, timeframe: &str, limit: usize) -> Vec<Candle> {
        self.track(asset);
        let persisted = self
            .gateway
            .recent_candles(asset, "1m", limit)
            .await
            .unwrap_or_else(|e| {
                warn!(asset, error = %e, "failed to read persisted candles");
                Vec::new()
            });
        let live = self.buffer.recent(asset, limit);
        let merged_1m = merge_persisted_and_live(persisted, live);

        if timeframe == "1m" {
            let start = merged_1m.len().saturating_sub(limit);
            return merged_1m[start..].to_vec();
        }

        let bucket_seconds = timeframe_seconds(timeframe).unwrap_or(60);
        let resampled = resample(&merged_1m, bucket_seconds);
        let start = resampled.len().saturating_sub(limit);
        resampled[start..].to_vec()
    }

    /// Launch the single long-lived polling task. Every `interval_secs`, the
    /// latest price for each tracked asset is fetched and pushed into the
    /// ring buffer; on a minute-boundary transition the candle is also
    /// persisted. Errors are logged at warn level and never halt polling
    /// (SPEC_FULL.md §4.A error policy).
    pub fn start_polling(self: Arc<Self>, interval_secs: u64, assets: Vec<String>) {
        for asset in &assets {
            self.track(asset);
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            let mut last_minute: Option<i64> = None;
            loop {
                ticker.tick().await;
                let assets: Vec<String> = self.tracked_assets.read().iter().cloned().collect();
                let now = chrono::Utc::now().timestamp();
                let minute_bucket = (now / 60) * 60;
                let is_new_minute = last_minute != Some(minute_bucket);

                for asset in &assets {
                    let price = match self.pyth.latest_price(asset).await {
                        Some(p) if p > 0.0 => p,
                        _ => continue,
                    };

                    if is_new_minute {
                        let candle = Candle {
                            timestamp: minute_bucket,
                            open: price,
                            high: price,
                            low: price,
                            close: price,
                            volume: 0.0,
                        };
                        self.buffer.push(asset, candle);
                        if let Err(e) = self.gateway.insert_historical_candle(asset, "1m", candle).await {
                            warn!(asset, error = %e, "failed to persist polled candle");
                        }
                    } else if let Some(mut last) = self.buffer.recent(asset, 1).into_iter().last() {
                        last.high = last.high.max(price);
                        last.low = last.low.min(price);
                        last.close = price;
                        self.buffer.push(asset, last);
                    }
                }

                if is_new_minute {
                    last_minute = Some(minute_bucket);
                }
            }
        });
        info!("market data polling task started");
    }
}

fn timeframe_seconds(timeframe: &str) -> Option<i64> {
    match timeframe.to_ascii_lowercase().as_str() {
        "1m" => Some(60),
        "5m" => Some(300),
        "15m" => Some(900),
        "1h" | "1H" => Some(3600),
        "4h" | "4H" => Some(14_400),
        "1d" => Some(86_400),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_seconds_covers_known_tokens() {
        assert_eq!(timeframe_seconds("1m"), Some(60));
        assert_eq!(timeframe_seconds("1h"), Some(3600));
        assert_eq!(timeframe_seconds("4h"), Some(14_400));
        assert_eq!(timeframe_seconds("bogus"), None);
    }
}
