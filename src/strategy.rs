// =============================================================================
// Strategy trait and static registry (SPEC_FULL.md §6 "Strategy artifact
// contract", §9 Design Notes option (c))
// =============================================================================
//
// `original_source/api/execution/strategy_loader.py` loads strategies
// dynamically from `.py` files on disk and caches them by slug in a process-
// wide dict. A compiled target can't load code at runtime the same way, so
// this keeps the slug-keyed cache idiom but resolves each slug to a
// statically-linked `Box<dyn Strategy>` instead of a dynamically imported
// module (DESIGN.md open-question resolution 1).
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::market_data::Candle;

/// Metadata a strategy exposes about itself, mirroring
/// `LoadedStrategy`'s `asset`/`timeframe`/`stop_loss_pct`/`take_profit_pct`
/// properties.
#[derive(Debug, Clone)]
pub struct StrategyMeta {
    pub asset: String,
    pub timeframe: String,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for StrategyMeta {
    fn default() -> Self {
        Self {
            asset: "BTC".to_string(),
            timeframe: "1H".to_string(),
            stop_loss_pct: 0.02,
            take_profit_pct: 0.05,
        }
    }
}

/// A pluggable signal generator: given a closed-candle history, produce one
/// desired direction per candle in {-1, 0, +1}.
pub trait Strategy: Send + Sync {
    fn slug(&self) -> &str;
    fn meta(&self) -> StrategyMeta;
    /// Length of the returned vector always matches `candles.len()`.
    fn generate_signals(&self, candles: &[Candle]) -> Vec<i8>;
}

/// Slug -> strategy cache, equivalent to `_strategy_cache` in the original
/// loader; here the registry is populated once at startup with the
/// statically-linked strategies rather than lazily from disk.
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, std::sync::Arc<dyn Strategy>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let mut strategies: HashMap<String, std::sync::Arc<dyn Strategy>> = HashMap::new();
        let baseline = crate::strategies::baseline_marketgod::BaselineMarketGod::default();
        strategies.insert(baseline.slug().to_string(), std::sync::Arc::new(baseline));
        Self {
            strategies: RwLock::new(strategies),
        }
    }

    pub fn get(&self, slug: &str) -> Option<std::sync::Arc<dyn Strategy>> {
        self.strategies.read().get(slug).cloned()
    }

    pub fn register(&self, strategy: std::sync::Arc<dyn Strategy>) {
        self.strategies.write().insert(strategy.slug().to_string(), strategy);
    }

    pub fn slugs(&self) -> Vec<String> {
        self.strategies.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_baseline_by_slug() {
        let registry = StrategyRegistry::new();
        assert!(registry.get("baseline-marketgod").is_some());
        assert!(registry.get("not-a-real-strategy").is_none());
    }
}
