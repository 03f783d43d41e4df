// =============================================================================
// Central Application State — Vault Execution Engine
// =============================================================================
//
// The single source of truth shared by the scheduler, the HTTP API, and the
// referral indexer. All subsystems hold Arc references to their own state;
// AppState ties them together.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared collections.
//   - Arc wrappers for subsystem engines that manage their own interior
//     mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use ethers::signers::Signer;
use parking_lot::RwLock;
use serde::Serialize;

use crate::chain::ChainReader;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::AppConfig;
use crate::executor::TradeExecutor;
use crate::market_data::MarketDataFeed;
use crate::persistence::PersistenceGateway;
use crate::referral_indexer::ReferralIndexer;
use crate::strategy::StrategyRegistry;

/// Maximum number of recent errors to retain for the detailed health endpoint.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the detailed health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: String,
}

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// state mutation so read endpoints can report freshness cheaply.
    pub state_version: AtomicU64,

    pub config: Arc<AppConfig>,
    pub market_data: Arc<MarketDataFeed>,
    pub chain: Arc<ChainReader>,
    pub persistence: Arc<PersistenceGateway>,
    pub strategies: Arc<StrategyRegistry>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub executor: Arc<TradeExecutor>,
    pub referral_indexer: Arc<ReferralIndexer>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        market_data: Arc<MarketDataFeed>,
        chain: Arc<ChainReader>,
        persistence: Arc<PersistenceGateway>,
    ) -> Self {
        let strategies = Arc::new(StrategyRegistry::new());
        let circuit_breaker = Arc::new(CircuitBreaker::new());
        let referral_indexer = Arc::new(ReferralIndexer::new(&config, persistence.clone()));

        let wallet = config.trader_private_key.map(|key| {
            ethers::signers::LocalWallet::from_bytes(key.as_bytes())
                .expect("private key bytes already validated at config load")
                .with_chain_id(config.arbitrum_chain_id)
        });
        let weth_address = config
            .gmx_market_addresses
            .get("WETH")
            .copied()
            .unwrap_or_else(|| "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1".parse().expect("static WETH address is valid"));
        let executor = Arc::new(TradeExecutor::new(config.clone(), chain.clone(), wallet, weth_address));

        Self {
            state_version: AtomicU64::new(0),
            config,
            market_data,
            chain,
            persistence,
            strategies,
            circuit_breaker,
            executor,
            referral_indexer,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Atomically increment the state version.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: impl Into<String>) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message: msg.into(),
            at: Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        self.increment_version();
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
