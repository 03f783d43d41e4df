// =============================================================================
// Referral Indexer -- scheduling hook only (SPEC_FULL.md §4.G, §1 Non-goals)
// =============================================================================
//
// The referral program's event decoding and attribution bookkeeping are out
// of core scope; what's in scope is the scheduling contract this module
// implements: enabled-gating, a chunked block-range scan bounded by a
// confirmation depth, and a persisted cursor. Grounded in
// `original_source/api/services/referral_indexer.py::ReferralEventIndexer`.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Filter, H160};
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::persistence::PersistenceGateway;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexResult {
    Disabled,
    Waiting,
    Idle { last_processed_block: i64 },
    Indexed { from_block: i64, to_block: i64, events_found: usize },
}

pub struct ReferralIndexer {
    provider: Option<Provider<Http>>,
    persistence: Arc<PersistenceGateway>,
    contracts: Vec<H160>,
    start_block: u64,
    chunk_size: u64,
    confirmations: u64,
    pub enabled: bool,
}

impl ReferralIndexer {
    pub fn new(config: &AppConfig, persistence: Arc<PersistenceGateway>) -> Self {
        let enabled = config.referral_indexer_enabled;
        let provider = if enabled {
            Provider::<Http>::try_from(config.arbitrum_rpc_url.as_str()).ok()
        } else {
            None
        };
        let contracts = [
            config.referral_registry_address,
            config.referral_deposit_router_address,
            config.referral_reward_pool_address,
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            provider,
            persistence,
            contracts,
            start_block: config.referral_indexer_start_block,
            chunk_size: config.referral_indexer_chunk_size,
            confirmations: config.referral_indexer_confirmations,
            enabled: enabled && provider_present(config),
        }
    }

    /// One indexing pass: advance the persisted cursor by at most
    /// `chunk_size` blocks, bounded by `confirmations` behind the chain tip.
    pub async fn index_once(&self) -> Result<IndexResult> {
        let Some(provider) = &self.provider else {
            return Ok(IndexResult::Disabled);
        };
        if !self.enabled {
            return Ok(IndexResult::Disabled);
        }

        let latest_block = provider.get_block_number().await.context("failed to fetch latest block")?.as_u64();
        let max_indexable = latest_block.saturating_sub(self.confirmations);
        if max_indexable < self.start_block {
            return Ok(IndexResult::Waiting);
        }

        let cursor = self.persistence.referral_indexer_cursor().await?.unwrap_or(-1);
        let from_block = (cursor + 1).max(self.start_block as i64) as u64;
        if from_block > max_indexable {
            return Ok(IndexResult::Idle {
                last_processed_block: cursor,
            });
        }

        let to_block = (from_block + self.chunk_size - 1).min(max_indexable);

        let mut events_found = 0usize;
        for contract in &self.contracts {
            let filter = Filter::new().address(*contract).from_block(from_block).to_block(to_block);
            let logs = provider.get_logs(&filter).await.context("eth_getLogs failed")?;
            events_found += logs.len();
        }

        self.persistence.set_referral_indexer_cursor(to_block as i64).await?;
        info!(from_block, to_block, events_found, "referral indexer advanced");

        Ok(IndexResult::Indexed {
            from_block: from_block as i64,
            to_block: to_block as i64,
            events_found,
        })
    }
}

fn provider_present(config: &AppConfig) -> bool {
    !config.arbitrum_rpc_url.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_result_serializes_with_status_tag() {
        let disabled = serde_json::to_value(IndexResult::Disabled).unwrap();
        assert_eq!(disabled["status"], "disabled");
        let idle = serde_json::to_value(IndexResult::Idle { last_processed_block: 5 }).unwrap();
        assert_eq!(idle["status"], "idle");
        assert_eq!(idle["last_processed_block"], 5);
    }
}
