// =============================================================================
// Trade Executor -- the ten-step `execute_trade` contract (SPEC_FULL.md §4.E)
// =============================================================================
//
// Grounded in `original_source/api/execution/trade_executor.py::TradeExecutor`,
// generalized from its single-vault/single-asset shape to the generic
// `(vault, asset, direction)` call the scheduler drives.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::Middleware;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Eip1559TransactionRequest, TransactionReceipt, U256};
use tracing::{error, info, warn};

use crate::chain::abi::POOL_LOGIC_ABI;
use crate::chain::ChainReader;
use crate::config::AppConfig;
use crate::order_builder::{self, OrderPayload};
use crate::types::{SignalDirection, TradeOutcome};

/// A trading signal as the executor consumes it -- the minimal slice of
/// `SignalLogRow` needed to drive one `execute_trade` call.
#[derive(Debug, Clone)]
pub struct Signal {
    pub asset: String,
    pub direction: SignalDirection,
    pub current_price: f64,
    pub size_pct: f64,
}

pub struct TradeExecutor {
    config: Arc<AppConfig>,
    reader: Arc<ChainReader>,
    wallet: Option<LocalWallet>,
    weth_address: Address,
}

impl TradeExecutor {
    pub fn new(config: Arc<AppConfig>, reader: Arc<ChainReader>, wallet: Option<LocalWallet>, weth_address: Address) -> Self {
        Self {
            config,
            reader,
            wallet,
            weth_address,
        }
    }

    /// Execute (or open/close) a trade per the signal, following the
    /// ten-step contract. `size_usd_override` bypasses TVL-based sizing,
    /// used by the manual-trade HTTP endpoint.
    pub async fn execute_trade(
        &self,
        signal: &Signal,
        vault_address: Address,
        is_closing: bool,
        size_usd_override: Option<f64>,
    ) -> TradeOutcome {
        // Step 1: non-actionable signal.
        if !signal.direction.is_actionable() && !is_closing {
            return TradeOutcome::noop("signal not actionable");
        }

        // Step 2: master trading switch.
        if !self.config.trading_enabled() {
            return TradeOutcome::failed("trading disabled", false);
        }

        // Step 3: signing key.
        let Some(wallet) = self.wallet.clone() else {
            return TradeOutcome::failed("missing trader private key", false);
        };

        // Step 4: market resolution.
        let market = match self.reader.resolve_market_address(&signal.asset).await {
            Ok(m) => m,
            Err(e) => return TradeOutcome::failed(format!("unknown market for {}: {e}", signal.asset), true),
        };

        // Step 5: long-token pre-flight.
        if !is_closing {
            match self.reader.resolve_long_token(market).await {
                Some(long_token) => match self.reader.supported_assets(vault_address).await {
                    Ok(assets) => {
                        let supported = assets.iter().any(|(addr, _)| *addr == long_token);
                        if !supported {
                            return TradeOutcome::failed(
                                format!(
                                    "vault is missing the market's long token ({long_token:#x}) in supported assets; \
                                     add it via changeAssets() on PoolManagerLogic before trading"
                                ),
                                true,
                            );
                        }
                    }
                    Err(e) => {
                        warn!(vault = ?vault_address, error = %e, "could not validate vault assets, proceeding");
                    }
                },
                None => {
                    warn!(market = ?market, "could not resolve long token, skipping pre-flight check");
                }
            }
        }

        // Step 6: size calculation.
        let is_long = signal.direction == SignalDirection::Long;
        let size_usd = match size_usd_override.filter(|s| *s > 0.0) {
            Some(size) => size,
            None => match self.calculate_size_usd(vault_address, signal.size_pct).await {
                Some(size) => size,
                None => return TradeOutcome::noop("computed trade size is zero"),
            },
        };
        if size_usd <= 0.0 {
            return TradeOutcome::noop("computed trade size is zero");
        }

        // Step 7: build calldata.
        let gas_price = match self.reader.current_gas_price().await {
            Ok(p) => p,
            Err(e) => return TradeOutcome::failed(format!("failed to fetch gas price: {e}"), true),
        };
        let payload_result = if is_closing {
            order_builder::build_decrease_order(
                &self.config,
                vault_address,
                market,
                self.weth_address,
                size_usd,
                is_long,
                signal.current_price,
                gas_price,
            )
        } else {
            order_builder::build_increase_order(
                &self.config,
                vault_address,
                market,
                self.weth_address,
                size_usd,
                is_long,
                signal.current_price,
                gas_price,
            )
        };
        let payload: OrderPayload = match payload_result {
            Ok(p) => p,
            Err(e) => return TradeOutcome::failed(format!("failed to build order calldata: {e}"), true),
        };

        // Step 8-9: sign, submit, confirm.
        match self.submit_and_confirm(vault_address, &wallet, &payload).await {
            Ok((tx_hash, gas_used)) => {
                info!(
                    vault = ?vault_address,
                    asset = %signal.asset,
                    size_usd,
                    tx = %tx_hash,
                    "trade executed"
                );
                TradeOutcome::submitted(tx_hash, gas_used)
            }
            Err(e) => {
                error!(vault = ?vault_address, error = %e, "trade execution failed");
                TradeOutcome::failed(e.to_string(), true)
            }
        }
    }

    /// `tvl * size_pct`, capped by available collateral and execution-fee
    /// balances, per step 6. Returns `None` when the vault cannot afford
    /// any trade.
    async fn calculate_size_usd(&self, vault_address: Address, size_pct: f64) -> Option<f64> {
        let tvl = self.reader.tvl(vault_address).await;
        if tvl <= 0.0 {
            warn!(vault = ?vault_address, "vault has zero TVL, cannot size a trade");
            return None;
        }

        let mut size_usd = tvl * size_pct;
        let leverage = self.config.gmx_default_leverage.max(1.0);
        let collateral_needed = size_usd / leverage;

        let usdc_balance = self
            .reader
            .token_balance(self.config.gmx.collateral_token, vault_address, 6)
            .await
            .unwrap_or(0.0);
        if collateral_needed > usdc_balance {
            let max_size = usdc_balance * leverage * 0.95;
            if max_size < 1.0 {
                warn!(vault = ?vault_address, usdc_balance, "USDC balance too low for any trade");
                return None;
            }
            info!(from = size_usd, to = max_size, "capping trade size to available collateral");
            size_usd = max_size;
        }

        let weth_balance = self.reader.token_balance(self.weth_address, vault_address, 18).await.unwrap_or(0.0);
        let gas_price = self.reader.current_gas_price().await.unwrap_or_default();
        let execution_fee_eth =
            order_builder::calculate_execution_fee(gas_price, self.config.gmx_execution_fee_wei_floor).as_u128() as f64 / 1e18;
        if weth_balance < execution_fee_eth {
            warn!(vault = ?vault_address, weth_balance, execution_fee_eth, "WETH balance insufficient for execution fee");
            return None;
        }

        Some(size_usd)
    }

    /// Sign and broadcast the vault's `execTransaction(exchange_router, calldata)`
    /// call, then poll for a receipt. Gas pricing follows
    /// `original_source/api/execution/trade_executor.py::_execute_via_vault`:
    /// EIP-1559 with `max_fee_per_gas = gas_price * 2` and
    /// `max_priority_fee_per_gas = 0.1 gwei`.
    async fn submit_and_confirm(
        &self,
        vault_address: Address,
        wallet: &LocalWallet,
        payload: &OrderPayload,
    ) -> anyhow::Result<(String, u64)> {
        use ethers::providers::{Http, Provider};

        let provider = Provider::<Http>::try_from(self.config.arbitrum_rpc_url.as_str())?;
        let abi: ethers::abi::Abi = serde_json::from_str(POOL_LOGIC_ABI)?;
        let call_data = abi.function("execTransaction")?.encode_input(&[
            ethers::abi::Token::Address(self.config.gmx.exchange_router),
            ethers::abi::Token::Bytes(payload.calldata.to_vec()),
        ])?;

        let nonce = provider.get_transaction_count(wallet.address(), None).await?;
        let gas_price = provider.get_gas_price().await?;

        let estimate_request = Eip1559TransactionRequest::new()
            .to(vault_address)
            .data(call_data.clone())
            .from(wallet.address());
        let estimate_typed: ethers::types::transaction::eip2718::TypedTransaction = estimate_request.clone().into();
        let gas_limit = match provider.estimate_gas(&estimate_typed, None).await {
            Ok(g) => g * 13 / 10,
            Err(e) => anyhow::bail!("transaction will revert on-chain: {e}"),
        };

        let tx = estimate_request
            .nonce(nonce)
            .gas(gas_limit)
            .chain_id(self.config.arbitrum_chain_id)
            .max_fee_per_gas(gas_price * 2)
            .max_priority_fee_per_gas(U256::from(100_000_000u64)); // 0.1 gwei

        let typed_tx: ethers::types::transaction::eip2718::TypedTransaction = tx.into();
        let signature = wallet.sign_transaction(&typed_tx).await?;
        let raw_tx = typed_tx.rlp_signed(&signature);

        let pending = provider.send_raw_transaction(raw_tx).await?;
        let tx_hash = format!("{:#x}", pending.tx_hash());

        let receipt = self.poll_for_receipt(&provider, pending.tx_hash()).await?;
        let status = receipt.status.map(|s| s.as_u64()).unwrap_or(0);
        if status == 0 {
            anyhow::bail!("transaction reverted: {tx_hash}");
        }
        let gas_used = receipt.gas_used.map(|g| g.as_u64()).unwrap_or(0);
        Ok((tx_hash, gas_used))
    }

    async fn poll_for_receipt(
        &self,
        provider: &ethers::providers::Provider<ethers::providers::Http>,
        tx_hash: ethers::types::H256,
    ) -> anyhow::Result<TransactionReceipt> {
        let timeout = Duration::from_secs(120);
        let poll_interval = Duration::from_secs(2);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Ok(Some(receipt)) = provider.get_transaction_receipt(tx_hash).await {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("transaction confirmation timeout after {}s: {:#x}", timeout.as_secs(), tx_hash);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
