// =============================================================================
// Order Builder -- pure calldata assembly for GMX V2 MarketIncrease/Decrease
// orders (SPEC_FULL.md §4.D). Grounded in
// `original_source/api/execution/trade_executor.py`'s `_build_order_calldata`
// / `_build_close_order_calldata`.
// =============================================================================
//
// Everything here is arithmetic and ABI encoding; no chain reads and no
// signing. The Trade Executor supplies all the values this module needs
// (market address, size, price, gas price) so the builder stays a pure
// function of its inputs and is trivially unit-testable.
// =============================================================================

use anyhow::{bail, Result};
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, H256, U256};

use crate::chain::abi::GMX_EXCHANGE_ROUTER_ABI;
use crate::config::AppConfig;
use crate::types::OrderType;

/// Base gas GMX V2.1 allots for order execution on Arbitrum, before the
/// callback gas limit and safety margin.
const BASE_EXECUTION_GAS: u64 = 4_000_000;
const CALLBACK_GAS_LIMIT: u64 = 750_000;
/// Safety margin applied to the computed execution fee so keepers always
/// accept the order.
const EXECUTION_FEE_SAFETY_MULTIPLIER_NUM: u64 = 3;
const EXECUTION_FEE_SAFETY_MULTIPLIER_DEN: u64 = 2; // 1.5x

const PRICE_SCALE: f64 = 1e30;
const USDC_SCALE: f64 = 1e6;
const BPS_DENOMINATOR: f64 = 10_000.0;

/// A fully-encoded `execTransaction` payload, ready to be wrapped and signed
/// by the Trade Executor.
#[derive(Debug, Clone)]
pub struct OrderPayload {
    pub calldata: Bytes,
    pub execution_fee: U256,
    /// ETH value to attach to the vault's `execTransaction*` call. Always
    /// zero here -- the execution fee travels as a WETH token transfer
    /// inside the multicall, not as native value.
    pub value: U256,
    pub size_usd: f64,
}

/// `executionFee >= (baseGas + callbackGasLimit) * gasPrice`, with a 1.5x
/// safety margin, floored at the configured minimum.
pub fn calculate_execution_fee(gas_price: U256, floor_wei: u64) -> U256 {
    let total_gas = U256::from(BASE_EXECUTION_GAS + CALLBACK_GAS_LIMIT);
    let fee = gas_price * total_gas * U256::from(EXECUTION_FEE_SAFETY_MULTIPLIER_NUM)
        / U256::from(EXECUTION_FEE_SAFETY_MULTIPLIER_DEN);
    fee.max(U256::from(floor_wei))
}

fn acceptable_price_wei(current_price: f64, slippage_bps: u32, is_long: bool, closing: bool) -> U256 {
    let slippage = slippage_bps as f64 / BPS_DENOMINATOR;
    // Opening a long (or closing a short) wants the worst-case *higher*
    // price bound; opening a short (or closing a long) wants the worst-case
    // *lower* bound.
    let widen_up = is_long != closing;
    let factor = if widen_up { 1.0 + slippage } else { 1.0 - slippage };
    f64_to_u256_scaled(current_price * factor, PRICE_SCALE)
}

fn f64_to_u256_scaled(value: f64, scale: f64) -> U256 {
    let scaled = (value * scale).round();
    if scaled <= 0.0 {
        U256::zero()
    } else {
        U256::from(scaled as u128)
    }
}

fn exchange_router_abi() -> Abi {
    serde_json::from_str(GMX_EXCHANGE_ROUTER_ABI).expect("static ABI is valid JSON")
}

fn order_params_token(
    vault: Address,
    market: Address,
    collateral_token: Address,
    callback_contract: Address,
    ui_fee_receiver: Address,
    size_delta_usd: U256,
    collateral_delta_amount: U256,
    acceptable_price: U256,
    execution_fee: U256,
    order_type: OrderType,
    is_long: bool,
) -> Token {
    let addresses = Token::Tuple(vec![
        Token::Address(vault),
        Token::Address(Address::zero()),
        Token::Address(callback_contract),
        Token::Address(ui_fee_receiver),
        Token::Address(market),
        Token::Address(collateral_token),
        Token::Array(vec![]),
    ]);
    let numbers = Token::Tuple(vec![
        Token::Uint(size_delta_usd),
        Token::Uint(collateral_delta_amount),
        Token::Uint(U256::zero()), // triggerPrice
        Token::Uint(acceptable_price),
        Token::Uint(execution_fee),
        Token::Uint(U256::from(CALLBACK_GAS_LIMIT)),
        Token::Uint(U256::zero()), // minOutputAmount
        Token::Uint(U256::zero()), // validFromTime
    ]);
    Token::Tuple(vec![
        addresses,
        numbers,
        Token::Uint(U256::from(order_type.as_u8())),
        Token::Uint(U256::zero()), // decreasePositionSwapType: NoSwap
        Token::Bool(is_long),
        Token::Bool(false), // shouldUnwrapNativeToken
        Token::Bool(false), // autoCancel
        Token::FixedBytes(H256::zero().as_bytes().to_vec()),
        Token::Array(vec![]), // dataList
    ])
}

/// Build the multicall calldata for a MarketIncrease order (opening or
/// adding to a position).
pub fn build_increase_order(
    config: &AppConfig,
    vault: Address,
    market: Address,
    weth_address: Address,
    size_usd: f64,
    is_long: bool,
    current_price: f64,
    gas_price: U256,
) -> Result<OrderPayload> {
    if size_usd <= 0.0 {
        bail!("trade size must be positive, got {size_usd}");
    }
    if current_price <= 0.0 {
        bail!("current price must be positive to compute acceptablePrice");
    }

    let execution_fee = calculate_execution_fee(gas_price, config.gmx_execution_fee_wei_floor);
    let leverage = config.gmx_default_leverage.max(1.0);
    let collateral_usd = size_usd / leverage;
    let collateral_amount = f64_to_u256_scaled(collateral_usd, USDC_SCALE);
    let size_delta_usd = f64_to_u256_scaled(size_usd, PRICE_SCALE);
    let acceptable_price = acceptable_price_wei(current_price, config.gmx_slippage_bps, is_long, false);

    let abi = exchange_router_abi();
    let send_weth = abi
        .function("sendTokens")?
        .encode_input(&[
            Token::Address(weth_address),
            Token::Address(config.gmx.order_vault),
            Token::Uint(execution_fee),
        ])?;
    let send_collateral = abi
        .function("sendTokens")?
        .encode_input(&[
            Token::Address(config.gmx.collateral_token),
            Token::Address(config.gmx.order_vault),
            Token::Uint(collateral_amount),
        ])?;
    let create_order = abi.function("createOrder")?.encode_input(&[order_params_token(
        vault,
        market,
        config.gmx.collateral_token,
        config.gmx.callback_contract,
        config.gmx.ui_fee_receiver,
        size_delta_usd,
        collateral_amount,
        acceptable_price,
        execution_fee,
        OrderType::MarketIncrease,
        is_long,
    )])?;

    let multicall = abi.function("multicall")?.encode_input(&[Token::Array(vec![
        Token::Bytes(send_weth),
        Token::Bytes(send_collateral),
        Token::Bytes(create_order),
    ])])?;

    Ok(OrderPayload {
        calldata: Bytes::from(multicall),
        execution_fee,
        value: U256::zero(),
        size_usd,
    })
}

/// Build the multicall calldata for a MarketDecrease order (closing a
/// position). No collateral transfer -- only the execution fee moves.
pub fn build_decrease_order(
    config: &AppConfig,
    vault: Address,
    market: Address,
    weth_address: Address,
    size_usd: f64,
    is_long: bool,
    current_price: f64,
    gas_price: U256,
) -> Result<OrderPayload> {
    if size_usd <= 0.0 {
        bail!("trade size must be positive, got {size_usd}");
    }
    if current_price <= 0.0 {
        bail!("current price must be positive to compute acceptablePrice");
    }

    let execution_fee = calculate_execution_fee(gas_price, config.gmx_execution_fee_wei_floor);
    let size_delta_usd = f64_to_u256_scaled(size_usd, PRICE_SCALE);
    let acceptable_price = acceptable_price_wei(current_price, config.gmx_slippage_bps, is_long, true);

    let abi = exchange_router_abi();
    let send_weth = abi
        .function("sendTokens")?
        .encode_input(&[
            Token::Address(weth_address),
            Token::Address(config.gmx.order_vault),
            Token::Uint(execution_fee),
        ])?;
    let create_order = abi.function("createOrder")?.encode_input(&[order_params_token(
        vault,
        market,
        config.gmx.collateral_token,
        config.gmx.callback_contract,
        config.gmx.ui_fee_receiver,
        size_delta_usd,
        U256::zero(),
        acceptable_price,
        execution_fee,
        OrderType::MarketDecrease,
        is_long,
    )])?;

    let multicall = abi
        .function("multicall")?
        .encode_input(&[Token::Array(vec![Token::Bytes(send_weth), Token::Bytes(create_order)])])?;

    Ok(OrderPayload {
        calldata: Bytes::from(multicall),
        execution_fee,
        value: U256::zero(),
        size_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_fee_respects_floor() {
        let fee = calculate_execution_fee(U256::zero(), 100_000_000_000_000);
        assert_eq!(fee, U256::from(100_000_000_000_000u64));
    }

    #[test]
    fn execution_fee_scales_with_gas_price() {
        let cheap = calculate_execution_fee(U256::from(1_000_000_000u64), 0);
        let pricey = calculate_execution_fee(U256::from(10_000_000_000u64), 0);
        assert!(pricey > cheap);
    }

    #[test]
    fn acceptable_price_widens_up_for_long_open() {
        let ap = acceptable_price_wei(100.0, 50, true, false);
        assert!(ap > f64_to_u256_scaled(100.0, PRICE_SCALE));
    }

    #[test]
    fn acceptable_price_widens_down_for_long_close() {
        let ap = acceptable_price_wei(100.0, 50, true, true);
        assert!(ap < f64_to_u256_scaled(100.0, PRICE_SCALE));
    }

    #[test]
    fn f64_to_u256_scaled_handles_zero() {
        assert_eq!(f64_to_u256_scaled(0.0, PRICE_SCALE), U256::zero());
        assert_eq!(f64_to_u256_scaled(-5.0, PRICE_SCALE), U256::zero());
    }
}
