// =============================================================================
// Signing key loading (SPEC_FULL.md §6 `TRADER_PRIVATE_KEY`)
// =============================================================================

use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;

/// Wraps the configured signing key, binding it to the configured chain id
/// so every signed transaction carries the right `chainId` (SPEC_FULL.md
/// §9 -- chain id is strictly configuration-driven, never hardcoded).
pub fn load_wallet(private_key: &H256, chain_id: u64) -> Result<LocalWallet> {
    let wallet = LocalWallet::from_bytes(private_key.as_bytes())
        .context("failed to derive wallet from TRADER_PRIVATE_KEY")?;
    Ok(wallet.with_chain_id(chain_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wallet_derives_consistent_address() {
        let key = H256::from_low_u64_be(1);
        let wallet_a = load_wallet(&key, 42161).unwrap();
        let wallet_b = load_wallet(&key, 42161).unwrap();
        assert_eq!(wallet_a.address(), wallet_b.address());
        assert_eq!(wallet_a.chain_id(), 42161);
    }
}
