// =============================================================================
// Circuit Breaker -- per-vault consecutive-failure trip with cooldown
// =============================================================================
//
// Grounded in `risk.rs`'s `RwLock<Inner>`-behind-a-struct shape, simplified
// to the single-dimension, per-vault model SPEC_FULL.md §4.F specifies:
// no daily reset, no multiple breaker kinds, just a failure counter and a
// trip timestamp per vault address.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{error, info};

pub const FAILURE_THRESHOLD: u32 = 5;
pub const COOLDOWN_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy)]
struct BreakerEntry {
    consecutive_failures: u32,
    tripped_at: Option<DateTime<Utc>>,
}

/// Snapshot of a vault's breaker state for the vault-health read endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakerStatus {
    pub consecutive_failures: u32,
    pub tripped: bool,
    pub cooldown_remaining_seconds: i64,
}

pub struct CircuitBreaker {
    entries: RwLock<HashMap<String, BreakerEntry>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Record the outcome of a trade attempt for `vault_address`.
    /// `success = true` clears the entry; `false` increments the failure
    /// count and trips the breaker once the threshold is reached.
    pub fn record(&self, vault_address: &str, success: bool) {
        let key = vault_address.to_lowercase();
        let mut entries = self.entries.write();

        if success {
            entries.remove(&key);
            return;
        }

        let entry = entries.entry(key.clone()).or_insert(BreakerEntry {
            consecutive_failures: 0,
            tripped_at: None,
        });
        entry.consecutive_failures += 1;

        if entry.consecutive_failures >= FAILURE_THRESHOLD && entry.tripped_at.is_none() {
            entry.tripped_at = Some(Utc::now());
            error!(
                vault = %key,
                failures = entry.consecutive_failures,
                "circuit breaker tripped -- vault suspended from trading"
            );
        }
    }

    /// Whether `vault_address` is currently tripped. Auto-recovers (and
    /// removes the entry) once the cooldown has elapsed.
    pub fn is_broken(&self, vault_address: &str) -> bool {
        let key = vault_address.to_lowercase();

        {
            let entries = self.entries.read();
            let Some(entry) = entries.get(&key) else { return false };
            let Some(tripped_at) = entry.tripped_at else { return false };
            if entry.consecutive_failures < FAILURE_THRESHOLD {
                return false;
            }
            let elapsed = (Utc::now() - tripped_at).num_seconds();
            if elapsed < COOLDOWN_SECONDS {
                return true;
            }
        }

        // Cooldown elapsed -- clear under the write lock and report recovered.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key) {
            let elapsed = entry
                .tripped_at
                .map(|t| (Utc::now() - t).num_seconds())
                .unwrap_or(i64::MAX);
            if elapsed >= COOLDOWN_SECONDS {
                entries.remove(&key);
                info!(vault = %key, "circuit breaker cooldown elapsed -- vault recovered");
            }
        }
        false
    }

    pub fn status(&self, vault_address: &str) -> BreakerStatus {
        let key = vault_address.to_lowercase();
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) => {
                let tripped = entry.consecutive_failures >= FAILURE_THRESHOLD && entry.tripped_at.is_some();
                let remaining = entry
                    .tripped_at
                    .map(|t| (COOLDOWN_SECONDS - (Utc::now() - t).num_seconds()).max(0))
                    .unwrap_or(0);
                BreakerStatus {
                    consecutive_failures: entry.consecutive_failures,
                    tripped,
                    cooldown_remaining_seconds: if tripped { remaining } else { 0 },
                }
            }
            None => BreakerStatus {
                consecutive_failures: 0,
                tripped: false,
                cooldown_remaining_seconds: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_entry() {
        let cb = CircuitBreaker::new();
        for _ in 0..3 {
            cb.record("0xabc", false);
        }
        assert_eq!(cb.status("0xabc").consecutive_failures, 3);
        cb.record("0xabc", true);
        assert_eq!(cb.status("0xabc").consecutive_failures, 0);
        assert!(!cb.is_broken("0xabc"));
    }

    #[test]
    fn trips_at_threshold() {
        let cb = CircuitBreaker::new();
        for _ in 0..(FAILURE_THRESHOLD - 1) {
            cb.record("0xdef", false);
        }
        assert!(!cb.is_broken("0xdef"));
        cb.record("0xdef", false);
        assert!(cb.is_broken("0xdef"));
        assert!(cb.status("0xdef").tripped);
    }

    #[test]
    fn untracked_vault_is_not_broken() {
        let cb = CircuitBreaker::new();
        assert!(!cb.is_broken("0xnew"));
        assert_eq!(cb.status("0xnew").consecutive_failures, 0);
    }

    #[test]
    fn case_insensitive_address_tracking() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            cb.record("0xABC", false);
        }
        assert!(cb.is_broken("0xabc"));
    }
}
