// =============================================================================
// Shared types used across the vault execution engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional recommendation produced by a strategy for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Short,
    Neutral,
    Long,
}

impl SignalDirection {
    pub fn from_i8(v: i8) -> Self {
        match v.signum() {
            1 => Self::Long,
            -1 => Self::Short,
            _ => Self::Neutral,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Neutral => 0,
            Self::Short => -1,
        }
    }

    pub fn is_actionable(self) -> bool {
        self != Self::Neutral
    }
}

impl Default for SignalDirection {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// GMX V2 order type, encoded as the integer the `createOrder` ABI expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    MarketIncrease,
    MarketDecrease,
}

impl OrderType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::MarketIncrease => 2,
            Self::MarketDecrease => 4,
        }
    }
}

/// Lifecycle status of a registered vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Active,
    Paused,
}

impl Default for VaultStatus {
    fn default() -> Self {
        Self::Paused
    }
}

/// Lifecycle status of a strategy artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Preview,
    Deployable,
    Deployed,
}

/// The interval token stored on a vault row, mapped to a fixed number of
/// seconds by [`CheckInterval::as_seconds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl CheckInterval {
    pub fn as_seconds(self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::OneHour => 3600,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "1h" => Some(Self::OneHour),
            "4h" => Some(Self::FourHours),
            "1d" => Some(Self::OneDay),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }
}

impl std::fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Outcome of a single trade submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TradeOutcome {
    /// Executed (or deliberately skipped as not-actionable) without error.
    Success {
        tx_hash: Option<String>,
        gas_used: Option<u64>,
        note: Option<String>,
    },
    /// Failed for any reason in the executor's taxonomy (see `ExecutorError`).
    Failed { error: String, counts_toward_breaker: bool },
}

impl TradeOutcome {
    pub fn noop(note: &str) -> Self {
        Self::Success {
            tx_hash: None,
            gas_used: None,
            note: Some(note.to_string()),
        }
    }

    pub fn submitted(tx_hash: String, gas_used: u64) -> Self {
        Self::Success {
            tx_hash: Some(tx_hash),
            gas_used: Some(gas_used),
            note: None,
        }
    }

    pub fn failed(error: impl Into<String>, counts_toward_breaker: bool) -> Self {
        Self::Failed {
            error: error.into(),
            counts_toward_breaker,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Side recorded on a `TradeRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
    Close,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Close => write!(f, "CLOSE"),
        }
    }
}

/// Recommended action computed by the position-reconciliation state machine
/// (SPEC_FULL.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Noop,
    Close,
    Open,
    CloseThenOpen,
}

/// Reduce (desired_dir, current_dir) to the action the executor must take.
pub fn reconcile(desired: SignalDirection, current: SignalDirection) -> ReconcileAction {
    use SignalDirection::*;
    match (desired, current) {
        (Neutral, Neutral) => ReconcileAction::Noop,
        (Neutral, _) => ReconcileAction::Close,
        (Long, Long) | (Short, Short) => ReconcileAction::Noop,
        (Long, Short) | (Short, Long) => ReconcileAction::CloseThenOpen,
        (_, Neutral) => ReconcileAction::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_matches_state_machine_table() {
        use SignalDirection::*;
        assert_eq!(reconcile(Neutral, Neutral), ReconcileAction::Noop);
        assert_eq!(reconcile(Neutral, Long), ReconcileAction::Close);
        assert_eq!(reconcile(Neutral, Short), ReconcileAction::Close);
        assert_eq!(reconcile(Long, Long), ReconcileAction::Noop);
        assert_eq!(reconcile(Short, Short), ReconcileAction::Noop);
        assert_eq!(reconcile(Long, Short), ReconcileAction::CloseThenOpen);
        assert_eq!(reconcile(Short, Long), ReconcileAction::CloseThenOpen);
        assert_eq!(reconcile(Long, Neutral), ReconcileAction::Open);
        assert_eq!(reconcile(Short, Neutral), ReconcileAction::Open);
    }

    #[test]
    fn check_interval_round_trips_tokens() {
        for token in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let parsed = CheckInterval::parse(token).unwrap();
            assert_eq!(parsed.as_token(), token);
        }
        assert!(CheckInterval::parse("2m").is_none());
    }

    #[test]
    fn check_interval_seconds_mapping() {
        assert_eq!(CheckInterval::OneMinute.as_seconds(), 60);
        assert_eq!(CheckInterval::FiveMinutes.as_seconds(), 300);
        assert_eq!(CheckInterval::FifteenMinutes.as_seconds(), 900);
        assert_eq!(CheckInterval::OneHour.as_seconds(), 3600);
        assert_eq!(CheckInterval::FourHours.as_seconds(), 14_400);
        assert_eq!(CheckInterval::OneDay.as_seconds(), 86_400);
    }

    #[test]
    fn signal_direction_from_i8_clamps_sign() {
        assert_eq!(SignalDirection::from_i8(5), SignalDirection::Long);
        assert_eq!(SignalDirection::from_i8(-3), SignalDirection::Short);
        assert_eq!(SignalDirection::from_i8(0), SignalDirection::Neutral);
    }
}
