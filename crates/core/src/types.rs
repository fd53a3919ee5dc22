use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profiles::RiskProfile;

/// Percentage allocation of a portfolio across asset symbols.
///
/// Keys are asset symbols ("ETH", "USDC", ...), values are percentages of
/// total portfolio value. A `BTreeMap` keeps iteration order deterministic,
/// which drift analysis relies on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation(pub BTreeMap<String, f64>);

impl Allocation {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Percentage weight for a symbol; absent symbols weigh zero.
    #[must_use]
    pub fn weight(&self, symbol: &str) -> f64 {
        self.0.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, symbol: impl Into<String>, percent: f64) {
        self.0.insert(symbol.into(), percent);
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// Union of symbols present in either allocation, in sorted order.
    #[must_use]
    pub fn symbols_with(&self, other: &Self) -> Vec<String> {
        let mut symbols: Vec<String> = self.0.keys().cloned().collect();
        for sym in other.0.keys() {
            if !self.0.contains_key(sym) {
                symbols.push(sym.clone());
            }
        }
        symbols.sort();
        symbols
    }
}

impl<const N: usize> From<[(&str, f64); N]> for Allocation {
    fn from(entries: [(&str, f64); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(s, p)| (s.to_string(), p))
                .collect(),
        )
    }
}

/// Current portfolio observation returned by the allocation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub allocation: Allocation,
    pub total_value_usd: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Per-wallet monitoring settings and daily counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub wallet_address: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Minimum seconds between drift checks for this wallet.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold_percent: f64,
    /// Hard cap on executed (not suggested) rebalances per calendar day.
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    #[serde(default)]
    pub risk_profile: RiskProfile,
    #[serde(default)]
    pub auto_execute: bool,
    #[serde(default = "default_slippage")]
    pub slippage_tolerance_percent: f64,
    /// Wallets below this value are not acted on.
    #[serde(default = "default_min_value")]
    pub min_portfolio_value_usd: Decimal,
    #[serde(default)]
    pub daily_trades_count: u32,
    #[serde(default = "today_utc")]
    pub last_trade_reset: NaiveDate,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

const fn default_check_interval() -> u64 {
    900 // 15 minutes
}

const fn default_drift_threshold() -> f64 {
    5.0
}

const fn default_max_daily_trades() -> u32 {
    3
}

const fn default_slippage() -> f64 {
    1.0
}

fn default_min_value() -> Decimal {
    Decimal::from(100)
}

fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

impl MonitoringConfig {
    /// Creates a config with process-wide defaults for the given wallet.
    #[must_use]
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            enabled: true,
            check_interval_secs: default_check_interval(),
            drift_threshold_percent: default_drift_threshold(),
            max_daily_trades: default_max_daily_trades(),
            risk_profile: RiskProfile::default(),
            auto_execute: false,
            slippage_tolerance_percent: default_slippage(),
            min_portfolio_value_usd: default_min_value(),
            daily_trades_count: 0,
            last_trade_reset: today_utc(),
            last_check: None,
        }
    }

    /// Creates a config with the threshold and cap bias of a risk profile.
    #[must_use]
    pub fn for_profile(wallet_address: impl Into<String>, profile: RiskProfile) -> Self {
        let policy = profile.policy();
        Self {
            risk_profile: profile,
            drift_threshold_percent: policy.default_drift_threshold,
            max_daily_trades: policy.default_max_daily_trades,
            ..Self::new(wallet_address)
        }
    }

    /// Validates user-settable fields. Invalid configs are rejected before
    /// they are stored.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        use crate::errors::ConfigError;

        if self.wallet_address.trim().is_empty() {
            return Err(ConfigError::EmptyWalletAddress);
        }
        if self.check_interval_secs < 60 {
            return Err(ConfigError::IntervalTooShort {
                secs: self.check_interval_secs,
            });
        }
        if !self.drift_threshold_percent.is_finite() || self.drift_threshold_percent <= 0.0 {
            return Err(ConfigError::InvalidDriftThreshold {
                value: self.drift_threshold_percent,
            });
        }
        if self.max_daily_trades == 0 {
            return Err(ConfigError::ZeroDailyCap);
        }
        if !self.slippage_tolerance_percent.is_finite()
            || self.slippage_tolerance_percent <= 0.0
            || self.slippage_tolerance_percent > 50.0
        {
            return Err(ConfigError::InvalidSlippage {
                value: self.slippage_tolerance_percent,
            });
        }
        if self.min_portfolio_value_usd < Decimal::ZERO {
            return Err(ConfigError::NegativeValueFloor);
        }
        Ok(())
    }
}

/// Direction of the broad market trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Sideways,
}

/// Raw market inputs pulled from the external data feed each assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFactors {
    /// Annualized-style 24h volatility measure, e.g. 0.15 = 15%.
    pub volatility_24h: f64,
    /// 24h volume change relative to trailing average, e.g. 0.5 = +50%.
    pub volume_change_24h: f64,
    /// Average pairwise correlation across tracked majors, 0..1.
    pub average_pairwise_correlation: f64,
    /// 24h price change of the market basket in percent.
    pub price_change_24h_pct: f64,
}

/// Point-in-time assessment of systemic market risk.
///
/// Exactly one assessor task writes snapshots; every reader observes a
/// complete value, never a partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// 0 (calm) to 100 (extreme risk).
    pub risk_score: f64,
    pub volatility_high: bool,
    pub volume_spike: bool,
    pub correlation_breakdown: bool,
    pub trend_direction: TrendDirection,
    pub assessed_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Placeholder published before the first assessment completes. Dated at
    /// the epoch so it is immediately stale and decisions stay cautious.
    #[must_use]
    pub fn unassessed() -> Self {
        Self {
            risk_score: 50.0,
            volatility_high: false,
            volume_spike: false,
            correlation_breakdown: false,
            trend_direction: TrendDirection::Sideways,
            assessed_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.assessed_at) > max_age
    }

    /// Risk score with the fail-safe floor applied when the snapshot is
    /// stale. A stale snapshot is treated as at least `cautious_floor` risky.
    #[must_use]
    pub fn effective_risk_score(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
        cautious_floor: f64,
    ) -> f64 {
        if self.is_stale(now, max_age) {
            self.risk_score.max(cautious_floor)
        } else {
            self.risk_score
        }
    }
}

/// Discretized severity of total portfolio drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Result of comparing a current allocation against its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    /// Signed percentage-point difference (current - target) per symbol.
    pub per_asset_drift: BTreeMap<String, f64>,
    /// Sum of absolute per-asset drifts. Never negative.
    pub total_drift: f64,
    pub urgency: Urgency,
}

/// What a decision cycle resolved to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Evaluated, nothing to do.
    Skip,
    /// Drift warrants a rebalance but only a suggestion is recorded.
    Suggest,
    /// A rebalance was submitted for execution.
    Execute,
    /// The cycle failed before a decision could be made.
    Error,
}

impl ActionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Suggest => "suggest",
            Self::Execute => "execute",
            Self::Error => "error",
        }
    }
}

/// Execution service result reference for a submitted rebalance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub tx_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Confirmed,
}

/// Append-only record of one decision cycle and its outcome.
///
/// Created once, never mutated; the sole audit trail for why a wallet was
/// or wasn't touched on a given cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub wallet_address: String,
    pub action_type: ActionType,
    /// Engine reasoning, recorded verbatim.
    pub reasoning: String,
    pub drift: Option<DriftResult>,
    pub target_allocation: Option<Allocation>,
    pub config_snapshot: Option<MonitoringConfig>,
    pub execution: Option<ExecutionReceipt>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    fn base(wallet: &str, action_type: ActionType, reasoning: String, now: DateTime<Utc>) -> Self {
        Self {
            action_id: format!("act_{}", uuid::Uuid::new_v4().simple()),
            wallet_address: wallet.to_string(),
            action_type,
            reasoning,
            drift: None,
            target_allocation: None,
            config_snapshot: None,
            execution: None,
            error: None,
            timestamp: now,
        }
    }

    /// Record for an evaluated decision (skip/suggest/execute).
    #[must_use]
    pub fn decision(
        wallet: &str,
        action_type: ActionType,
        reasoning: String,
        drift: DriftResult,
        target: Allocation,
        config: MonitoringConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            drift: Some(drift),
            target_allocation: Some(target),
            config_snapshot: Some(config),
            ..Self::base(wallet, action_type, reasoning, now)
        }
    }

    /// Record for a cycle that failed before a decision was possible.
    #[must_use]
    pub fn cycle_error(wallet: &str, error: String, now: DateTime<Utc>) -> Self {
        Self {
            error: Some(error),
            ..Self::base(
                wallet,
                ActionType::Error,
                "monitoring cycle failed".to_string(),
                now,
            )
        }
    }

    #[must_use]
    pub fn with_execution(mut self, receipt: ExecutionReceipt) -> Self {
        self.execution = Some(receipt);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_missing_symbol_weighs_zero() {
        let alloc = Allocation::from([("ETH", 60.0), ("USDC", 40.0)]);
        assert!((alloc.weight("LINK") - 0.0).abs() < f64::EPSILON);
        assert!((alloc.total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn allocation_symbol_union_is_sorted_and_deduped() {
        let a = Allocation::from([("ETH", 60.0), ("LINK", 40.0)]);
        let b = Allocation::from([("USDC", 50.0), ("ETH", 50.0)]);
        assert_eq!(a.symbols_with(&b), vec!["ETH", "LINK", "USDC"]);
    }

    #[test]
    fn config_defaults_are_conservative_about_execution() {
        let config = MonitoringConfig::new("0xabc");
        assert!(config.enabled);
        assert!(!config.auto_execute);
        assert_eq!(config.daily_trades_count, 0);
        assert!(config.last_check.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_for_profile_applies_threshold_and_cap_bias() {
        let config = MonitoringConfig::for_profile("0xabc", RiskProfile::Conservative);
        assert!((config.drift_threshold_percent - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.max_daily_trades, 2);
    }

    #[test]
    fn config_validation_rejects_bad_fields() {
        let mut config = MonitoringConfig::new("0xabc");
        config.check_interval_secs = 10;
        assert!(config.validate().is_err());

        let mut config = MonitoringConfig::new("0xabc");
        config.drift_threshold_percent = -1.0;
        assert!(config.validate().is_err());

        let mut config = MonitoringConfig::new("0xabc");
        config.max_daily_trades = 0;
        assert!(config.validate().is_err());

        let mut config = MonitoringConfig::new("0xabc");
        config.slippage_tolerance_percent = 75.0;
        assert!(config.validate().is_err());

        let config = MonitoringConfig::new("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn urgency_ordering_is_monotonic() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
        assert!(Urgency::High < Urgency::Critical);
    }

    #[test]
    fn unassessed_snapshot_is_stale_immediately() {
        let snapshot = MarketSnapshot::unassessed();
        let now = Utc::now();
        assert!(snapshot.is_stale(now, Duration::minutes(15)));
        let effective = snapshot.effective_risk_score(now, Duration::minutes(15), 85.0);
        assert!((effective - 85.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fresh_snapshot_keeps_its_own_score() {
        let now = Utc::now();
        let snapshot = MarketSnapshot {
            risk_score: 40.0,
            volatility_high: false,
            volume_spike: false,
            correlation_breakdown: false,
            trend_direction: TrendDirection::Sideways,
            assessed_at: now,
        };
        assert!(!snapshot.is_stale(now, Duration::minutes(15)));
        let effective = snapshot.effective_risk_score(now, Duration::minutes(15), 85.0);
        assert!((effective - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = MonitoringConfig::for_profile("0xabc", RiskProfile::Aggressive);
        let json = serde_json::to_string(&config).unwrap();
        let back: MonitoringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.wallet_address, "0xabc");
        assert_eq!(back.max_daily_trades, config.max_daily_trades);
        assert_eq!(back.risk_profile, RiskProfile::Aggressive);
    }
}
