//! Decision policy: combines drift, market risk, per-wallet config, and
//! daily usage into a skip / suggest / execute outcome.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ActionType, DriftResult, MarketSnapshot, MonitoringConfig};

/// Outcome of a decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Skip,
    Suggest,
    Execute,
}

impl Action {
    #[must_use]
    pub const fn as_action_type(self) -> ActionType {
        match self {
            Self::Skip => ActionType::Skip,
            Self::Suggest => ActionType::Suggest,
            Self::Execute => ActionType::Execute,
        }
    }
}

/// A decision plus the reasoning recorded verbatim into the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub reasoning: String,
}

impl Decision {
    fn skip(reasoning: String) -> Self {
        Self {
            action: Action::Skip,
            reasoning,
        }
    }

    fn suggest(reasoning: String) -> Self {
        Self {
            action: Action::Suggest,
            reasoning,
        }
    }

    fn execute(reasoning: String) -> Self {
        Self {
            action: Action::Execute,
            reasoning,
        }
    }
}

/// Evaluates the decision rules in a fixed order; the first matching rule
/// wins. Value and drift gates come before market gates so a wallet with
/// nothing to do never produces market-related log volume, and cap
/// exhaustion degrades to a suggestion so real drift is never hidden.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    /// Snapshots older than this are treated as stale.
    snapshot_max_age: Duration,
    /// Minimum risk score substituted for a stale snapshot.
    cautious_risk_floor: f64,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(snapshot_max_age: Duration, cautious_risk_floor: f64) -> Self {
        Self {
            snapshot_max_age,
            cautious_risk_floor,
        }
    }

    /// Decides what to do for one wallet cycle. Pure: identical inputs
    /// (including `now`) always yield the same decision.
    #[must_use]
    pub fn decide(
        &self,
        config: &MonitoringConfig,
        drift: &DriftResult,
        portfolio_value_usd: Decimal,
        market: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Decision {
        if !config.enabled {
            return Decision::skip("monitoring disabled for this wallet".to_string());
        }

        if portfolio_value_usd < config.min_portfolio_value_usd {
            return Decision::skip(format!(
                "portfolio value ${portfolio_value_usd} below ${} monitoring floor",
                config.min_portfolio_value_usd
            ));
        }

        if drift.total_drift < config.drift_threshold_percent {
            return Decision::skip(format!(
                "total drift {:.2}% below {:.2}% threshold",
                drift.total_drift, config.drift_threshold_percent
            ));
        }

        let policy = config.risk_profile.policy();
        if drift.urgency < policy.min_actionable_urgency {
            return Decision::skip(format!(
                "urgency {:?} below the minimum the {} profile acts on ({:?})",
                drift.urgency,
                config.risk_profile.as_str(),
                policy.min_actionable_urgency
            ));
        }

        let risk_score =
            market.effective_risk_score(now, self.snapshot_max_age, self.cautious_risk_floor);
        if risk_score > policy.market_risk_ceiling {
            let stale_note = if market.is_stale(now, self.snapshot_max_age) {
                " (snapshot stale, cautious floor applied)"
            } else {
                ""
            };
            return Decision::suggest(format!(
                "drift {:.2}% warrants rebalancing, but market risk {risk_score:.0}{stale_note} \
                 exceeds the {} profile ceiling of {:.0}; suggesting instead of executing",
                drift.total_drift,
                config.risk_profile.as_str(),
                policy.market_risk_ceiling
            ));
        }

        if config.daily_trades_count >= config.max_daily_trades {
            return Decision::suggest(format!(
                "drift {:.2}% warrants rebalancing, but the daily trade cap is exhausted \
                 ({}/{}); suggesting instead of executing",
                drift.total_drift, config.daily_trades_count, config.max_daily_trades
            ));
        }

        if !config.auto_execute {
            return Decision::suggest(format!(
                "drift {:.2}% ({:?}) warrants rebalancing; auto-execute is disabled, \
                 recording a suggestion",
                drift.total_drift, drift.urgency
            ));
        }

        Decision::execute(format!(
            "drift {:.2}% ({:?}) exceeds {:.2}% threshold, market risk {risk_score:.0} within \
             ceiling {:.0}, {}/{} daily trades used",
            drift.total_drift,
            drift.urgency,
            config.drift_threshold_percent,
            policy.market_risk_ceiling,
            config.daily_trades_count,
            config.max_daily_trades
        ))
    }
}
