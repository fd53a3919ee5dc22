use serde::{Deserialize, Serialize};

use crate::types::Urgency;

/// Named policy preset controlling how aggressively a wallet reacts to
/// drift and market risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

/// Tunables a risk profile contributes to the decision policy.
///
/// Kept as one explicit table so the policy rule order stays auditable
/// rather than scattering per-profile branches through the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePolicy {
    /// Default aggregate drift threshold for new configs, in percent.
    pub default_drift_threshold: f64,
    /// Default daily executed-trade cap for new configs.
    pub default_max_daily_trades: u32,
    /// Lowest urgency bucket the profile acts on.
    pub min_actionable_urgency: Urgency,
    /// Market risk score above which auto-execution degrades to a
    /// suggestion regardless of other settings.
    pub market_risk_ceiling: f64,
}

impl RiskProfile {
    #[must_use]
    pub const fn policy(self) -> ProfilePolicy {
        match self {
            Self::Conservative => ProfilePolicy {
                default_drift_threshold: 8.0,
                default_max_daily_trades: 2,
                min_actionable_urgency: Urgency::High,
                market_risk_ceiling: 60.0,
            },
            Self::Balanced => ProfilePolicy {
                default_drift_threshold: 5.0,
                default_max_daily_trades: 3,
                min_actionable_urgency: Urgency::Medium,
                market_risk_ceiling: 80.0,
            },
            Self::Aggressive => ProfilePolicy {
                default_drift_threshold: 3.0,
                default_max_daily_trades: 5,
                min_actionable_urgency: Urgency::Low,
                market_risk_ceiling: 90.0,
            },
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservative_has_the_lowest_risk_ceiling() {
        let conservative = RiskProfile::Conservative.policy().market_risk_ceiling;
        let balanced = RiskProfile::Balanced.policy().market_risk_ceiling;
        let aggressive = RiskProfile::Aggressive.policy().market_risk_ceiling;
        assert!(conservative < balanced);
        assert!(balanced < aggressive);
    }

    #[test]
    fn conservative_only_acts_on_high_urgency() {
        let policy = RiskProfile::Conservative.policy();
        assert_eq!(policy.min_actionable_urgency, Urgency::High);
        assert!(Urgency::Medium < policy.min_actionable_urgency);
        assert!(Urgency::Critical >= policy.min_actionable_urgency);
    }

    #[test]
    fn aggressive_acts_on_everything() {
        assert_eq!(
            RiskProfile::Aggressive.policy().min_actionable_urgency,
            Urgency::Low
        );
    }

    #[test]
    fn profile_serializes_lowercase() {
        let json = serde_json::to_string(&RiskProfile::Conservative).unwrap();
        assert_eq!(json, "\"conservative\"");
    }
}
