//! Simulated allocation provider for paper runs and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use driftwatch_core::errors::AllocationError;
use driftwatch_core::{Allocation, AllocationProvider, PortfolioState};
use rust_decimal::Decimal;
use std::sync::RwLock;

/// In-process allocation provider backed by a map of scripted portfolios.
///
/// Wallets without a scripted portfolio fall back to the configured
/// default, or produce an `UnknownWallet` error when no default is set.
/// An optional artificial latency makes external-call timing observable
/// in tests.
pub struct SimulatedAllocationProvider {
    portfolios: RwLock<HashMap<String, (Allocation, Decimal)>>,
    default_portfolio: Option<(Allocation, Decimal)>,
    latency: Option<Duration>,
}

impl SimulatedAllocationProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            portfolios: RwLock::new(HashMap::new()),
            default_portfolio: None,
            latency: None,
        }
    }

    /// Provider that answers for any wallet with the given portfolio.
    #[must_use]
    pub fn with_default(allocation: Allocation, total_value_usd: Decimal) -> Self {
        Self {
            default_portfolio: Some((allocation, total_value_usd)),
            ..Self::new()
        }
    }

    /// Adds artificial latency before every response.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Scripts the portfolio returned for one wallet.
    pub fn set_portfolio(&self, wallet: &str, allocation: Allocation, total_value_usd: Decimal) {
        self.portfolios
            .write()
            .expect("portfolio lock poisoned")
            .insert(wallet.to_string(), (allocation, total_value_usd));
    }
}

impl Default for SimulatedAllocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AllocationProvider for SimulatedAllocationProvider {
    async fn current_allocation(&self, wallet: &str) -> Result<PortfolioState, AllocationError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .portfolios
            .read()
            .expect("portfolio lock poisoned")
            .get(wallet)
            .cloned();
        let (allocation, total_value_usd) = scripted
            .or_else(|| self.default_portfolio.clone())
            .ok_or_else(|| AllocationError::UnknownWallet(wallet.to_string()))?;

        Ok(PortfolioState {
            allocation,
            total_value_usd,
            observed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn unknown_wallet_without_default_errors() {
        let provider = SimulatedAllocationProvider::new();
        let err = provider.current_allocation("0xnobody").await.unwrap_err();
        assert!(matches!(err, AllocationError::UnknownWallet(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn default_portfolio_answers_for_any_wallet() {
        let provider = SimulatedAllocationProvider::with_default(
            Allocation::from([("ETH", 50.0), ("USDC", 50.0)]),
            dec!(5000),
        );
        let portfolio = provider.current_allocation("0xanyone").await.unwrap();
        assert_eq!(portfolio.total_value_usd, dec!(5000));
    }
}
