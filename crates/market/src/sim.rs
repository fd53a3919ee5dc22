//! Simulated market data feed for paper runs and tests.

use async_trait::async_trait;
use driftwatch_core::errors::MarketDataError;
use driftwatch_core::{MarketDataFeed, MarketFactors};
use tokio::sync::RwLock;

/// In-process market feed returning configurable factors.
///
/// Makes zero external calls; useful for running the monitor end to end
/// without a live data provider, and for steering market conditions in
/// tests.
pub struct SimulatedMarketFeed {
    factors: RwLock<MarketFactors>,
}

impl SimulatedMarketFeed {
    #[must_use]
    pub fn new(factors: MarketFactors) -> Self {
        Self {
            factors: RwLock::new(factors),
        }
    }

    /// Calm defaults: low volatility, average volume, loose correlation.
    #[must_use]
    pub fn calm() -> Self {
        Self::new(MarketFactors {
            volatility_24h: 0.05,
            volume_change_24h: 0.1,
            average_pairwise_correlation: 0.35,
            price_change_24h_pct: 0.4,
        })
    }

    /// Replaces the factors returned by subsequent assessments.
    pub async fn set_factors(&self, factors: MarketFactors) {
        *self.factors.write().await = factors;
    }
}

#[async_trait]
impl MarketDataFeed for SimulatedMarketFeed {
    async fn market_factors(&self) -> Result<MarketFactors, MarketDataError> {
        Ok(self.factors.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_configured_factors() {
        let feed = SimulatedMarketFeed::calm();
        let factors = feed.market_factors().await.unwrap();
        assert!(factors.volatility_24h < 0.15);

        feed.set_factors(MarketFactors {
            volatility_24h: 0.4,
            volume_change_24h: 2.0,
            average_pairwise_correlation: 0.9,
            price_change_24h_pct: -12.0,
        })
        .await;
        let factors = feed.market_factors().await.unwrap();
        assert!(factors.volatility_24h > 0.15);
    }
}
