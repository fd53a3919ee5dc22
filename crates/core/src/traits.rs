//! Contracts for the external collaborators the monitor depends on.
//!
//! Balance retrieval, market data, and transaction submission all live
//! behind these traits; the monitor never talks to a chain or price feed
//! directly.

use async_trait::async_trait;

use crate::errors::{AllocationError, ExecutionError, MarketDataError};
use crate::types::{Allocation, ExecutionReceipt, MarketFactors, PortfolioState};

/// Answers "what does this wallet hold right now".
#[async_trait]
pub trait AllocationProvider: Send + Sync {
    async fn current_allocation(&self, wallet: &str) -> Result<PortfolioState, AllocationError>;
}

/// Supplies the raw volatility/volume/correlation/trend inputs the market
/// assessor scores.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn market_factors(&self) -> Result<MarketFactors, MarketDataError>;
}

/// Submits an approved rebalance to the execution service.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn submit_rebalance(
        &self,
        wallet: &str,
        target: &Allocation,
        slippage_tolerance_percent: f64,
    ) -> Result<ExecutionReceipt, ExecutionError>;
}
