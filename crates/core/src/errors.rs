//! Error taxonomy for the monitor's collaborator boundaries.
//!
//! Transient errors (network, timeout, rate limiting) are retried by the
//! callers that own the retry policy; terminal errors are surfaced and
//! logged without retrying.

use thiserror::Error;

/// Rejected monitoring configuration. Raised synchronously on upsert;
/// invalid configs are never stored.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("wallet address must not be empty")]
    EmptyWalletAddress,

    #[error("check interval of {secs}s is below the 60s minimum")]
    IntervalTooShort { secs: u64 },

    #[error("drift threshold {value} must be a positive finite percentage")]
    InvalidDriftThreshold { value: f64 },

    #[error("max daily trades must be at least 1")]
    ZeroDailyCap,

    #[error("slippage tolerance {value}% must be in (0, 50]")]
    InvalidSlippage { value: f64 },

    #[error("minimum portfolio value must not be negative")]
    NegativeValueFloor,
}

/// Failure fetching a wallet's current allocation.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("allocation fetch timed out: {0}")]
    Timeout(String),

    #[error("wallet {0} not known to the balance provider")]
    UnknownWallet(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl AllocationError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

/// Failure pulling raw market factors from the data feed.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("market data fetch timed out: {0}")]
    Timeout(String),

    #[error("malformed market data: {0}")]
    Malformed(String),
}

impl MarketDataError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Failure submitting a rebalance to the execution service.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("network error: {0}")]
    Network(String),

    #[error("submission timed out: {0}")]
    Timeout(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    /// Gas estimation failed; replaying the same submission will fail the
    /// same way, so this is never retried.
    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid target allocation: {0}")]
    InvalidAllocation(String),

    #[error("submission rejected: {0}")]
    Rejected(String),
}

impl ExecutionError {
    /// True when a retry of the identical submission could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. }
        )
    }
}
