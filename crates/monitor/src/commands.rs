use anyhow::Result;
use chrono::{DateTime, Utc};
use driftwatch_core::ActionRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum WalletCommand {
    /// Run exactly one cycle now, outside the normal schedule. The
    /// scheduled next check is not moved.
    ForceCheck(oneshot::Sender<Result<ActionRecord>>),
    /// The stored config changed; re-derive scheduling state.
    ConfigUpdated,
    GetStatus(oneshot::Sender<WalletStatus>),
    Shutdown,
}

/// Where a wallet task currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletState {
    /// Waiting for the next scheduled check.
    Idle,
    /// Fetching the wallet's current allocation.
    Checking,
    /// Evaluating drift and policy.
    Deciding,
    /// Submitting an approved rebalance.
    Executing,
    /// Monitoring switched off; the task only listens for commands.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatus {
    pub wallet_address: String,
    pub state: WalletState,
    pub enabled: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub daily_trades_count: u32,
    pub max_daily_trades: u32,
    pub last_heartbeat: DateTime<Utc>,
}
