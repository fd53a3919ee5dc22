//! Append-only record of every decision and its outcome.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use driftwatch_core::types::ActionType;
use driftwatch_core::ActionRecord;
use tokio::sync::RwLock;

use crate::database::MonitorDatabase;

/// Records kept in memory per wallet; the database holds the full history.
const RETAINED_PER_WALLET: usize = 200;

/// Append-only action log. Safe for concurrent appends from different
/// wallet tasks; each wallet's own appends arrive in cycle order because
/// cycles are serialized per wallet.
pub struct ActionLog {
    records: RwLock<HashMap<String, VecDeque<ActionRecord>>>,
    db: Option<Arc<MonitorDatabase>>,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    #[must_use]
    pub fn with_database(db: Arc<MonitorDatabase>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            db: Some(db),
        }
    }

    /// Appends one record. Records are immutable once appended.
    ///
    /// # Errors
    /// Returns an error if persistence fails; the in-memory log is still
    /// updated so operators never lose sight of a decision.
    pub async fn append(&self, record: ActionRecord) -> Result<()> {
        {
            let mut map = self.records.write().await;
            let per_wallet = map.entry(record.wallet_address.clone()).or_default();
            if per_wallet.len() >= RETAINED_PER_WALLET {
                per_wallet.pop_front();
            }
            per_wallet.push_back(record.clone());
        }

        if let Some(ref db) = self.db {
            db.insert_action(&record).await?;
        }
        Ok(())
    }

    /// Most recent records for a wallet, newest first, bounded by `limit`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn recent(&self, wallet: &str, limit: u32) -> Result<Vec<ActionRecord>> {
        if let Some(ref db) = self.db {
            return db.recent_actions(wallet, limit).await;
        }

        let map = self.records.read().await;
        let records = map
            .get(wallet)
            .map(|per_wallet| {
                per_wallet
                    .iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    /// Counts of (all actions, executed actions) since `since`, across all
    /// wallets. Feeds the aggregate service status.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn counts_since(&self, since: DateTime<Utc>) -> Result<(u64, u64)> {
        if let Some(ref db) = self.db {
            return db.action_counts_since(since).await;
        }

        let map = self.records.read().await;
        let mut total = 0u64;
        let mut executed = 0u64;
        for per_wallet in map.values() {
            for record in per_wallet.iter().filter(|r| r.timestamp >= since) {
                total += 1;
                if record.action_type == ActionType::Execute {
                    executed += 1;
                }
            }
        }
        Ok((total, executed))
    }
}
