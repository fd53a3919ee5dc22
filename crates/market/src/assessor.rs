//! Market assessor task: pulls raw factors on a fixed cadence and publishes
//! scored snapshots for every wallet task to read.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use driftwatch_core::config::MarketConfig;
use driftwatch_core::{MarketDataFeed, MarketSnapshot};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::scoring::score_factors;

/// Handle for stopping the assessor task.
pub struct AssessorHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl AssessorHandle {
    /// Signals the assessor to stop and waits for the task to exit. An
    /// assessment already in flight completes first.
    ///
    /// # Errors
    /// Returns an error if the task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.join.await?;
        Ok(())
    }
}

/// Periodically assesses market risk, independent of any wallet cadence.
///
/// The snapshot channel always holds a complete value; readers `borrow()`
/// a consistent snapshot with no locking against the writer. On a failed
/// fetch the previous snapshot is retained and ages into staleness, which
/// the decision policy treats as elevated risk.
pub struct MarketAssessor {
    feed: Arc<dyn MarketDataFeed>,
    config: MarketConfig,
}

impl MarketAssessor {
    #[must_use]
    pub fn new(feed: Arc<dyn MarketDataFeed>, config: MarketConfig) -> Self {
        Self { feed, config }
    }

    /// Spawns the assessment loop. The first assessment runs immediately;
    /// until it completes, readers see a pre-dated placeholder that the
    /// policy already treats as stale.
    #[must_use]
    pub fn spawn(self) -> (watch::Receiver<MarketSnapshot>, AssessorHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(MarketSnapshot::unassessed());
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let join = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.refresh_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.assess_once(&snapshot_tx).await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Market assessor shutting down");
                        break;
                    }
                }
            }
        });

        (snapshot_rx, AssessorHandle { shutdown_tx, join })
    }

    async fn assess_once(&self, snapshot_tx: &watch::Sender<MarketSnapshot>) {
        match self.feed.market_factors().await {
            Ok(factors) => {
                let snapshot = score_factors(&factors, Utc::now());
                tracing::debug!(
                    risk_score = snapshot.risk_score,
                    volatility_high = snapshot.volatility_high,
                    volume_spike = snapshot.volume_spike,
                    correlation_breakdown = snapshot.correlation_breakdown,
                    "Market conditions assessed"
                );
                // Send only fails with no receivers, which is fine.
                let _ = snapshot_tx.send(snapshot);
            }
            Err(e) => {
                let previous_age = Utc::now()
                    .signed_duration_since(snapshot_tx.borrow().assessed_at)
                    .num_seconds();
                tracing::warn!(
                    error = %e,
                    previous_snapshot_age_secs = previous_age,
                    "Market assessment failed, retaining previous snapshot"
                );
            }
        }
    }
}
