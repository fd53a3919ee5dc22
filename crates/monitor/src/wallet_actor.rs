//! Per-wallet monitoring task.
//!
//! One actor owns one wallet's check cycle. Cycles are strictly
//! serialized: the loop runs at most one cycle at a time, and the next
//! never starts before the previous one's config write-back finished. A
//! shutdown command interrupts the wait for the next cycle but never a
//! cycle already underway, so every decision that was made gets logged.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use driftwatch_core::{
    Action, ActionRecord, AllocationProvider, DecisionEngine, DriftAnalyzer, MarketSnapshot,
    MonitoringConfig,
};
use driftwatch_execution::ExecutionGateway;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::action_log::ActionLog;
use crate::commands::{WalletCommand, WalletState, WalletStatus};
use crate::config_store::{ConfigStore, CycleResult};

/// Everything a wallet task needs besides its own identity. Shared by all
/// actors under one supervisor.
#[derive(Clone)]
pub struct WalletDeps {
    pub store: Arc<ConfigStore>,
    pub log: Arc<ActionLog>,
    pub allocations: Arc<dyn AllocationProvider>,
    pub gateway: Arc<ExecutionGateway>,
    pub engine: DecisionEngine,
    pub market_rx: watch::Receiver<MarketSnapshot>,
    pub allocation_timeout: Duration,
}

pub struct WalletActor {
    wallet: String,
    rx: mpsc::Receiver<WalletCommand>,
    deps: WalletDeps,
    state: WalletState,
}

impl WalletActor {
    #[must_use]
    pub fn new(wallet: String, rx: mpsc::Receiver<WalletCommand>, deps: WalletDeps) -> Self {
        Self {
            wallet,
            rx,
            deps,
            state: WalletState::Idle,
        }
    }

    /// Runs the task until shutdown or until the wallet's config is
    /// removed.
    pub async fn run(mut self) {
        tracing::info!(wallet = %self.wallet, "Wallet monitor started");

        // Deadline of the next scheduled cycle. A forced check leaves it
        // untouched; config updates and completed scheduled cycles clear it
        // for recomputation.
        let mut scheduled_due: Option<Instant> = None;

        loop {
            let Some(config) = self.deps.store.get(&self.wallet).await else {
                tracing::info!(wallet = %self.wallet, "Config removed, wallet monitor exiting");
                break;
            };

            if !config.enabled {
                self.state = WalletState::Disabled;
                scheduled_due = None;
                match self.rx.recv().await {
                    None | Some(WalletCommand::Shutdown) => break,
                    Some(WalletCommand::ForceCheck(reply)) => {
                        let _ = reply.send(Err(anyhow!(
                            "monitoring is disabled for wallet {}",
                            self.wallet
                        )));
                    }
                    Some(WalletCommand::ConfigUpdated) => {}
                    Some(WalletCommand::GetStatus(reply)) => {
                        let _ = reply.send(self.current_status().await);
                    }
                }
                continue;
            }

            self.state = WalletState::Idle;
            let due = *scheduled_due
                .get_or_insert_with(|| Instant::now() + Self::time_until_due(&config, Utc::now()));

            tokio::select! {
                maybe_cmd = self.rx.recv() => {
                    match maybe_cmd {
                        None | Some(WalletCommand::Shutdown) => break,
                        Some(WalletCommand::ForceCheck(reply)) => {
                            let _ = reply.send(self.run_cycle().await);
                        }
                        Some(WalletCommand::ConfigUpdated) => {
                            scheduled_due = None;
                        }
                        Some(WalletCommand::GetStatus(reply)) => {
                            let _ = reply.send(self.current_status().await);
                        }
                    }
                }
                () = tokio::time::sleep_until(due) => {
                    if let Err(e) = self.run_cycle().await {
                        tracing::error!(wallet = %self.wallet, error = %e, "Monitoring cycle error");
                    }
                    scheduled_due = None;
                }
            }
        }

        tracing::info!(wallet = %self.wallet, "Wallet monitor stopped");
    }

    /// Time until the wallet's next check is due, based on the last check
    /// and the configured interval. A never-checked wallet is due at once.
    fn time_until_due(config: &MonitoringConfig, now: DateTime<Utc>) -> Duration {
        let Some(last_check) = config.last_check else {
            return Duration::ZERO;
        };
        let interval = chrono::Duration::seconds(
            i64::try_from(config.check_interval_secs).unwrap_or(i64::MAX),
        );
        let due_at = last_check + interval;
        (due_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// One full check cycle: fetch, analyze, decide, act, log, write back.
    async fn run_cycle(&mut self) -> Result<ActionRecord> {
        let now = Utc::now();
        let config = self
            .deps
            .store
            .snapshot_for_cycle(&self.wallet, now)
            .await
            .ok_or_else(|| anyhow!("wallet {} is not monitored", self.wallet))?;
        if !config.enabled {
            bail!("monitoring is disabled for wallet {}", self.wallet);
        }

        self.state = WalletState::Checking;
        let fetched = tokio::time::timeout(
            self.deps.allocation_timeout,
            self.deps.allocations.current_allocation(&self.wallet),
        )
        .await;
        let portfolio = match fetched {
            Ok(Ok(portfolio)) => portfolio,
            Ok(Err(e)) => {
                return self
                    .finish_failed_cycle(now, format!("allocation fetch failed: {e}"))
                    .await;
            }
            Err(_) => {
                return self
                    .finish_failed_cycle(
                        now,
                        format!(
                            "allocation fetch timed out after {}s",
                            self.deps.allocation_timeout.as_secs()
                        ),
                    )
                    .await;
            }
        };

        self.state = WalletState::Deciding;
        let target = self.deps.store.target(&self.wallet).await;
        let drift = DriftAnalyzer::compute(&portfolio.allocation, &target);
        let market = self.deps.market_rx.borrow().clone();
        let decision = self.deps.engine.decide(
            &config,
            &drift,
            portfolio.total_value_usd,
            &market,
            now,
        );

        tracing::info!(
            wallet = %self.wallet,
            action = ?decision.action,
            total_drift = drift.total_drift,
            urgency = ?drift.urgency,
            market_risk = market.risk_score,
            "Cycle decision"
        );

        let mut record = ActionRecord::decision(
            &self.wallet,
            decision.action.as_action_type(),
            decision.reasoning,
            drift,
            target.clone(),
            config.clone(),
            now,
        );

        let mut executed = false;
        if decision.action == Action::Execute {
            self.state = WalletState::Executing;
            match self
                .deps
                .gateway
                .submit(&self.wallet, &target, config.slippage_tolerance_percent)
                .await
            {
                Ok(receipt) => {
                    executed = true;
                    record = record.with_execution(receipt);
                }
                Err(e) => {
                    tracing::error!(
                        wallet = %self.wallet,
                        error = %e,
                        "Rebalance submission failed"
                    );
                    record = record.with_error(e.to_string());
                }
            }
        }

        self.finish_cycle(record, executed, now).await
    }

    async fn finish_failed_cycle(
        &mut self,
        now: DateTime<Utc>,
        error: String,
    ) -> Result<ActionRecord> {
        tracing::warn!(wallet = %self.wallet, error = %error, "Monitoring cycle failed");
        let record = ActionRecord::cycle_error(&self.wallet, error, now);
        self.finish_cycle(record, false, now).await
    }

    /// Bookkeeping shared by every cycle outcome: append the record, write
    /// the counter/last-check delta back through the store.
    async fn finish_cycle(
        &mut self,
        record: ActionRecord,
        executed: bool,
        now: DateTime<Utc>,
    ) -> Result<ActionRecord> {
        if let Err(e) = self.deps.log.append(record.clone()).await {
            tracing::error!(
                wallet = %self.wallet,
                action_id = %record.action_id,
                error = %e,
                "Failed to persist action record"
            );
        }

        self.deps
            .store
            .apply_cycle_result(
                &self.wallet,
                CycleResult {
                    executed_trade: executed,
                    checked_at: now,
                },
            )
            .await
            .context("cycle bookkeeping failed")?;

        self.state = WalletState::Idle;
        Ok(record)
    }

    async fn current_status(&self) -> WalletStatus {
        let config = self.deps.store.get(&self.wallet).await;
        WalletStatus {
            wallet_address: self.wallet.clone(),
            state: self.state,
            enabled: config.as_ref().is_some_and(|c| c.enabled),
            last_check: config.as_ref().and_then(|c| c.last_check),
            daily_trades_count: config.as_ref().map_or(0, |c| c.daily_trades_count),
            max_daily_trades: config.as_ref().map_or(0, |c| c.max_daily_trades),
            last_heartbeat: Utc::now(),
        }
    }
}
