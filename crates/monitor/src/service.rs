//! Process-wide lifecycle for the monitor: start, stop, restart, status.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use driftwatch_core::{
    ActionRecord, Allocation, AllocationProvider, AppConfig, DecisionEngine, ExecutionService,
    MarketDataFeed, MarketSnapshot, MonitoringConfig,
};
use driftwatch_execution::ExecutionGateway;
use driftwatch_market::{AssessorHandle, MarketAssessor};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::action_log::ActionLog;
use crate::commands::WalletStatus;
use crate::config_store::ConfigStore;
use crate::supervisor::WalletSupervisor;
use crate::wallet_actor::WalletDeps;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub total_wallets: usize,
    /// Wallets with monitoring enabled.
    pub active_wallets: usize,
    pub running_tasks: usize,
    pub recent_actions_24h: u64,
    pub recent_executions_24h: u64,
    pub market: Option<MarketSnapshot>,
    pub wallets: Vec<WalletStatus>,
}

struct Running {
    supervisor: Arc<WalletSupervisor>,
    assessor: AssessorHandle,
    market_rx: watch::Receiver<MarketSnapshot>,
}

/// Owns the whole monitoring runtime: the market assessor plus one task
/// per wallet. Configuration management works whether or not the service
/// is running; decision cycles only happen while it is.
pub struct MonitorService {
    store: Arc<ConfigStore>,
    log: Arc<ActionLog>,
    allocations: Arc<dyn AllocationProvider>,
    market_feed: Arc<dyn MarketDataFeed>,
    execution: Arc<dyn ExecutionService>,
    config: AppConfig,
    running: RwLock<Option<Running>>,
}

impl MonitorService {
    #[must_use]
    pub fn new(
        store: Arc<ConfigStore>,
        log: Arc<ActionLog>,
        allocations: Arc<dyn AllocationProvider>,
        market_feed: Arc<dyn MarketDataFeed>,
        execution: Arc<dyn ExecutionService>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            log,
            allocations,
            market_feed,
            execution,
            config,
            running: RwLock::new(None),
        }
    }

    /// Starts the assessor and one task per stored wallet. Idempotent.
    ///
    /// # Errors
    /// Returns an error if restoring wallet tasks fails.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if running.is_some() {
            tracing::info!("Monitor service already running");
            return Ok(());
        }

        let assessor = MarketAssessor::new(Arc::clone(&self.market_feed), self.config.market.clone());
        let (market_rx, assessor_handle) = assessor.spawn();

        let gateway = Arc::new(ExecutionGateway::new(
            Arc::clone(&self.execution),
            self.config.gateway.clone(),
        ));
        let engine = DecisionEngine::new(
            self.config.market.snapshot_max_age(),
            self.config.market.cautious_risk_floor,
        );
        let deps = WalletDeps {
            store: Arc::clone(&self.store),
            log: Arc::clone(&self.log),
            allocations: Arc::clone(&self.allocations),
            gateway,
            engine,
            market_rx: market_rx.clone(),
            allocation_timeout: Duration::from_secs(self.config.monitor.allocation_timeout_secs),
        };

        let supervisor = Arc::new(WalletSupervisor::new(deps));
        let restored = supervisor.restore_from_store().await?;
        tracing::info!(wallets = restored.len(), "Monitor service started");

        *running = Some(Running {
            supervisor,
            assessor: assessor_handle,
            market_rx,
        });
        Ok(())
    }

    /// Stops every wallet task and the assessor. Pending waits are
    /// cancelled promptly; a cycle already underway completes its
    /// bookkeeping before this returns. Idempotent.
    ///
    /// # Errors
    /// Returns an error if a task panicked during shutdown.
    pub async fn stop(&self) -> Result<()> {
        let taken = self.running.write().await.take();
        let Some(running) = taken else {
            tracing::info!("Monitor service already stopped");
            return Ok(());
        };

        running.supervisor.shutdown_all().await?;
        running.assessor.shutdown().await?;
        tracing::info!("Monitor service stopped");
        Ok(())
    }

    /// # Errors
    /// Returns an error if stopping or starting fails.
    pub async fn restart(&self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    #[must_use]
    pub async fn is_running(&self) -> bool {
        self.running.read().await.is_some()
    }

    /// Aggregate counts plus the current market snapshot and per-wallet
    /// task states.
    ///
    /// # Errors
    /// Returns an error if the action log cannot be read.
    pub async fn status(&self) -> Result<ServiceStatus> {
        let configs = self.store.list().await;
        let total_wallets = configs.len();
        let active_wallets = configs.iter().filter(|c| c.enabled).count();

        let since = Utc::now() - chrono::Duration::hours(24);
        let (recent_actions_24h, recent_executions_24h) = self.log.counts_since(since).await?;

        let running = self.running.read().await;
        let (is_running, running_tasks, market, wallets) = match running.as_ref() {
            Some(r) => {
                let market = r.market_rx.borrow().clone();
                (
                    true,
                    r.supervisor.task_count().await,
                    Some(market),
                    r.supervisor.statuses().await,
                )
            }
            None => (false, 0, None, Vec::new()),
        };

        Ok(ServiceStatus {
            running: is_running,
            total_wallets,
            active_wallets,
            running_tasks,
            recent_actions_24h,
            recent_executions_24h,
            market,
            wallets,
        })
    }

    /// Adds or updates a wallet's monitoring config. While the service
    /// runs, the wallet's task is spawned or notified.
    ///
    /// # Errors
    /// Returns a validation error without storing anything.
    pub async fn upsert_wallet(&self, config: MonitoringConfig) -> Result<MonitoringConfig> {
        let running = self.running.read().await;
        if let Some(r) = running.as_ref() {
            r.supervisor.upsert_wallet(config.clone()).await?;
        } else {
            self.store.upsert(config.clone()).await?;
        }
        self.store
            .get(&config.wallet_address)
            .await
            .ok_or_else(|| anyhow!("config vanished after upsert"))
    }

    /// Removes a wallet from monitoring entirely.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    pub async fn remove_wallet(&self, wallet: &str) -> Result<bool> {
        let running = self.running.read().await;
        if let Some(r) = running.as_ref() {
            r.supervisor.remove_wallet(wallet).await
        } else {
            self.store.remove(wallet).await
        }
    }

    #[must_use]
    pub async fn get_wallet(&self, wallet: &str) -> Option<MonitoringConfig> {
        self.store.get(wallet).await
    }

    #[must_use]
    pub async fn list_wallets(&self) -> Vec<MonitoringConfig> {
        self.store.list().await
    }

    /// Sets a wallet's target allocation.
    ///
    /// # Errors
    /// Rejects structurally invalid targets.
    pub async fn set_target(&self, wallet: &str, target: Allocation) -> Result<()> {
        self.store.set_target(wallet, target).await
    }

    /// Runs one out-of-schedule check for a wallet.
    ///
    /// # Errors
    /// Returns an error if the service is stopped or the wallet is not
    /// monitored.
    pub async fn force_check(&self, wallet: &str) -> Result<ActionRecord> {
        let running = self.running.read().await;
        let Some(r) = running.as_ref() else {
            return Err(anyhow!("monitor service is not running"));
        };
        r.supervisor.force_check(wallet).await
    }

    /// Recent action records for a wallet, newest first.
    ///
    /// # Errors
    /// Returns an error if the log cannot be read.
    pub async fn recent_actions(&self, wallet: &str, limit: u32) -> Result<Vec<ActionRecord>> {
        self.log.recent(wallet, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedAllocationProvider;
    use driftwatch_execution::PaperExecutionService;
    use driftwatch_market::SimulatedMarketFeed;
    use rust_decimal_macros::dec;

    fn service_with(allocations: Arc<dyn AllocationProvider>) -> MonitorService {
        let mut config = AppConfig::default();
        config.gateway.backoff_base_ms = 1;
        MonitorService::new(
            Arc::new(ConfigStore::new()),
            Arc::new(ActionLog::new()),
            allocations,
            Arc::new(SimulatedMarketFeed::calm()),
            Arc::new(PaperExecutionService::new()),
            config,
        )
    }

    fn drifted_provider() -> Arc<SimulatedAllocationProvider> {
        Arc::new(SimulatedAllocationProvider::with_default(
            Allocation::from([("ETH", 48.0), ("USDC", 25.0), ("LINK", 27.0)]),
            dec!(10000),
        ))
    }

    fn quiet_config(wallet: &str) -> MonitoringConfig {
        let mut config = MonitoringConfig::new(wallet);
        config.last_check = Some(Utc::now());
        config
    }

    #[tokio::test]
    async fn start_stop_and_restart_are_idempotent() {
        let service = service_with(drifted_provider());
        assert!(!service.is_running().await);

        service.start().await.unwrap();
        service.start().await.unwrap();
        assert!(service.is_running().await);

        service.restart().await.unwrap();
        assert!(service.is_running().await);

        service.stop().await.unwrap();
        service.stop().await.unwrap();
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn status_aggregates_wallet_counts() {
        let service = service_with(drifted_provider());
        service.upsert_wallet(quiet_config("0xaaa")).await.unwrap();
        let mut disabled = quiet_config("0xbbb");
        disabled.enabled = false;
        service.upsert_wallet(disabled).await.unwrap();

        let status = service.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.total_wallets, 2);
        assert_eq!(status.active_wallets, 1);
        assert_eq!(status.running_tasks, 0);
        assert!(status.market.is_none());

        service.start().await.unwrap();
        let status = service.status().await.unwrap();
        assert!(status.running);
        assert_eq!(status.running_tasks, 2);
        assert!(status.market.is_some());
        assert_eq!(status.wallets.len(), 2);

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn force_check_requires_a_running_service() {
        let service = service_with(drifted_provider());
        service.upsert_wallet(quiet_config("0xaaa")).await.unwrap();
        assert!(service.force_check("0xaaa").await.is_err());

        service.start().await.unwrap();
        let record = service.force_check("0xaaa").await.unwrap();
        assert_eq!(record.wallet_address, "0xaaa");

        let recent = service.recent_actions("0xaaa", 10).await.unwrap();
        assert_eq!(recent.len(), 1);

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_while_running_spawns_the_task() {
        let service = service_with(drifted_provider());
        service.start().await.unwrap();

        service.upsert_wallet(quiet_config("0xnew")).await.unwrap();
        assert_eq!(service.status().await.unwrap().running_tasks, 1);

        assert!(service.remove_wallet("0xnew").await.unwrap());
        assert_eq!(service.status().await.unwrap().running_tasks, 0);

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_lets_an_in_flight_cycle_finish_and_log() {
        let allocations = Arc::new(
            SimulatedAllocationProvider::with_default(
                Allocation::from([("ETH", 48.0), ("USDC", 25.0), ("LINK", 27.0)]),
                dec!(10000),
            )
            .with_latency(Duration::from_millis(200)),
        );
        let service = service_with(allocations);

        // No last_check: the first cycle starts as soon as the task spawns.
        service
            .upsert_wallet(MonitoringConfig::new("0xslow"))
            .await
            .unwrap();
        service.start().await.unwrap();

        // The cycle is mid-fetch now; stopping must wait for it.
        tokio::time::sleep(Duration::from_millis(80)).await;
        service.stop().await.unwrap();

        let recent = service.recent_actions("0xslow", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        let config = service.get_wallet("0xslow").await.unwrap();
        assert!(config.last_check.is_some());
    }
}
