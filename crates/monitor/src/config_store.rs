//! Single-writer-per-wallet store for monitoring configs, daily counters,
//! and target allocations.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use driftwatch_core::{Allocation, MonitoringConfig};
use tokio::sync::RwLock;

use crate::database::MonitorDatabase;

/// Bookkeeping a finished cycle writes back through the store.
#[derive(Debug, Clone, Copy)]
pub struct CycleResult {
    /// True only when a submission succeeded; suggestions and failed
    /// submissions do not consume the daily cap.
    pub executed_trade: bool,
    pub checked_at: DateTime<Utc>,
}

/// Fallback target when no allocation has been set for a wallet.
#[must_use]
pub fn default_target() -> Allocation {
    Allocation::from([("ETH", 40.0), ("USDC", 30.0), ("LINK", 30.0)])
}

/// Owns every `MonitoringConfig` exclusively. Wallet cycles read a
/// consistent copy and hand bookkeeping back through
/// [`apply_cycle_result`](ConfigStore::apply_cycle_result); nothing else
/// mutates config. Concurrent access across different wallets is safe;
/// per-wallet serialization is the caller's concern (one cycle at a time).
pub struct ConfigStore {
    configs: RwLock<HashMap<String, MonitoringConfig>>,
    targets: RwLock<HashMap<String, Allocation>>,
    db: Option<Arc<MonitorDatabase>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Creates an in-memory store without persistence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            targets: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    /// Creates a store that mirrors every mutation to the database.
    #[must_use]
    pub fn with_database(db: Arc<MonitorDatabase>) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            targets: RwLock::new(HashMap::new()),
            db: Some(db),
        }
    }

    /// Loads persisted configs and targets into memory. Called once at
    /// startup, before any wallet task runs.
    ///
    /// # Errors
    /// Returns an error if the database cannot be read.
    pub async fn load_persisted(&self) -> Result<usize> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let configs = db.load_configs().await?;
        let count = configs.len();
        {
            let mut map = self.configs.write().await;
            for config in configs {
                map.insert(config.wallet_address.clone(), config);
            }
        }

        let targets = db.load_targets().await?;
        {
            let mut map = self.targets.write().await;
            for (wallet, target) in targets {
                map.insert(wallet, target);
            }
        }

        Ok(count)
    }

    #[must_use]
    pub async fn get(&self, wallet: &str) -> Option<MonitoringConfig> {
        self.configs.read().await.get(wallet).cloned()
    }

    /// Validates and stores a config. For an existing wallet the runtime
    /// bookkeeping (daily counter, reset date, last check) is preserved so
    /// a re-subscribe cannot launder the daily cap.
    ///
    /// # Errors
    /// Returns a validation error without storing anything, or a database
    /// error if persistence fails.
    pub async fn upsert(&self, mut config: MonitoringConfig) -> Result<MonitoringConfig> {
        config.validate()?;

        {
            let mut map = self.configs.write().await;
            if let Some(existing) = map.get(&config.wallet_address) {
                config.daily_trades_count = existing.daily_trades_count;
                config.last_trade_reset = existing.last_trade_reset;
                config.last_check = existing.last_check;
            }
            map.insert(config.wallet_address.clone(), config.clone());
        }

        if let Some(ref db) = self.db {
            db.upsert_config(&config).await?;
        }
        Ok(config)
    }

    /// Removes a wallet's config and target. Returns false if the wallet
    /// was not monitored.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    pub async fn remove(&self, wallet: &str) -> Result<bool> {
        let removed = self.configs.write().await.remove(wallet).is_some();
        self.targets.write().await.remove(wallet);

        if removed {
            if let Some(ref db) = self.db {
                db.delete_wallet(wallet).await?;
            }
        }
        Ok(removed)
    }

    #[must_use]
    pub async fn list(&self) -> Vec<MonitoringConfig> {
        let mut configs: Vec<MonitoringConfig> =
            self.configs.read().await.values().cloned().collect();
        configs.sort_by(|a, b| a.wallet_address.cmp(&b.wallet_address));
        configs
    }

    /// Consistent config copy for one decision cycle. Applies the
    /// day-boundary counter reset first so the cycle never reasons about
    /// yesterday's counter.
    pub async fn snapshot_for_cycle(
        &self,
        wallet: &str,
        now: DateTime<Utc>,
    ) -> Option<MonitoringConfig> {
        let mut map = self.configs.write().await;
        let config = map.get_mut(wallet)?;
        reset_if_new_day(config, now);
        Some(config.clone())
    }

    /// Atomically applies a finished cycle's bookkeeping: day-boundary
    /// reset, optional counter increment, and the last-check timestamp.
    ///
    /// # Errors
    /// Fails loudly if the increment would breach the daily cap; cycle
    /// serialization makes that a programming fault, not an expected state.
    pub async fn apply_cycle_result(
        &self,
        wallet: &str,
        result: CycleResult,
    ) -> Result<MonitoringConfig> {
        let updated = {
            let mut map = self.configs.write().await;
            let Some(config) = map.get_mut(wallet) else {
                bail!("wallet {wallet} is not monitored");
            };

            reset_if_new_day(config, result.checked_at);
            if result.executed_trade {
                if config.daily_trades_count >= config.max_daily_trades {
                    bail!(
                        "daily trade counter for {wallet} would exceed its cap \
                         ({}/{}); refusing to record the trade",
                        config.daily_trades_count + 1,
                        config.max_daily_trades
                    );
                }
                config.daily_trades_count += 1;
            }
            config.last_check = Some(result.checked_at);
            config.clone()
        };

        if let Some(ref db) = self.db {
            db.upsert_config(&updated).await?;
        }
        Ok(updated)
    }

    /// Target allocation for a wallet, falling back to the process default.
    #[must_use]
    pub async fn target(&self, wallet: &str) -> Allocation {
        self.targets
            .read()
            .await
            .get(wallet)
            .cloned()
            .unwrap_or_else(default_target)
    }

    /// Replaces a wallet's target allocation.
    ///
    /// # Errors
    /// Rejects an empty target or one whose weights do not sum to ~100%.
    pub async fn set_target(&self, wallet: &str, target: Allocation) -> Result<()> {
        if target.is_empty() {
            bail!("target allocation must not be empty");
        }
        let total = target.total();
        if (total - 100.0).abs() > 1.0 {
            bail!("target allocation must sum to 100%, got {total:.2}%");
        }

        self.targets
            .write()
            .await
            .insert(wallet.to_string(), target.clone());
        if let Some(ref db) = self.db {
            db.upsert_target(wallet, &target).await?;
        }
        Ok(())
    }
}

fn reset_if_new_day(config: &mut MonitoringConfig, now: DateTime<Utc>) {
    let today = now.date_naive();
    if today > config.last_trade_reset {
        config.daily_trades_count = 0;
        config.last_trade_reset = today;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn upsert_rejects_invalid_configs_without_storing() {
        let store = ConfigStore::new();
        let mut config = MonitoringConfig::new("0xabc");
        config.drift_threshold_percent = 0.0;

        assert!(store.upsert(config).await.is_err());
        assert!(store.get("0xabc").await.is_none());
    }

    #[tokio::test]
    async fn upsert_preserves_runtime_counters_on_update() {
        let store = ConfigStore::new();
        let config = MonitoringConfig::new("0xabc");
        store.upsert(config).await.unwrap();

        let now = Utc::now();
        store
            .apply_cycle_result(
                "0xabc",
                CycleResult {
                    executed_trade: true,
                    checked_at: now,
                },
            )
            .await
            .unwrap();

        // User edits the threshold; the consumed cap must survive.
        let mut update = MonitoringConfig::new("0xabc");
        update.drift_threshold_percent = 9.0;
        let stored = store.upsert(update).await.unwrap();
        assert_eq!(stored.daily_trades_count, 1);
        assert_eq!(stored.last_check, Some(now));
    }

    #[tokio::test]
    async fn apply_cycle_result_increments_only_on_execution() {
        let store = ConfigStore::new();
        store.upsert(MonitoringConfig::new("0xabc")).await.unwrap();

        let now = Utc::now();
        let updated = store
            .apply_cycle_result(
                "0xabc",
                CycleResult {
                    executed_trade: false,
                    checked_at: now,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.daily_trades_count, 0);
        assert_eq!(updated.last_check, Some(now));

        let updated = store
            .apply_cycle_result(
                "0xabc",
                CycleResult {
                    executed_trade: true,
                    checked_at: now,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.daily_trades_count, 1);
    }

    #[tokio::test]
    async fn counter_resets_across_the_day_boundary() {
        let store = ConfigStore::new();
        let mut config = MonitoringConfig::new("0xabc");
        config.daily_trades_count = 3;
        config.last_trade_reset = (Utc::now() - Duration::days(1)).date_naive();
        store.configs.write().await.insert("0xabc".into(), config);

        let snapshot = store
            .snapshot_for_cycle("0xabc", Utc::now())
            .await
            .unwrap();
        assert_eq!(snapshot.daily_trades_count, 0);
        assert_eq!(snapshot.last_trade_reset, Utc::now().date_naive());
    }

    #[tokio::test]
    async fn breaching_the_cap_fails_loudly() {
        let store = ConfigStore::new();
        let mut config = MonitoringConfig::new("0xabc");
        config.max_daily_trades = 1;
        store.upsert(config).await.unwrap();

        let now = Utc::now();
        let cycle = CycleResult {
            executed_trade: true,
            checked_at: now,
        };
        store.apply_cycle_result("0xabc", cycle).await.unwrap();

        let err = store.apply_cycle_result("0xabc", cycle).await.unwrap_err();
        assert!(err.to_string().contains("cap"));

        // The counter must not have been clamped or advanced.
        assert_eq!(store.get("0xabc").await.unwrap().daily_trades_count, 1);
    }

    #[tokio::test]
    async fn target_falls_back_to_the_default() {
        let store = ConfigStore::new();
        assert_eq!(store.target("0xabc").await, default_target());

        let custom = Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]);
        store.set_target("0xabc", custom.clone()).await.unwrap();
        assert_eq!(store.target("0xabc").await, custom);
    }

    #[tokio::test]
    async fn set_target_validates_the_sum() {
        let store = ConfigStore::new();
        let bad = Allocation::from([("ETH", 60.0), ("USDC", 60.0)]);
        assert!(store.set_target("0xabc", bad).await.is_err());
        assert!(store.set_target("0xabc", Allocation::new()).await.is_err());
    }

    #[tokio::test]
    async fn persisted_state_survives_a_restart() {
        let db = Arc::new(crate::database::MonitorDatabase::new_in_memory().await.unwrap());

        let store = ConfigStore::with_database(Arc::clone(&db));
        let mut config = MonitoringConfig::new("0xabc");
        config.auto_execute = true;
        store.upsert(config).await.unwrap();
        store
            .set_target(
                "0xabc",
                Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]),
            )
            .await
            .unwrap();
        let now = Utc::now();
        store
            .apply_cycle_result(
                "0xabc",
                CycleResult {
                    executed_trade: true,
                    checked_at: now,
                },
            )
            .await
            .unwrap();

        // Fresh store over the same database, as after a process restart.
        let restarted = ConfigStore::with_database(db);
        assert_eq!(restarted.load_persisted().await.unwrap(), 1);
        let config = restarted.get("0xabc").await.unwrap();
        assert!(config.auto_execute);
        assert_eq!(config.daily_trades_count, 1);
        assert_eq!(config.last_check, Some(now));
        assert!((restarted.target("0xabc").await.weight("ETH") - 60.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn list_is_sorted_by_wallet() {
        let store = ConfigStore::new();
        store.upsert(MonitoringConfig::new("0xbbb")).await.unwrap();
        store.upsert(MonitoringConfig::new("0xaaa")).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed[0].wallet_address, "0xaaa");
        assert_eq!(listed[1].wallet_address, "0xbbb");
    }
}
