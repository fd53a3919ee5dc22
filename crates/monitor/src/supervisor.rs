//! Supervisor owning one monitoring task per wallet.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use driftwatch_core::{ActionRecord, MonitoringConfig};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::commands::WalletStatus;
use crate::wallet_actor::{WalletActor, WalletDeps};
use crate::wallet_handle::WalletHandle;

struct ActorEntry {
    handle: WalletHandle,
    join: JoinHandle<()>,
}

/// Spawns, tracks, and tears down the per-wallet actors. All actors share
/// the same dependency set; each owns its wallet's cycle exclusively.
pub struct WalletSupervisor {
    actors: RwLock<HashMap<String, ActorEntry>>,
    deps: WalletDeps,
}

impl WalletSupervisor {
    #[must_use]
    pub fn new(deps: WalletDeps) -> Self {
        Self {
            actors: RwLock::new(HashMap::new()),
            deps,
        }
    }

    /// Stores the config and ensures a task is running for the wallet. An
    /// existing task is told its config changed instead of being respawned.
    ///
    /// # Errors
    /// Returns a validation error without side effects, or an error if the
    /// task cannot be spawned.
    pub async fn upsert_wallet(&self, config: MonitoringConfig) -> Result<WalletHandle> {
        let config = self.deps.store.upsert(config).await?;
        let wallet = config.wallet_address;

        let mut actors = self.actors.write().await;
        if let Some(entry) = actors.get(&wallet) {
            entry.handle.config_updated().await?;
            return Ok(entry.handle.clone());
        }

        let (tx, rx) = mpsc::channel(32);
        let handle = WalletHandle::new(tx);
        let actor = WalletActor::new(wallet.clone(), rx, self.deps.clone());
        let join = tokio::spawn(actor.run());
        actors.insert(
            wallet.clone(),
            ActorEntry {
                handle: handle.clone(),
                join,
            },
        );
        tracing::info!(wallet = %wallet, "Spawned wallet monitor");

        Ok(handle)
    }

    /// Removes a wallet's config and stops its task, waiting for any
    /// in-flight cycle to finish its bookkeeping.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    pub async fn remove_wallet(&self, wallet: &str) -> Result<bool> {
        let entry = self.actors.write().await.remove(wallet);
        let had_config = self.deps.store.remove(wallet).await?;

        let had_actor = entry.is_some();
        if let Some(entry) = entry {
            let _ = entry.handle.shutdown().await;
            let _ = entry.join.await;
            tracing::info!(wallet = %wallet, "Stopped wallet monitor");
        }

        Ok(had_config || had_actor)
    }

    #[must_use]
    pub async fn get(&self, wallet: &str) -> Option<WalletHandle> {
        self.actors
            .read()
            .await
            .get(wallet)
            .map(|entry| entry.handle.clone())
    }

    #[must_use]
    pub async fn list(&self) -> Vec<String> {
        let mut wallets: Vec<String> = self.actors.read().await.keys().cloned().collect();
        wallets.sort();
        wallets
    }

    #[must_use]
    pub async fn task_count(&self) -> usize {
        self.actors.read().await.len()
    }

    /// Runs one out-of-schedule cycle for a wallet.
    ///
    /// # Errors
    /// Returns an error if the wallet is not monitored or the cycle could
    /// not run.
    pub async fn force_check(&self, wallet: &str) -> Result<ActionRecord> {
        let handle = self
            .get(wallet)
            .await
            .ok_or_else(|| anyhow!("wallet {wallet} is not monitored"))?;
        handle.force_check().await
    }

    /// Current status of every wallet task.
    #[must_use]
    pub async fn statuses(&self) -> Vec<WalletStatus> {
        let handles: Vec<(String, WalletHandle)> = self
            .actors
            .read()
            .await
            .iter()
            .map(|(wallet, entry)| (wallet.clone(), entry.handle.clone()))
            .collect();

        let mut statuses = Vec::with_capacity(handles.len());
        for (wallet, handle) in handles {
            match handle.status().await {
                Ok(status) => statuses.push(status),
                Err(e) => {
                    tracing::warn!(wallet = %wallet, error = %e, "Wallet task unresponsive");
                }
            }
        }
        statuses.sort_by(|a, b| a.wallet_address.cmp(&b.wallet_address));
        statuses
    }

    /// Spawns a task for every config already in the store. Used at service
    /// start; disabled wallets get a parked task that wakes on re-enable.
    ///
    /// # Errors
    /// Returns an error if a stored config fails validation or spawning.
    pub async fn restore_from_store(&self) -> Result<Vec<String>> {
        let configs = self.deps.store.list().await;
        let mut restored = Vec::new();

        for config in configs {
            let wallet = config.wallet_address.clone();
            match self.upsert_wallet(config).await {
                Ok(_) => restored.push(wallet),
                Err(e) => {
                    tracing::error!(wallet = %wallet, error = %e, "Failed to restore wallet monitor");
                }
            }
        }

        Ok(restored)
    }

    /// Shuts down every wallet task, waiting for in-flight cycles to
    /// complete and log before returning.
    ///
    /// # Errors
    /// Returns an error if a task panicked.
    pub async fn shutdown_all(&self) -> Result<()> {
        let entries: Vec<(String, ActorEntry)> = self.actors.write().await.drain().collect();

        for (_, entry) in &entries {
            let _ = entry.handle.shutdown().await;
        }
        for (wallet, entry) in entries {
            entry.join.await?;
            tracing::debug!(wallet = %wallet, "Wallet monitor joined");
        }
        Ok(())
    }
}
