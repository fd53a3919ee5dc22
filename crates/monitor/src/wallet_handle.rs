use anyhow::Result;
use driftwatch_core::ActionRecord;
use tokio::sync::{mpsc, oneshot};

use crate::commands::{WalletCommand, WalletStatus};

/// Cloneable handle to one wallet's monitoring task.
#[derive(Clone)]
pub struct WalletHandle {
    tx: mpsc::Sender<WalletCommand>,
}

impl WalletHandle {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<WalletCommand>) -> Self {
        Self { tx }
    }

    /// Runs one monitoring cycle immediately and returns its action record.
    /// The wallet's regular schedule is unaffected.
    ///
    /// # Errors
    /// Returns an error if the task is gone or the cycle itself failed to
    /// even start (e.g. monitoring disabled).
    pub async fn force_check(&self) -> Result<ActionRecord> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(WalletCommand::ForceCheck(tx)).await?;
        rx.await?
    }

    /// Tells the task its stored config changed.
    ///
    /// # Errors
    /// Returns an error if the command cannot be delivered.
    pub async fn config_updated(&self) -> Result<()> {
        self.tx.send(WalletCommand::ConfigUpdated).await?;
        Ok(())
    }

    /// Current task status.
    ///
    /// # Errors
    /// Returns an error if the command cannot be delivered or the task
    /// dropped the reply.
    pub async fn status(&self) -> Result<WalletStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(WalletCommand::GetStatus(tx)).await?;
        Ok(rx.await?)
    }

    /// Asks the task to exit after any in-flight cycle completes.
    ///
    /// # Errors
    /// Returns an error if the command cannot be delivered.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(WalletCommand::Shutdown).await?;
        Ok(())
    }
}
