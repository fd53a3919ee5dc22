pub mod action_log;
pub mod commands;
pub mod config_store;
pub mod database;
pub mod service;
pub mod sim;
pub mod supervisor;
pub mod wallet_actor;
pub mod wallet_handle;

pub use action_log::ActionLog;
pub use commands::{WalletCommand, WalletState, WalletStatus};
pub use config_store::{default_target, ConfigStore, CycleResult};
pub use database::MonitorDatabase;
pub use service::{MonitorService, ServiceStatus};
pub use sim::SimulatedAllocationProvider;
pub use supervisor::WalletSupervisor;
pub use wallet_actor::{WalletActor, WalletDeps};
pub use wallet_handle::WalletHandle;
