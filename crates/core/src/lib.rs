pub mod config;
pub mod config_loader;
pub mod decision;
pub mod drift;
pub mod errors;
pub mod profiles;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use config_loader::ConfigLoader;
pub use decision::{Action, Decision, DecisionEngine};
pub use drift::DriftAnalyzer;
pub use errors::{AllocationError, ConfigError, ExecutionError, MarketDataError};
pub use profiles::{ProfilePolicy, RiskProfile};
pub use traits::{AllocationProvider, ExecutionService, MarketDataFeed};
pub use types::{
    ActionRecord, ActionType, Allocation, DriftResult, ExecutionReceipt, MarketFactors,
    MarketSnapshot, MonitoringConfig, PortfolioState, TrendDirection, Urgency,
};
