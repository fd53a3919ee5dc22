use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use driftwatch_core::errors::ConfigError;
use driftwatch_core::{ActionRecord, Allocation, MonitoringConfig, RiskProfile};
use driftwatch_monitor::{MonitorService, ServiceStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_ACTIONS_PAGE: u32 = 20;
const MAX_ACTIONS_PAGE: u32 = 100;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub risk_profile: Option<RiskProfile>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub auto_execute: Option<bool>,
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
    #[serde(default)]
    pub drift_threshold_percent: Option<f64>,
    #[serde(default)]
    pub max_daily_trades: Option<u32>,
    #[serde(default)]
    pub slippage_tolerance_percent: Option<f64>,
    #[serde(default)]
    pub min_portfolio_value_usd: Option<Decimal>,
}

impl SubscribeRequest {
    /// Builds a config from the profile's defaults, overridden by any
    /// explicitly provided field.
    fn into_config(self, wallet: String) -> MonitoringConfig {
        let profile = self.risk_profile.unwrap_or_default();
        let mut config = MonitoringConfig::for_profile(wallet, profile);
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(auto_execute) = self.auto_execute {
            config.auto_execute = auto_execute;
        }
        if let Some(secs) = self.check_interval_secs {
            config.check_interval_secs = secs;
        }
        if let Some(threshold) = self.drift_threshold_percent {
            config.drift_threshold_percent = threshold;
        }
        if let Some(cap) = self.max_daily_trades {
            config.max_daily_trades = cap;
        }
        if let Some(slippage) = self.slippage_tolerance_percent {
            config.slippage_tolerance_percent = slippage;
        }
        if let Some(floor) = self.min_portfolio_value_usd {
            config.min_portfolio_value_usd = floor;
        }
        config
    }
}

#[derive(Serialize)]
pub struct WalletListResponse {
    pub wallets: Vec<MonitoringConfig>,
}

#[derive(Serialize)]
pub struct ActionsResponse {
    pub wallet_address: String,
    pub actions: Vec<ActionRecord>,
}

#[derive(Deserialize)]
pub struct ActionsQuery {
    pub limit: Option<u32>,
}

fn error_status(err: &anyhow::Error) -> StatusCode {
    if err.downcast_ref::<ConfigError>().is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Lists every monitored wallet's configuration.
pub async fn list_wallets(
    State(service): State<Arc<MonitorService>>,
) -> Json<WalletListResponse> {
    let wallets = service.list_wallets().await;
    Json(WalletListResponse { wallets })
}

/// Subscribes a wallet to monitoring.
///
/// # Errors
/// Returns `StatusCode::BAD_REQUEST` for invalid settings.
pub async fn subscribe_wallet(
    State(service): State<Arc<MonitorService>>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<MonitoringConfig>), StatusCode> {
    let wallet = req.wallet_address.clone();
    let config = req.into_config(wallet);

    let stored = service
        .upsert_wallet(config)
        .await
        .map_err(|e| error_status(&e))?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Gets a wallet's monitoring configuration.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` if the wallet is not monitored.
pub async fn get_wallet(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
) -> Result<Json<MonitoringConfig>, StatusCode> {
    let config = service
        .get_wallet(&wallet)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(config))
}

/// Updates a wallet's monitoring configuration.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` if the wallet is not monitored, or
/// `StatusCode::BAD_REQUEST` for invalid settings.
pub async fn update_wallet(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<MonitoringConfig>, StatusCode> {
    if service.get_wallet(&wallet).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let config = req.into_config(wallet);
    let stored = service
        .upsert_wallet(config)
        .await
        .map_err(|e| error_status(&e))?;

    Ok(Json(stored))
}

/// Removes a wallet from monitoring.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` if the wallet was not monitored.
pub async fn remove_wallet(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let removed = service
        .remove_wallet(&wallet)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Sets a wallet's target allocation.
///
/// # Errors
/// Returns `StatusCode::BAD_REQUEST` for a structurally invalid target.
pub async fn set_target(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
    Json(target): Json<Allocation>,
) -> Result<StatusCode, StatusCode> {
    service
        .set_target(&wallet, target)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs one monitoring cycle for a wallet, outside its normal schedule.
///
/// # Errors
/// Returns `StatusCode::CONFLICT` if the cycle could not run (service
/// stopped, wallet unknown, or monitoring disabled).
pub async fn force_check(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
) -> Result<Json<ActionRecord>, StatusCode> {
    let record = service.force_check(&wallet).await.map_err(|e| {
        tracing::warn!(wallet = %wallet, error = %e, "Force check rejected");
        StatusCode::CONFLICT
    })?;
    Ok(Json(record))
}

/// Recent action records for a wallet, newest first.
pub async fn recent_actions(
    State(service): State<Arc<MonitorService>>,
    Path(wallet): Path<String>,
    Query(query): Query<ActionsQuery>,
) -> Result<Json<ActionsResponse>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIONS_PAGE)
        .min(MAX_ACTIONS_PAGE);

    let actions = service
        .recent_actions(&wallet, limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ActionsResponse {
        wallet_address: wallet,
        actions,
    }))
}

/// Starts the monitoring service.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if startup fails.
pub async fn start_service(
    State(service): State<Arc<MonitorService>>,
) -> Result<StatusCode, StatusCode> {
    service
        .start()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::OK)
}

/// Stops the monitoring service, letting in-flight cycles finish.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if shutdown fails.
pub async fn stop_service(
    State(service): State<Arc<MonitorService>>,
) -> Result<StatusCode, StatusCode> {
    service
        .stop()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::OK)
}

/// Restarts the monitoring service.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the restart fails.
pub async fn restart_service(
    State(service): State<Arc<MonitorService>>,
) -> Result<StatusCode, StatusCode> {
    service
        .restart()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::OK)
}

/// Aggregate service status.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if status collection fails.
pub async fn service_status(
    State(service): State<Arc<MonitorService>>,
) -> Result<Json<ServiceStatus>, StatusCode> {
    let status = service
        .status()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(status))
}
