use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub gateway: GatewayConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Market assessor cadence and the fail-safe applied to stale snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub refresh_interval_secs: u64,
    /// A snapshot older than `staleness_factor * refresh_interval` is stale.
    pub staleness_factor: u32,
    /// Minimum risk score substituted while the snapshot is stale.
    pub cautious_risk_floor: f64,
}

impl MarketConfig {
    /// Age past which a snapshot no longer counts as fresh.
    #[must_use]
    pub fn snapshot_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.staleness_factor).saturating_mul(
            i64::try_from(self.refresh_interval_secs).unwrap_or(i64::MAX),
        ))
    }
}

/// Execution gateway retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub submit_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub allocation_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://data/driftwatch.db".to_string(),
                max_connections: 5,
            },
            market: MarketConfig {
                refresh_interval_secs: 300,
                staleness_factor: 3,
                cautious_risk_floor: 85.0,
            },
            gateway: GatewayConfig {
                submit_timeout_secs: 30,
                max_attempts: 3,
                backoff_base_ms: 1000,
            },
            monitor: MonitorConfig {
                allocation_timeout_secs: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_max_age_is_staleness_factor_times_refresh() {
        let market = MarketConfig {
            refresh_interval_secs: 300,
            staleness_factor: 3,
            cautious_risk_floor: 85.0,
        };
        assert_eq!(market.snapshot_max_age(), chrono::Duration::seconds(900));
    }

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.max_attempts, 3);
        assert_eq!(config.monitor.allocation_timeout_secs, 30);
        assert!(config.market.cautious_risk_floor > 80.0);
    }
}
