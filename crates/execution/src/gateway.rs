//! Boundary adapter in front of the external execution service.
//!
//! The service is treated as unreliable: every submission gets its own
//! timeout, transient failures are retried with bounded exponential
//! backoff, and failures that will recur on replay (gas estimation,
//! validation) are surfaced immediately.

use std::sync::Arc;
use std::time::Duration;

use driftwatch_core::config::GatewayConfig;
use driftwatch_core::{Allocation, ExecutionError, ExecutionReceipt, ExecutionService};

pub struct ExecutionGateway {
    service: Arc<dyn ExecutionService>,
    config: GatewayConfig,
}

impl ExecutionGateway {
    #[must_use]
    pub fn new(service: Arc<dyn ExecutionService>, config: GatewayConfig) -> Self {
        Self { service, config }
    }

    /// Submits a rebalance, retrying transient failures up to the
    /// configured attempt limit.
    ///
    /// # Errors
    /// Returns the last transient error once attempts are exhausted, or a
    /// terminal error as soon as one occurs.
    pub async fn submit(
        &self,
        wallet: &str,
        target: &Allocation,
        slippage_tolerance_percent: f64,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        let timeout = Duration::from_secs(self.config.submit_timeout_secs);
        let mut backoff = Duration::from_millis(self.config.backoff_base_ms);
        let mut attempt: u32 = 1;

        loop {
            let outcome = tokio::time::timeout(
                timeout,
                self.service
                    .submit_rebalance(wallet, target, slippage_tolerance_percent),
            )
            .await;

            let err = match outcome {
                Ok(Ok(receipt)) => {
                    tracing::info!(
                        wallet,
                        execution_id = %receipt.execution_id,
                        attempt,
                        "Rebalance submitted"
                    );
                    return Ok(receipt);
                }
                Ok(Err(e)) => e,
                Err(_) => ExecutionError::Timeout(format!(
                    "no response within {}s",
                    self.config.submit_timeout_secs
                )),
            };

            if !err.is_transient() {
                tracing::error!(wallet, error = %err, "Terminal execution failure, not retrying");
                return Err(err);
            }
            if attempt >= self.config.max_attempts {
                tracing::error!(
                    wallet,
                    error = %err,
                    attempts = attempt,
                    "Execution attempts exhausted"
                );
                return Err(err);
            }

            // A rate-limit response carries its own wait hint.
            let delay = match &err {
                ExecutionError::RateLimit { retry_after_secs } => {
                    Duration::from_secs(*retry_after_secs)
                }
                _ => backoff,
            };
            tracing::warn!(
                wallet,
                error = %err,
                attempt,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Transient execution failure, retrying"
            );
            tokio::time::sleep(delay).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use driftwatch_core::types::ExecutionStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedService {
        calls: AtomicU32,
        failures_before_success: u32,
        error_kind: fn(String) -> ExecutionError,
    }

    impl ScriptedService {
        fn new(failures_before_success: u32, error_kind: fn(String) -> ExecutionError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                error_kind,
            }
        }
    }

    #[async_trait]
    impl ExecutionService for ScriptedService {
        async fn submit_rebalance(
            &self,
            _wallet: &str,
            _target: &Allocation,
            _slippage_tolerance_percent: f64,
        ) -> Result<ExecutionReceipt, ExecutionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err((self.error_kind)(format!("scripted failure {call}")))
            } else {
                Ok(ExecutionReceipt {
                    execution_id: "exec_test".to_string(),
                    status: ExecutionStatus::Confirmed,
                    tx_reference: Some("0xdeadbeef".to_string()),
                })
            }
        }
    }

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            submit_timeout_secs: 5,
            max_attempts: 3,
            backoff_base_ms: 1,
        }
    }

    fn target() -> Allocation {
        Allocation::from([("ETH", 60.0), ("USDC", 40.0)])
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let service = Arc::new(ScriptedService::new(2, ExecutionError::Network));
        let gateway = ExecutionGateway::new(Arc::clone(&service) as _, fast_config());

        let receipt = gateway.submit("0xwallet", &target(), 1.0).await.unwrap();
        assert_eq!(receipt.execution_id, "exec_test");
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let service = Arc::new(ScriptedService::new(10, ExecutionError::Network));
        let gateway = ExecutionGateway::new(Arc::clone(&service) as _, fast_config());

        let err = gateway.submit("0xwallet", &target(), 1.0).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let service = Arc::new(ScriptedService::new(10, ExecutionError::GasEstimation));
        let gateway = ExecutionGateway::new(Arc::clone(&service) as _, fast_config());

        let err = gateway.submit("0xwallet", &target(), 1.0).await.unwrap_err();
        assert!(matches!(err, ExecutionError::GasEstimation(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn insufficient_funds_is_terminal() {
        let service = Arc::new(ScriptedService::new(10, ExecutionError::InsufficientFunds));
        let gateway = ExecutionGateway::new(Arc::clone(&service) as _, fast_config());

        let err = gateway.submit("0xwallet", &target(), 1.0).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InsufficientFunds(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
