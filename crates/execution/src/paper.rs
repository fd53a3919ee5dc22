//! Paper execution service: simulated submissions with zero external calls.

use async_trait::async_trait;
use driftwatch_core::types::ExecutionStatus;
use driftwatch_core::{Allocation, ExecutionError, ExecutionReceipt, ExecutionService};

/// Simulated execution service.
///
/// Accepts any structurally valid rebalance and fabricates a receipt. It is
/// impossible to move real funds through this service, which makes it safe
/// for running the monitor end to end before wiring a live execution
/// backend, and for tests.
pub struct PaperExecutionService;

impl PaperExecutionService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PaperExecutionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionService for PaperExecutionService {
    async fn submit_rebalance(
        &self,
        wallet: &str,
        target: &Allocation,
        slippage_tolerance_percent: f64,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        if target.is_empty() {
            return Err(ExecutionError::InvalidAllocation(
                "target allocation is empty".to_string(),
            ));
        }
        let total = target.total();
        if (total - 100.0).abs() > 1.0 {
            return Err(ExecutionError::InvalidAllocation(format!(
                "target allocation sums to {total:.2}%"
            )));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        tracing::info!(
            wallet,
            slippage_tolerance_percent,
            "Paper execution: simulated rebalance submission"
        );
        Ok(ExecutionReceipt {
            execution_id: format!("exec_{}", &id[..8]),
            status: ExecutionStatus::Confirmed,
            tx_reference: Some(format!("0xsim{id}")),
        })
    }
}
