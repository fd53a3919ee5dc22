use std::sync::Arc;

use chrono::Utc;
use driftwatch_core::{
    Allocation, AppConfig, MonitoringConfig, RiskProfile, TrendDirection,
};
use driftwatch_execution::PaperExecutionService;
use driftwatch_market::SimulatedMarketFeed;
use driftwatch_monitor::{ActionLog, ConfigStore, MonitorService, SimulatedAllocationProvider};
use rust_decimal_macros::dec;

fn paper_service(allocations: Arc<SimulatedAllocationProvider>) -> MonitorService {
    let mut config = AppConfig::default();
    config.gateway.backoff_base_ms = 1;
    config.market.refresh_interval_secs = 1;

    MonitorService::new(
        Arc::new(ConfigStore::new()),
        Arc::new(ActionLog::new()),
        allocations,
        Arc::new(SimulatedMarketFeed::calm()),
        Arc::new(PaperExecutionService::new()),
        config,
    )
}

async fn wait_for_fresh_snapshot(service: &MonitorService) {
    for _ in 0..50 {
        if let Some(market) = service.status().await.unwrap().market {
            if market.trend_direction == TrendDirection::Sideways
                && market.assessed_at > Utc::now() - chrono::Duration::minutes(1)
            {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("market assessor never published a fresh snapshot");
}

#[tokio::test]
async fn drifted_wallet_executes_then_respects_the_daily_cap() {
    let allocations = Arc::new(SimulatedAllocationProvider::new());
    // 16% total drift against the 60/25/15 target set below.
    allocations.set_portfolio(
        "0xwallet",
        Allocation::from([("ETH", 68.0), ("USDC", 20.0), ("LINK", 12.0)]),
        dec!(25000),
    );

    let service = paper_service(Arc::clone(&allocations));

    let mut config = MonitoringConfig::for_profile("0xwallet", RiskProfile::Balanced);
    config.auto_execute = true;
    config.max_daily_trades = 2;
    config.last_check = Some(Utc::now());
    service.upsert_wallet(config).await.unwrap();
    service
        .set_target(
            "0xwallet",
            Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]),
        )
        .await
        .unwrap();

    service.start().await.unwrap();
    wait_for_fresh_snapshot(&service).await;

    // Two executions are allowed, then the cap degrades to suggestions.
    for expected_count in 1..=2u32 {
        let record = service.force_check("0xwallet").await.unwrap();
        assert_eq!(record.action_type, driftwatch_core::ActionType::Execute);
        let receipt = record.execution.expect("executed cycle carries a receipt");
        assert!(receipt.execution_id.starts_with("exec_"));
        assert_eq!(
            service.get_wallet("0xwallet").await.unwrap().daily_trades_count,
            expected_count
        );
    }

    let record = service.force_check("0xwallet").await.unwrap();
    assert_eq!(record.action_type, driftwatch_core::ActionType::Suggest);
    assert!(record.reasoning.contains("cap"));
    assert_eq!(
        service.get_wallet("0xwallet").await.unwrap().daily_trades_count,
        2
    );

    // The audit trail has one record per cycle, newest first.
    let actions = service.recent_actions("0xwallet", 10).await.unwrap();
    assert_eq!(actions.len(), 3);
    assert_eq!(actions[0].action_type, driftwatch_core::ActionType::Suggest);
    assert_eq!(actions[1].action_type, driftwatch_core::ActionType::Execute);

    service.stop().await.unwrap();
}

#[tokio::test]
async fn suggestion_only_wallet_never_executes() {
    let allocations = Arc::new(SimulatedAllocationProvider::with_default(
        Allocation::from([("ETH", 68.0), ("USDC", 20.0), ("LINK", 12.0)]),
        dec!(25000),
    ));
    let service = paper_service(allocations);

    let mut config = MonitoringConfig::for_profile("0xwatcher", RiskProfile::Aggressive);
    config.auto_execute = false;
    config.last_check = Some(Utc::now());
    service.upsert_wallet(config).await.unwrap();
    service
        .set_target(
            "0xwatcher",
            Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]),
        )
        .await
        .unwrap();

    service.start().await.unwrap();
    wait_for_fresh_snapshot(&service).await;

    for _ in 0..3 {
        let record = service.force_check("0xwatcher").await.unwrap();
        assert_ne!(record.action_type, driftwatch_core::ActionType::Execute);
        assert!(record.execution.is_none());
    }
    assert_eq!(
        service.get_wallet("0xwatcher").await.unwrap().daily_trades_count,
        0
    );

    service.stop().await.unwrap();
}
