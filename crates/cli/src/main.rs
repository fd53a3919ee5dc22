use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use driftwatch_core::ConfigLoader;
use driftwatch_execution::PaperExecutionService;
use driftwatch_market::SimulatedMarketFeed;
use driftwatch_monitor::{
    default_target, ActionLog, ConfigStore, MonitorDatabase, MonitorService,
    SimulatedAllocationProvider,
};
use driftwatch_web_api::ApiServer;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(about = "Autonomous portfolio drift monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor daemon with the web API
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Leave monitoring stopped until the API asks for a start
        #[arg(long)]
        manual_start: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            manual_start,
        } => {
            run_monitor(&config, manual_start).await?;
        }
    }

    Ok(())
}

async fn run_monitor(config_path: &str, manual_start: bool) -> Result<()> {
    tracing::info!("Starting driftwatch daemon with config: {}", config_path);
    let config = ConfigLoader::load_from(config_path)?;

    // Ensure the SQLite file's directory exists before connecting.
    if let Some(file_path) = config.database.url.strip_prefix("sqlite://") {
        let path = std::path::Path::new(file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    tracing::info!("Initializing monitor database at: {}", config.database.url);
    let database = Arc::new(MonitorDatabase::new(&config.database.url).await?);

    let store = Arc::new(ConfigStore::with_database(Arc::clone(&database)));
    let restored = store.load_persisted().await?;
    tracing::info!(configs = restored, "Loaded persisted wallet configs");
    let log = Arc::new(ActionLog::with_database(database));

    // Paper collaborators: simulated balances, market factors, and
    // executions until live integrations are wired in.
    let allocations = Arc::new(SimulatedAllocationProvider::with_default(
        default_target(),
        Decimal::from(10_000),
    ));
    let market_feed = Arc::new(SimulatedMarketFeed::calm());
    let execution = Arc::new(PaperExecutionService::new());

    let service = Arc::new(MonitorService::new(
        store,
        log,
        allocations,
        market_feed,
        execution,
        config.clone(),
    ));

    if manual_start {
        tracing::info!("Monitoring left stopped; start it via the API");
    } else {
        service.start().await?;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = ApiServer::new(Arc::clone(&service));

    tokio::select! {
        result = server.serve(&addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    service.stop().await?;
    tracing::info!("Daemon exited cleanly");
    Ok(())
}
