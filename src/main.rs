//! Launch-market sniper.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the launchpad gateway and runs the acquisition scheduler
//! until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use launch_sniper::config;
use launch_sniper::engine::scheduler::Sniper;
use launch_sniper::engine::shutdown_channel;
use launch_sniper::platforms::launchpad::LaunchpadClient;
use launch_sniper::strategy::{EligibilityFilter, ExitPolicy};
use launch_sniper::types::format_e8s;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SNIPER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        identity = %cfg.agent.identity,
        commitment = %format_e8s(cfg.trading.commitment),
        reserve_sell_threshold = %format_e8s(cfg.trading.reserve_sell_threshold),
        max_concurrent = cfg.trading.max_concurrent_buy_tasks,
        "Sniper starting up"
    );

    let client = LaunchpadClient::new(
        &cfg.market.gateway_url,
        &cfg.market.canister_id,
        cfg.agent.identity.clone(),
        cfg.api_key()?,
        cfg.request_timeout(),
    )?;

    if cfg.trading.deposit_on_start > 0 {
        client.deposit(cfg.trading.deposit_on_start).await?;
        info!(amount = %format_e8s(cfg.trading.deposit_on_start), "Deposited into trading account");
    }

    let sniper = Arc::new(Sniper::new(
        Arc::new(client),
        EligibilityFilter::new(cfg.filter_config()),
        ExitPolicy::new(cfg.exit_config()),
        cfg.scheduler_config(),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler = tokio::spawn(Arc::clone(&sniper).run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.await {
        error!(error = %e, "Scheduler task failed");
    }

    info!(
        still_claimed = sniper.cache().len(),
        "Sniper shut down cleanly."
    );
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("launch_sniper=info"));

    let json_logging = std::env::var("SNIPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
