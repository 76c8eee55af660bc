use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use vigil::agent::CommandRouter;
use vigil::cli::{self, Cli, Commands};
use vigil::config::AppConfig;

mod main_runtime;

use main_runtime::{build, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load_with_symbol(&cli.config, cli.symbol.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config.display(), e);
            std::process::exit(2);
        }
    };
    init_logging(&config.logging);

    let router = build(&config).await?;
    info!(
        symbol = %config.market.symbol,
        min_confidence = config.agent.min_confidence,
        interval_ms = config.agent.cycle_interval_ms,
        "Vigil starting"
    );

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&router).await?,
        Commands::Auto => run_auto(&router).await?,
        Commands::Once => run_once(&router).await,
    }

    Ok(())
}

async fn run_chat(router: &CommandRouter) -> anyhow::Result<()> {
    router.controller().enter_chat().await?;
    let result = cli::shell::run(router).await;
    router.controller().stop().await?;
    result
}

async fn run_auto(router: &CommandRouter) -> anyhow::Result<()> {
    router.controller().enter_auto().await?;
    info!("Autonomous loop running, Ctrl+C to stop");

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown signal received");

    router.controller().stop().await?;
    let stats = router.agent().stats().await;
    info!(
        recorded = stats.recorded,
        trades = stats.trades,
        posts = stats.posts,
        failed = stats.failed,
        "Stopped"
    );
    Ok(())
}

async fn run_once(router: &CommandRouter) {
    let agent = router.agent();
    let epoch = router.controller().epoch().await;

    match agent.run_once(epoch).await.record() {
        Some(record) => {
            match &record.decision {
                Some(decision) => {
                    println!("{}", decision);
                    for reason in &decision.reasons {
                        println!("  - {}", reason);
                    }
                }
                None => println!("No decision, market data unavailable"),
            }
            println!("Result: {}", record.result);
        }
        None => warn!("Cycle was discarded"),
    }
}
