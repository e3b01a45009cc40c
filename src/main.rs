use anyhow::{Context, Result};
use clap::Parser;
use cryptopilot::execution::{Trader, TraderConfig};
use cryptopilot::strategy::{FibBollingerStrategy, Strategy};
use cryptopilot::{KrakenClient, Settings};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Fibonacci/Bollinger signal bot for Kraken
#[derive(Debug, Parser)]
#[command(name = "cryptopilot", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults to ./cryptopilot.* if present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Exit on the first failed cycle instead of waiting for the next one
    #[arg(long)]
    fail_fast: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing::info!("🚀 cryptopilot starting");
    log_settings(&settings);

    if !settings.has_credentials() {
        tracing::warn!("No API credentials configured, balance and order calls will fail");
    }

    let client = KrakenClient::from_settings(&settings).context("Failed to create Kraken client")?;
    let strategy = FibBollingerStrategy::new(settings.signal_config());
    tracing::info!(
        "Strategy: {} (needs {} candles)",
        strategy.name(),
        strategy.min_candles_required()
    );

    let trader = Trader::new(client, strategy, TraderConfig::from_settings(&settings));

    if cli.once {
        let mut stdout = std::io::stdout();
        trader.run_cycle(&mut stdout).await?;
    } else {
        trader
            .run_forever(Duration::from_secs(settings.wait_time_secs), cli.fail_fast)
            .await?;
    }

    tracing::info!("👋 cryptopilot stopped");
    Ok(())
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cryptopilot=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_settings(settings: &Settings) {
    tracing::info!("📊 Configuration:");
    tracing::info!("  Endpoint: {}", settings.api_url);
    tracing::info!("  Pair: {} ({})", settings.pair, settings.currency);
    tracing::info!("  Trade size: {}", settings.trade_size);
    tracing::info!("  Interval: {}m, lookback {}", settings.interval, settings.lookback_period);
    tracing::info!(
        "  Bollinger: period {}, dev +{}/-{}",
        settings.bbands_period,
        settings.bbands_dev_up,
        settings.bbands_dev_down
    );
    tracing::info!(
        "  Fibonacci: {:?} (sell {}, buy {})",
        settings.fib_levels,
        settings.sell_level,
        settings.buy_level
    );
    tracing::info!("  Wait between cycles: {}s", settings.wait_time_secs);
    tracing::info!("  Open order queries: {}", settings.query_open_orders);
}
