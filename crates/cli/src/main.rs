use anyhow::Result;
use clap::{Parser, Subcommand};
use paper_trade_backtest::{load_candles, BacktestEngine};
use paper_trade_bot_orchestrator::{ExecutionWrapper, Trader};
use paper_trade_bybit::{BybitClient, BybitMarketData};
use paper_trade_core::config::{AppConfig, MarketDataSource};
use paper_trade_core::traits::MarketData;
use paper_trade_core::ConfigLoader;
use paper_trade_data::{JsonTradeStore, MockMarketData};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "paper-trade")]
#[command(about = "Risk-managed cryptocurrency paper trading", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a trading session (mock or Bybit data, paper or live fills)
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Replay a historical candle file through the trading stack
    Backtest {
        /// Candle CSV file (timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,
        /// Symbol the candles belong to (e.g. "BTCUSDT")
        #[arg(short, long)]
        symbol: String,
        /// Config file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Print stored trade statistics
    Trades {
        /// Trade history JSON file (defaults to the configured path)
        #[arg(short, long)]
        file: Option<String>,
        /// Export the history to a CSV file
        #[arg(short, long)]
        export: Option<String>,
        /// Config file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
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
        Commands::Run { config } => run_trader(&config).await?,
        Commands::Backtest {
            data,
            symbol,
            config,
        } => run_backtest(&data, &symbol, &config).await?,
        Commands::Trades {
            file,
            export,
            config,
        } => show_trades(file.as_deref(), export.as_deref(), &config)?,
    }
    Ok(())
}

async fn run_trader(config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    info!(path = config_path, "configuration loaded");

    let executor = ExecutionWrapper::from_config(&config)?;
    let store = Arc::new(JsonTradeStore::from_config(&config.storage));

    match config.data.source {
        MarketDataSource::Mock => {
            info!("using mock market data");
            let market = MockMarketData::from_config(&config);
            start_trader(&config, market, executor, store).await
        }
        MarketDataSource::Bybit => {
            let client = Arc::new(BybitClient::from_config(&config)?);
            info!(rest_url = %client.base_url(), "using Bybit market data");
            let market = BybitMarketData::new(client, config.data.candle_interval_min);
            start_trader(&config, market, executor, store).await
        }
    }
}

async fn start_trader<M>(
    config: &AppConfig,
    market: M,
    executor: ExecutionWrapper,
    store: Arc<JsonTradeStore>,
) -> Result<()>
where
    M: MarketData + 'static,
{
    let (trader, handle) = Trader::new(config, market, executor, store);
    let task = tokio::spawn(trader.run());

    wait_for_shutdown_signal().await?;

    handle.stop().await?;
    task.await??;
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
    }
    Ok(())
}

async fn run_backtest(data_path: &str, symbol: &str, config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let candles = load_candles(Path::new(data_path), symbol)?;
    let mut engine = BacktestEngine::from_config(&config);
    let report = engine.run(symbol, &candles).await?;
    println!("{report}");
    Ok(())
}

fn show_trades(file: Option<&str>, export: Option<&str>, config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let path = file.map_or_else(
        || PathBuf::from(&config.storage.trades_file),
        PathBuf::from,
    );
    let store = JsonTradeStore::new(path.clone());
    let stats = store.statistics();

    println!("Trade history: {}", path.display());
    println!("  Total trades:   {}", stats.total_trades);
    println!("  Winning trades: {}", stats.winning_trades);
    println!("  Losing trades:  {}", stats.losing_trades);
    println!("  Win rate:       {:.2}%", stats.win_rate);
    println!("  Total PnL:      ${:.2}", stats.total_pnl);
    println!("  Average PnL:    ${:.2}", stats.average_pnl);
    if let Some(best) = &stats.best_trade {
        println!("  Best trade:     {} ${:.2}", best.symbol, best.net_pnl);
    }
    if let Some(worst) = &stats.worst_trade {
        println!("  Worst trade:    {} ${:.2}", worst.symbol, worst.net_pnl);
    }

    if let Some(csv_path) = export {
        store.export_csv(Path::new(csv_path))?;
        println!("Exported {} trades to {}", stats.total_trades, csv_path);
    }
    Ok(())
}
