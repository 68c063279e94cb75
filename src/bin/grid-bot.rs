// Range Grid Bot - CLI
// Single entry point for grid inspection, reports, pre-flight checks and paper runs

use clap::{Parser, Subcommand};
use range_grid_bot::core::types::limits;
use range_grid_bot::{
    calculate_grid_levels, generate_grid_report, BotConfig, ConfigError, GridBot, PaperGateway, PreFlightValidator,
    TradingError,
};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grid-bot")]
#[command(version = "0.3.0")]
#[command(about = "Forex Range Grid Trading Bot", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print every grid level
    Levels {
        /// Market price used for context
        #[arg(short, long)]
        price: Option<f64>,
    },

    /// Profitability report for the configured grid
    Report {
        /// Current market price
        #[arg(short, long)]
        price: f64,

        /// Average spread in pips
        #[arg(short, long, default_value_t = range_grid_bot::core::DEFAULT_REPORT_SPREAD_PIPS)]
        spread: f64,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the startup checks against a paper account
    Check {
        /// Paper account balance
        #[arg(short, long, default_value = "10000")]
        balance: f64,

        /// Paper market price (defaults to the range centre)
        #[arg(short, long)]
        price: Option<f64>,
    },

    /// Run the trading loop
    Run {
        /// Trade against the in-memory paper gateway
        #[arg(long)]
        paper: bool,

        /// Stop after this many minutes
        #[arg(short, long)]
        minutes: Option<u64>,

        /// Paper starting price (defaults to the range centre)
        #[arg(long)]
        start_price: Option<f64>,

        /// Paper account balance
        #[arg(short, long, default_value = "10000")]
        balance: f64,

        /// Largest relative price step per cycle for the paper market
        #[arg(long, default_value = "0.0002")]
        drift: f64,

        /// Override monitoring.check_interval_seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

/// Spread quoted by the paper gateway, in pips
const PAPER_SPREAD_PIPS: f64 = 1.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Config is read before logging so monitoring.log_level can set the filter
    let loaded = BotConfig::from_file(&cli.config);
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|config| config.monitoring.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Range Grid Bot v0.3.0");
    info!("📁 Config: {}", cli.config);

    match cli.command {
        // Init doesn't require config (it creates it)
        Commands::Init { force } => init_config(&cli.config, force)?,
        Commands::Levels { price } => {
            let config = config_or_exit(loaded);
            show_levels(&config, price)?;
        }
        Commands::Report { price, spread, json } => {
            let config = config_or_exit(loaded);
            show_report(&config, price, spread, json)?;
        }
        Commands::Check { balance, price } => {
            let config = config_or_exit(loaded);
            run_checks(&config, balance, price)?;
        }
        Commands::Run {
            paper,
            minutes,
            start_price,
            balance,
            drift,
            interval_secs,
        } => {
            if !paper {
                error!("❌ Only paper trading is available from the CLI");
                error!("💡 Pass --paper, or drive GridBot with your own OrderGateway");
                std::process::exit(2);
            }
            let config = config_or_exit(loaded);
            run_paper(&config, minutes, start_price, balance, drift, interval_secs).await?;
        }
    }

    Ok(())
}

/// Unwrap the loaded config or exit with a helpful error message
fn config_or_exit(loaded: Result<BotConfig, ConfigError>) -> BotConfig {
    match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration Error");
            for line in TradingError::from(e).user_message().lines() {
                error!("{}", line);
            }
            std::process::exit(1);
        }
    }
}

fn exit_on_error(e: TradingError) -> ! {
    for line in e.user_message().lines() {
        error!("❌ {}", line);
    }
    std::process::exit(1);
}

fn init_config(config_path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("🔧 Initializing configuration...");

    if Path::new(config_path).exists() && !force {
        warn!("⚠️  {} already exists, skipping (use --force to overwrite)", config_path);
        return Ok(());
    }

    let default_config = include_str!("../../config.toml.example");
    std::fs::write(config_path, default_config)?;
    info!("📝 Created {}", config_path);

    info!("✅ Configuration initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Edit {} with your grid range and limits", config_path);
    info!("   2. Run: grid-bot report --price <current price>");
    info!("   3. Run: grid-bot run --paper --minutes 10");
    Ok(())
}

fn show_levels(config: &BotConfig, price: Option<f64>) -> Result<(), Box<dyn std::error::Error>> {
    let grid = config.grid_config()?;
    let levels = calculate_grid_levels(&grid, price).unwrap_or_else(|e| exit_on_error(e));

    info!("📐 Grid Levels - {}", grid.instrument());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for level in levels.sell_levels().iter().rev() {
        info!("  SELL {:.5}", level);
    }
    if let Some(price) = price {
        info!("  ---- {:.5} (current)", price);
    }
    for level in levels.buy_levels().iter().rev() {
        info!("  BUY  {:.5}", level);
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "Total: {} levels, {:.2} pips apart",
        levels.total_levels(),
        levels.grid_spacing_pips()
    );
    Ok(())
}

fn show_report(config: &BotConfig, price: f64, spread: f64, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let grid = config.grid_config()?;
    let report = generate_grid_report(&grid, price, spread).unwrap_or_else(|e| exit_on_error(e));

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn paper_gateway(config: &BotConfig, balance: f64, price: Option<f64>) -> Result<PaperGateway, Box<dyn std::error::Error>> {
    let grid = config.grid_config()?;
    let price = price.unwrap_or_else(|| grid.center());
    if !limits::price_in_range(price) {
        exit_on_error(TradingError::invalid_param("price", format!("out of range: {}", price)));
    }
    Ok(PaperGateway::new(grid.instrument(), balance, price, PAPER_SPREAD_PIPS))
}

fn run_checks(config: &BotConfig, balance: f64, price: Option<f64>) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = paper_gateway(config, balance, price)?;
    let bot = GridBot::new(config, gateway).unwrap_or_else(|e| exit_on_error(e));

    let mut result = bot.startup_checks();
    let static_checks = PreFlightValidator::<PaperGateway>::validate_grid(bot.grid(), bot.gate().limits());
    for check in static_checks.checks {
        result.add_check(check);
    }
    result.display();

    if !result.passed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_paper(
    config: &BotConfig,
    minutes: Option<u64>,
    start_price: Option<f64>,
    balance: f64,
    drift: f64,
    interval_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = paper_gateway(config, balance, start_price)?
        .with_drift(drift)
        .unwrap_or_else(|e| exit_on_error(e));
    let mut bot = GridBot::new(config, gateway).unwrap_or_else(|e| exit_on_error(e));
    if let Some(secs) = interval_secs {
        bot = bot.with_check_interval(Duration::from_secs(secs.max(1)));
    }

    if !bot.startup_checks().passed {
        error!("❌ Startup checks failed, not trading");
        std::process::exit(1);
    }

    bot.initialize_grid().unwrap_or_else(|e| exit_on_error(e));

    let kill_switch = bot.kill_switch();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            kill_switch.activate("Stopped by user (Ctrl+C)");
        }
    });

    let duration = minutes.map(|m| Duration::from_secs(m.saturating_mul(60)));
    let stats = bot
        .run_with(duration, |gateway| gateway.tick())
        .await
        .unwrap_or_else(|e| exit_on_error(e));

    info!("📊 BOT STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Timestamp: {}", stats.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    info!("Balance: ${:.2}", stats.balance);
    info!("Equity: ${:.2}", stats.equity);
    info!("Unrealized P&L: ${:.2}", stats.unrealized_pl);
    info!("Open Positions: {}", stats.open_positions);
    info!("Pending Orders: {}", stats.pending_orders);
    info!("Iterations: {} | Orders placed: {}", stats.iterations, stats.orders_placed);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    Ok(())
}
