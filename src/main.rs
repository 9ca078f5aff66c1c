//! OKX volatility-discount quoting bot entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use okx_quoter::config::{Config, PricingMode, DEFAULT_CONFIG_PATH};
use okx_quoter::market::OkxClient;
use okx_quoter::metrics;
use okx_quoter::notify::{DisabledNotifier, FeishuNotifier, Notifier};
use okx_quoter::strategy::{Quoter, QuoterSettings};
use okx_quoter::trading::ReplaceOutcome;
use okx_quoter::utils::shutdown_signal;

/// OKX volatility-discount quoting bot.
#[derive(Parser, Debug)]
#[command(name = "okx-quoter")]
#[command(about = "Keeps one volatility-discounted limit buy resting per OKX instrument")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the quoting loop (default).
    Run {
        /// Price and convert, but never cancel or place orders.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single cycle and exit.
    Once {
        /// Price and convert, but never cancel or place orders.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Print volatility and target price per instrument without trading.
    /// Needs no API credentials.
    Volatility,
}

// Current-thread runtime: the loop is strictly sequential.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::CheckConfig) => {
            let _guard = init_logging(args.verbose, None)?;
            cmd_check_config(&args.config)
        }
        Some(Command::Volatility) => {
            // Public endpoints only: credentials may be empty.
            let config = Config::load(&args.config)?;
            config
                .validate_settings()
                .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
            let _guard = init_logging(args.verbose, Some(&config.log_dir))?;
            cmd_volatility(config).await
        }
        Some(Command::Once { dry_run }) => {
            let config = load_config(&args.config)?;
            let _guard = init_logging(args.verbose, Some(&config.log_dir))?;
            cmd_once(config, dry_run).await
        }
        Some(Command::Run { dry_run }) => {
            let config = load_config(&args.config)?;
            let _guard = init_logging(args.verbose, Some(&config.log_dir))?;
            cmd_run(config, dry_run).await
        }
        None => {
            let config = load_config(&args.config)?;
            let _guard = init_logging(args.verbose, Some(&config.log_dir))?;
            cmd_run(config, false).await
        }
    }
}

/// Console logging, plus a daily-rotated file when `log_dir` is given.
///
/// The returned guard flushes the file writer and must outlive the program.
fn init_logging(verbose: bool, log_dir: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("okx_quoter=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("okx")
                .filename_suffix("log")
                .max_log_files(7)
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Load and validate configuration.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
    Ok(config)
}

/// Wire the OKX client and notifier into a quoter.
fn build_quoter(config: &Config) -> anyhow::Result<Quoter> {
    let client = Arc::new(OkxClient::new(config)?);

    let notifier: Arc<dyn Notifier> = if config.notifications_enabled() {
        Arc::new(FeishuNotifier::new(
            config.feishu_webhook.clone(),
            Duration::from_millis(config.http_timeout_ms),
        )?)
    } else {
        warn!("feishu_webhook is empty, notifications disabled");
        Arc::new(DisabledNotifier)
    };

    Ok(Quoter::new(
        client.clone(),
        client,
        notifier,
        config.trading_pairs.clone(),
        QuoterSettings::from_config(config),
    ))
}

fn init_metrics(config: &Config) -> anyhow::Result<()> {
    metrics::init_metrics();
    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }
    Ok(())
}

fn log_startup(config: &Config) {
    info!("Mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE TRADING" });
    info!(
        "Account: {}",
        if config.okx.simulated { "simulated" } else { "production" }
    );
    info!("Pricing: {}", config.pricing);
    info!("Bar: {} x {}", config.bar, config.candle_limit);
    info!("Interval: {}s", config.monitor_interval);
    for pair in &config.trading_pairs {
        info!("Pair: {} ({} USDT)", pair.inst_id, pair.amount_usdt);
    }
}

/// Check configuration validity.
fn cmd_check_config(path: &Path) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("OKX QUOTER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading {}... ", path.display());
    let config = match Config::load(path) {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Base URL: {}", config.okx.base_url);
    println!("  Simulated: {}", config.okx.simulated);
    println!("  Trade Mode: {}", config.trade_mode);
    match config.pricing {
        PricingMode::Volatility => println!(
            "  Pricing: volatility (ATR {}, amplitude {}, floor {}%)",
            config.atr_period, config.amplitude_period, config.discount_floor_pct
        ),
        PricingMode::Fixed => println!("  Pricing: fixed factor {}", config.fixed_price_factor),
    }
    println!("  Candles: {} x {}", config.candle_limit, config.bar);
    println!("  Interval: {}s", config.monitor_interval);
    println!("  Dry Run: {}", config.dry_run);
    println!(
        "  Notifications: {}",
        if config.notifications_enabled() { "Enabled" } else { "Disabled" }
    );
    println!("  Log Dir: {}", config.log_dir);
    match config.metrics_port {
        Some(port) => println!("  Metrics: 0.0.0.0:{}", port),
        None => println!("  Metrics: Disabled"),
    }
    println!("  Pairs:");
    for pair in &config.trading_pairs {
        println!("    - {} ({} USDT)", pair.inst_id, pair.amount_usdt);
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print pricing for every pair without touching orders.
async fn cmd_volatility(config: Config) -> anyhow::Result<()> {
    let quoter = build_quoter(&config)?;

    println!("======================================================================");
    println!("OKX QUOTER - VOLATILITY REPORT ({} x {})", config.candle_limit, config.bar);
    println!("======================================================================");
    println!(
        "{:<20} {:>14} {:>12} {:>10} {:>10} {:>14}",
        "Instrument", "Mark", "ATR", "Amp %", "Disc %", "Target"
    );

    for pair in quoter.pairs() {
        match quoter.price(&pair.inst_id).await {
            Ok(pricing) => {
                let (atr, amplitude) = pricing
                    .report
                    .map(|r| (format!("{:.6}", r.atr), format!("{:.4}", r.average_amplitude_pct)))
                    .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
                println!(
                    "{:<20} {:>14.6} {:>12} {:>10} {:>10.4} {:>14.6}",
                    pair.inst_id,
                    pricing.quote.mark_price,
                    atr,
                    amplitude,
                    pricing.quote.discount_pct,
                    pricing.quote.target_price
                );
            }
            Err(e) => println!("{:<20} FAILED: {}", pair.inst_id, e),
        }
    }

    println!("======================================================================");
    Ok(())
}

/// Run one cycle and exit.
async fn cmd_once(mut config: Config, dry_run: bool) -> anyhow::Result<()> {
    config.dry_run |= dry_run;
    init_metrics(&config)?;
    log_startup(&config);

    let quoter = build_quoter(&config)?;
    let start = Instant::now();

    match quoter.run_cycle().await {
        Ok(results) => {
            metrics::record_cycle(start);
            for result in &results {
                match &result.replacement.outcome {
                    ReplaceOutcome::Placed { order_id, intent } => {
                        info!("{}: placed {} @ {} ({})", result.inst_id, intent.size, intent.price, order_id)
                    }
                    ReplaceOutcome::DryRun { intent } => {
                        info!("{}: would place {} @ {}", result.inst_id, intent.size, intent.price)
                    }
                    ReplaceOutcome::ConversionRejected { code, msg } => {
                        warn!("{}: conversion rejected ({}): {}", result.inst_id, code, msg)
                    }
                    ReplaceOutcome::SizeTooSmall => info!("{}: size too small, skipped", result.inst_id),
                }
            }
            Ok(())
        }
        Err(e) => {
            quoter.report_failure(&e).await;
            Err(e.into())
        }
    }
}

/// Run the quoting loop until a shutdown signal.
async fn cmd_run(mut config: Config, dry_run: bool) -> anyhow::Result<()> {
    config.dry_run |= dry_run;
    init_metrics(&config)?;

    info!("========================================");
    info!("OKX QUOTER STARTED");
    info!("========================================");
    log_startup(&config);
    info!("========================================");

    let quoter = build_quoter(&config).map_err(|e| {
        error!("Failed to build quoter: {}", e);
        e
    })?;

    quoter.run(shutdown_signal()).await;

    info!("Quoter stopped");
    Ok(())
}
