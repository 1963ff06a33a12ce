//! Hover breakout - main entry point
//!
//! This binary provides two subcommands:
//! - backtest: Run one parameter set over a price series
//! - optimize: Run a parameter grid and rank the results

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "hover-breakout")]
#[command(about = "Hover breakout backtesting with metrics, equity simulation, and grid optimization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single backtest
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/eurusd_m30.json")]
        config: PathBuf,

        /// CSV price file (overrides data_path in the config)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Starting balance for the equity replay
        #[arg(long)]
        capital: Option<f64>,

        /// Write trades, metrics, and equity curve as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run parameter optimization
    Optimize {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/eurusd_m30.json")]
        config: PathBuf,

        /// CSV price file (overrides data_path in the config)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Ranking objective: default, net_profit, final_equity, expectancy, win_rate, kelly
        #[arg(long)]
        objective: Option<String>,

        /// Number of top results to display
        #[arg(short, long)]
        top: Option<usize>,

        /// Grid overrides in config units (e.g. -O lookback=5,10,20)
        #[arg(short = 'O', long = "override")]
        overrides: Vec<String>,

        /// Run sequentially instead of in parallel
        #[arg(long)]
        sequential: bool,

        /// Write ranked results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Optimizer: keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Optimize { .. } => ("optimize", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            data,
            capital,
            output,
        } => commands::backtest::run(config, data, capital, output),

        Commands::Optimize {
            config,
            data,
            objective,
            top,
            overrides,
            sequential,
            output,
        } => commands::optimize::run(commands::optimize::OptimizeArgs {
            config_path: config,
            data_path: data,
            objective,
            top,
            overrides,
            sequential,
            output,
        }),
    }
}
