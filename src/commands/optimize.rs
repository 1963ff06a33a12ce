//! Optimize command implementation with progress tracking

use anyhow::{Context, Result};
use hover_breakout::strategies::format_params;
use hover_breakout::{Config, Objective, OptimizationResult, Optimizer};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use super::{load_series, write_json};

pub struct OptimizeArgs {
    pub config_path: PathBuf,
    pub data_path: Option<PathBuf>,
    pub objective: Option<String>,
    pub top: Option<usize>,
    pub overrides: Vec<String>,
    pub sequential: bool,
    pub output: Option<PathBuf>,
}

pub fn run(args: OptimizeArgs) -> Result<()> {
    info!("Starting optimization");

    let mut config = Config::from_file(&args.config_path)?;
    info!("Loaded configuration from: {}", args.config_path.display());

    // Overrides are in config units and get converted with the rest of the grid
    config
        .grid
        .apply_overrides(&args.overrides)
        .context("Invalid --override")?;

    let objective = match args.objective {
        Some(s) => s.parse::<Objective>()?,
        None => config.optimizer.objective,
    };
    let top = args.top.unwrap_or(config.optimizer.top);

    let base = config.strategy_params()?;
    let grid = config.resolved_grid();
    let total = grid.total_combinations();
    info!("Base parameters: {}", format_params(&base));
    info!("Parameter combinations: {}", total);

    let series = load_series(&config, args.data_path)?;

    let mut optimizer = Optimizer::new(base).with_objective(objective);
    if let Some(settings) = config.equity {
        optimizer = optimizer.with_equity(settings);
    }

    println!("\n{}", "=".repeat(70));
    println!("OPTIMIZATION SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Bars:          {}", series.len());
    for (name, values) in grid.axes() {
        println!("  {:<14} {} values", format!("{}:", name), values.len());
    }
    println!("  Total tests:   {}", total);
    println!("  Objective:     {}", objective);
    println!(
        "  Mode:          {}",
        if args.sequential {
            "sequential"
        } else {
            "parallel"
        }
    );
    println!("{}\n", "=".repeat(70));

    let results = if args.sequential {
        optimizer.optimize_sequential(&series, &grid)?
    } else {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec}] {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("█░ "),
        );
        pb.set_message("running");
        pb.tick();

        let results = optimizer.optimize_with_progress(&series, &grid, &pb)?;
        pb.finish_with_message("done");
        println!();
        results
    };

    let with_trades = results.iter().filter(|r| r.metrics.total_trades > 0).count();
    info!(
        "Total results: {} ({} with trades), sorted by: {}",
        results.len(),
        with_trades,
        objective
    );

    print_results(&results, top, objective, config.equity.is_some());

    if let Some(path) = args.output {
        write_json(&path, &results)?;
    }

    info!("Optimization completed successfully");

    Ok(())
}

fn print_results(results: &[OptimizationResult], top: usize, objective: Objective, has_equity: bool) {
    let display_count = top.min(results.len());
    let profit_header = if has_equity { "Equity" } else { "NetProfit" };

    println!("\n{}", "=".repeat(120));
    println!(
        "TOP {} OPTIMIZATION RESULTS (sorted by {})",
        display_count, objective
    );
    println!("{}", "=".repeat(120));
    println!(
        "{:<4} {:>12} {:>6} {:>7} {:>10} {:>8} {:>10} | Parameters",
        "Rank", profit_header, "Trades", "WinR%", "Expect", "Kelly", "MaxDD"
    );
    println!("{}", "-".repeat(120));

    for (i, result) in results.iter().take(top).enumerate() {
        let m = &result.metrics;
        println!(
            "{:<4} {:>12.5} {:>6} {:>7.2} {:>10.6} {:>8.4} {:>10.5} | {}",
            i + 1,
            result.final_equity_or_net_profit(),
            m.total_trades,
            m.win_rate * 100.0,
            m.expectancy,
            m.kelly_fraction,
            m.max_drawdown,
            format_params(&result.params)
        );
    }
    println!("{}", "=".repeat(120));
}
