//! Backtest command implementation

use anyhow::Result;
use hover_breakout::strategies::format_params;
use hover_breakout::{Backtester, Config, EquitySettings};
use std::path::PathBuf;
use tracing::info;

use super::{load_series, write_json};

pub fn run(
    config_path: PathBuf,
    data_path: Option<PathBuf>,
    capital_override: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    info!("Starting backtest");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path.display());

    let params = config.strategy_params()?;
    info!("Strategy: {} ({})", params.pattern, format_params(&params));

    let mut equity = config.equity;
    if let Some(capital) = capital_override {
        if !(capital.is_finite() && capital > 0.0) {
            anyhow::bail!("--capital must be > 0, got {}", capital);
        }
        info!("Overriding starting balance to: {:.2}", capital);
        let settings = equity.get_or_insert_with(EquitySettings::default);
        settings.starting_balance = capital;
    }

    let series = load_series(&config, data_path)?;
    if series.len() < params.min_bars() {
        info!(
            "Series has {} bars, {} needed for a signal; expect no trades",
            series.len(),
            params.min_bars()
        );
    }

    let mut backtester = Backtester::new(params)?;
    if let Some(settings) = equity {
        backtester = backtester.with_equity(settings);
    }

    info!("Running backtest...");
    let result = backtester.run(&series);
    let m = &result.metrics;

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Bars:               {}", series.len());
    println!("Total Trades:       {}", m.total_trades);
    println!("Winning Trades:     {}", m.wins);
    println!("Losing Trades:      {}", m.losses);
    println!("Win Rate:           {:.2}%", m.win_rate * 100.0);
    println!("Net Profit:         {:.5}", m.net_profit);
    println!("Average Win:        {:.5}", m.avg_win);
    println!("Average Loss:       {:.5}", m.avg_loss);
    println!("Risk/Reward:        {:.2}", m.risk_reward);
    println!("Expectancy:         {:.5}", m.expectancy);
    println!("Kelly Fraction:     {:.4}", m.kelly_fraction);
    println!("Max Drawdown:       {:.5}", m.max_drawdown);
    println!("{}", "-".repeat(60));
    println!(
        "Exits:              {} TP / {} SL / {} timeout",
        m.take_profit_hits, m.stop_loss_hits, m.timeouts
    );
    if let (Some(curve), Some(settings)) = (&result.equity, equity) {
        println!("{}", "-".repeat(60));
        println!("Starting Balance:   {:.2}", curve.starting_balance());
        println!(
            "Stake Fraction:     {:.4}",
            settings.stake.resolve(&result.metrics)
        );
        println!("Final Balance:      {:.2}", curve.final_balance());
        println!("Total Return:       {:.2}%", curve.total_return_pct());
        println!(
            "Max Drawdown:       {:.2} ({:.2}%)",
            curve.max_drawdown(),
            m.max_drawdown_pct
        );
    }
    println!("{}", "=".repeat(60));

    if let Some(path) = output {
        write_json(&path, &result)?;
    }

    info!("Backtest completed successfully");

    Ok(())
}
