//! Hover Breakout Backtesting
//!
//! A deterministic backtesting and evaluation engine for range-breakout
//! strategies on OHLC price series, with trade-level metrics, equity
//! simulation, and parallel grid optimization.
//!
//! All distances (range threshold, take profit, stop loss, spread) are price
//! units. Pip-denominated configs are converted by [`Config`] at load time.
//!
//! ## Example
//! ```no_run
//! use hover_breakout::backtest::Backtester;
//! use hover_breakout::{data, StrategyParams};
//!
//! fn main() -> anyhow::Result<()> {
//!     let series = data::load_csv("data/EURUSD_30m.csv")?;
//!     let params = StrategyParams::new(10, 0.0008, 0.0012, 0.0020, 12, 0.0002)?;
//!     let result = Backtester::new(params)?.run(&series);
//!     println!("{} trades, net {:.5}", result.metrics.total_trades, result.metrics.net_profit);
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod grid;
pub mod metrics;
pub mod optimizer;
pub mod risk;
pub mod strategies;
pub mod types;

pub use backtest::{BacktestResult, Backtester, EquitySettings};
pub use config::Config;
pub use grid::{GridError, ParameterGrid};
pub use metrics::{apply_equity, compute_metrics};
pub use optimizer::{CancelToken, Objective, OptimizationResult, Optimizer, Ranking};
pub use risk::{simulate_equity, EquityCurve, StakePolicy};
pub use strategies::{ParamsError, StrategyParams};
pub use types::*;
