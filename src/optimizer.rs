//! Parallel grid search
//!
//! Every grid cell is an independent `(series, params)` run, so cells are
//! fanned out with rayon and collected back in enumeration order before a
//! single stable sort. Ties therefore keep grid order, and parallel and
//! sequential runs rank identically.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use indicatif::ProgressBar;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::backtest::{self, EquitySettings};
use crate::grid::{GridError, ParameterGrid};
use crate::metrics::{apply_equity, compute_metrics};
use crate::risk::simulate_equity;
use crate::strategies::StrategyParams;
use crate::{MetricsRecord, PriceSeries};

/// Optimization result for a single parameter combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub params: StrategyParams,
    pub metrics: MetricsRecord,
    /// Final balance of the equity replay, when one was configured
    pub final_equity: Option<f64>,
    /// Headline value of the objective used for ranking
    pub objective_score: f64,
}

impl OptimizationResult {
    pub fn final_equity_or_net_profit(&self) -> f64 {
        self.final_equity.unwrap_or(self.metrics.net_profit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown objective '{0}' (expected one of: default, net_profit, final_equity, expectancy, win_rate, kelly)")]
pub struct UnknownObjective(pub String);

/// Ranking key for grid results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Final equity (or net profit) desc, then trade count desc, then drawdown asc
    #[default]
    Default,
    NetProfit,
    FinalEquity,
    Expectancy,
    WinRate,
    Kelly,
}

impl Objective {
    /// Headline score, higher is better
    pub fn score(&self, result: &OptimizationResult) -> f64 {
        let m = &result.metrics;
        match self {
            Objective::Default | Objective::FinalEquity => result.final_equity_or_net_profit(),
            Objective::NetProfit => m.net_profit,
            Objective::Expectancy => m.expectancy,
            Objective::WinRate => m.win_rate,
            Objective::Kelly => m.kelly_fraction,
        }
    }

    /// Order `a` relative to `b`; `Less` ranks `a` first.
    ///
    /// Named objectives sort by their score and fall back to the default key
    /// on ties.
    pub fn compare(&self, a: &OptimizationResult, b: &OptimizationResult) -> Ordering {
        let primary = match self {
            Objective::Default => Ordering::Equal,
            _ => OrderedFloat(self.score(b)).cmp(&OrderedFloat(self.score(a))),
        };
        primary.then_with(|| default_key(a).cmp(&default_key(b)))
    }
}

/// `(-final_equity_or_net_profit, -total_trades, max_drawdown)`, ascending
fn default_key(r: &OptimizationResult) -> (OrderedFloat<f64>, std::cmp::Reverse<usize>, OrderedFloat<f64>) {
    (
        OrderedFloat(-r.final_equity_or_net_profit()),
        std::cmp::Reverse(r.metrics.total_trades),
        OrderedFloat(r.metrics.max_drawdown),
    )
}

impl FromStr for Objective {
    type Err = UnknownObjective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Objective::Default),
            "net_profit" | "profit" => Ok(Objective::NetProfit),
            "final_equity" | "equity" => Ok(Objective::FinalEquity),
            "expectancy" => Ok(Objective::Expectancy),
            "win_rate" | "winrate" => Ok(Objective::WinRate),
            "kelly" | "kelly_fraction" => Ok(Objective::Kelly),
            _ => Err(UnknownObjective(s.to_string())),
        }
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Objective::Default => "default",
            Objective::NetProfit => "net_profit",
            Objective::FinalEquity => "final_equity",
            Objective::Expectancy => "expectancy",
            Objective::WinRate => "win_rate",
            Objective::Kelly => "kelly",
        };
        f.write_str(name)
    }
}

/// Stable sort by `objective`
pub fn rank(results: &mut [OptimizationResult], objective: Objective) {
    results.sort_by(|a, b| objective.compare(a, b));
}

/// Stable sort by a caller-supplied key, ascending.
///
/// `objective_score` is left as computed; use [`Optimizer::with_ranking`] to
/// rank inside the run instead.
pub fn rank_by<K, F>(results: &mut [OptimizationResult], key: F)
where
    K: Ord,
    F: FnMut(&OptimizationResult) -> K,
{
    results.sort_by_key(key);
}

/// Shared flag that stops new grid cells from starting.
///
/// Cells already running finish; the optimizer returns whatever completed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Caller-supplied ordering; `Less` ranks the first argument first
pub type Ranking =
    Arc<dyn Fn(&OptimizationResult, &OptimizationResult) -> Ordering + Send + Sync>;

/// Grid optimizer over a single price series
pub struct Optimizer {
    base: StrategyParams,
    objective: Objective,
    ranking: Option<Ranking>,
    equity: Option<EquitySettings>,
    cancel: CancelToken,
}

impl Optimizer {
    /// `base` supplies every field the grid does not list
    pub fn new(base: StrategyParams) -> Self {
        Optimizer {
            base,
            objective: Objective::Default,
            ranking: None,
            equity: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Rank with `compare` instead of the objective.
    ///
    /// The sort stays stable, so ties keep grid order. `objective_score` is
    /// still the objective's headline value.
    pub fn with_ranking<F>(mut self, compare: F) -> Self
    where
        F: Fn(&OptimizationResult, &OptimizationResult) -> Ordering + Send + Sync + 'static,
    {
        self.ranking = Some(Arc::new(compare));
        self
    }

    /// Replay each cell's trades through the equity simulator
    pub fn with_equity(mut self, settings: EquitySettings) -> Self {
        self.equity = Some(settings);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Run one combination. Trades are dropped once folded into the result.
    pub fn evaluate(&self, series: &PriceSeries, params: &StrategyParams) -> OptimizationResult {
        let trades = backtest::run(series, params);
        let mut metrics = compute_metrics(&trades, None);
        let final_equity = self.equity.map(|settings| {
            let fraction = settings.stake.resolve(&metrics);
            let curve = simulate_equity(&trades, fraction, settings.starting_balance);
            apply_equity(&mut metrics, &curve);
            curve.final_balance()
        });

        let mut result = OptimizationResult {
            params: params.clone(),
            metrics,
            final_equity,
            objective_score: 0.0,
        };
        result.objective_score = self.objective.score(&result);
        result
    }

    /// Run the grid in parallel and return ranked results
    pub fn optimize(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
    ) -> Result<Vec<OptimizationResult>, GridError> {
        let combos = grid.expand(&self.base)?;
        info!("Testing {} parameter combinations", combos.len());

        let results: Vec<OptimizationResult> = combos
            .par_iter()
            .filter_map(|params| self.run_cell(series, params))
            .collect();

        Ok(self.finish(results, combos.len()))
    }

    /// Run optimization with progress tracking
    pub fn optimize_with_progress(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
        progress_bar: &ProgressBar,
    ) -> Result<Vec<OptimizationResult>, GridError> {
        let combos = grid.expand(&self.base)?;
        info!(
            "Testing {} parameter combinations with progress tracking",
            combos.len()
        );

        let results: Vec<OptimizationResult> = combos
            .par_iter()
            .filter_map(|params| {
                let result = self.run_cell(series, params);
                progress_bar.inc(1);
                result
            })
            .collect();

        Ok(self.finish(results, combos.len()))
    }

    /// Run optimization sequentially (no parallelism)
    /// Useful for debugging and for checking parallel results
    pub fn optimize_sequential(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
    ) -> Result<Vec<OptimizationResult>, GridError> {
        let combos = grid.expand(&self.base)?;
        info!(
            "Testing {} parameter combinations sequentially",
            combos.len()
        );

        let results: Vec<OptimizationResult> = combos
            .iter()
            .filter_map(|params| self.run_cell(series, params))
            .collect();

        Ok(self.finish(results, combos.len()))
    }

    fn run_cell(&self, series: &PriceSeries, params: &StrategyParams) -> Option<OptimizationResult> {
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(self.evaluate(series, params))
    }

    fn finish(&self, mut results: Vec<OptimizationResult>, total: usize) -> Vec<OptimizationResult> {
        if results.len() < total {
            warn!(
                completed = results.len(),
                total, "Optimization cancelled, ranking partial results"
            );
        }
        match &self.ranking {
            Some(compare) => results.sort_by(|a, b| compare(a, b)),
            None => rank(&mut results, self.objective),
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::StakePolicy;

    fn result(net_profit: f64, trades: usize, dd: f64) -> OptimizationResult {
        OptimizationResult {
            params: StrategyParams::default(),
            metrics: MetricsRecord {
                net_profit,
                total_trades: trades,
                max_drawdown: dd,
                ..MetricsRecord::default()
            },
            final_equity: None,
            objective_score: net_profit,
        }
    }

    /// Quiet market with a breakout every 15 bars, alternating direction
    fn series() -> PriceSeries {
        let rows: Vec<(f64, f64, f64, f64)> = (0..300)
            .map(|k| {
                let base = 1.1 + ((k / 15) % 4) as f64 * 0.002;
                let c = if k % 15 == 14 {
                    base + if (k / 15) % 2 == 0 { 0.0015 } else { -0.0015 }
                } else {
                    base + (k % 3) as f64 * 0.0001
                };
                let o = base;
                (o, o.max(c) + 0.0002, o.min(c) - 0.0002, c)
            })
            .collect();
        PriceSeries::from_ohlc(rows).unwrap()
    }

    fn grid() -> ParameterGrid {
        ParameterGrid::new()
            .with_axis("lookback", [4, 8, 12])
            .with_axis("range_threshold", [0.0003, 0.0006])
            .with_axis("take_profit", [0.0005, 0.0010])
            .with_axis("stop_loss", [0.0005, 0.0020])
    }

    #[test]
    fn test_default_ordering() {
        let mut results = vec![
            result(5.0, 10, 2.0),
            result(8.0, 3, 1.0),
            result(5.0, 12, 4.0),
            result(5.0, 12, 3.0),
            result(0.0, 0, 0.0),
        ];
        rank(&mut results, Objective::Default);
        let keys: Vec<(f64, usize, f64)> = results
            .iter()
            .map(|r| (r.metrics.net_profit, r.metrics.total_trades, r.metrics.max_drawdown))
            .collect();
        assert_eq!(
            keys,
            vec![
                (8.0, 3, 1.0),
                (5.0, 12, 3.0),
                (5.0, 12, 4.0),
                (5.0, 10, 2.0),
                (0.0, 0, 0.0)
            ]
        );
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let mut a = result(1.0, 1, 1.0);
        a.params.lookback = 3;
        let mut b = result(1.0, 1, 1.0);
        b.params.lookback = 7;
        let mut results = vec![a, b];
        rank(&mut results, Objective::Default);
        assert_eq!(results[0].params.lookback, 3);
    }

    #[test]
    fn test_named_objective() {
        let mut results = vec![result(5.0, 10, 2.0), result(1.0, 2, 0.0)];
        results[1].metrics.win_rate = 0.9;
        rank(&mut results, Objective::WinRate);
        assert_eq!(results[0].metrics.win_rate, 0.9);

        rank_by(&mut results, |r| r.metrics.total_trades);
        assert_eq!(results[0].metrics.total_trades, 2);
    }

    #[test]
    fn test_objective_from_str() {
        assert_eq!("net_profit".parse::<Objective>().unwrap(), Objective::NetProfit);
        assert_eq!("Kelly".parse::<Objective>().unwrap(), Objective::Kelly);
        assert!("sharpe".parse::<Objective>().is_err());
        assert_eq!(Objective::WinRate.to_string(), "win_rate");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let series = series();
        let optimizer = Optimizer::new(StrategyParams::default()).with_equity(EquitySettings {
            starting_balance: 10_000.0,
            stake: StakePolicy::Fixed(0.5),
        });

        let parallel = optimizer.optimize(&series, &grid()).unwrap();
        let sequential = optimizer.optimize_sequential(&series, &grid()).unwrap();
        assert_eq!(parallel.len(), grid().total_combinations());
        assert_eq!(parallel, sequential);

        for pair in parallel.windows(2) {
            assert_ne!(
                Objective::Default.compare(&pair[0], &pair[1]),
                Ordering::Greater
            );
        }
    }

    #[test]
    fn test_custom_ranking_inside_run() {
        let series = series();
        let optimizer = Optimizer::new(StrategyParams::default())
            .with_objective(Objective::NetProfit)
            .with_ranking(|a, b| {
                a.metrics
                    .total_trades
                    .cmp(&b.metrics.total_trades)
                    .then_with(|| {
                        OrderedFloat(a.metrics.max_drawdown).cmp(&OrderedFloat(b.metrics.max_drawdown))
                    })
            });

        let results = optimizer.optimize(&series, &grid()).unwrap();
        assert_eq!(results.len(), grid().total_combinations());
        for pair in results.windows(2) {
            assert!(pair[0].metrics.total_trades <= pair[1].metrics.total_trades);
        }
        for r in &results {
            assert_eq!(r.objective_score, r.metrics.net_profit);
        }
        assert_eq!(results, optimizer.optimize_sequential(&series, &grid()).unwrap());
    }

    #[test]
    fn test_zero_trade_cells_are_ranked() {
        let series = series();
        // Threshold of zero with wiggling closes never hovers
        let grid = ParameterGrid::new().with_axis("lookback", [4, 6, 8]).with_axis("range_threshold", [0.0]);
        let results = Optimizer::new(StrategyParams::default())
            .optimize(&series, &grid)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.metrics == MetricsRecord::default()));
        // All tied, so grid order survives
        let lookbacks: Vec<usize> = results.iter().map(|r| r.params.lookback).collect();
        assert_eq!(lookbacks, vec![4, 6, 8]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let results = Optimizer::new(StrategyParams::default())
            .with_cancel_token(token)
            .optimize(&series(), &grid())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_invalid_grid_is_error() {
        let grid = ParameterGrid::new().with_axis("max_hold", [0]);
        assert!(Optimizer::new(StrategyParams::default())
            .optimize(&series(), &grid)
            .is_err());
    }
}
