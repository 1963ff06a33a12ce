//! Backtesting engine
//!
//! Bar-by-bar scan: every bar with a full lookback window behind it and
//! `max_hold` bars ahead of it is checked for a pattern, and each signal is
//! turned into one simulated trade. Runs are pure functions of
//! `(series, params)`, which is what lets the optimizer fan them out.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::{apply_equity, compute_metrics};
use crate::risk::{simulate_equity, EquityCurve, StakePolicy};
use crate::strategies::{self, create_detector, ParamsError, StrategyParams};
use crate::{MetricsRecord, PriceSeries, Trade};

/// Run one backtest and return the trades ordered by entry index.
///
/// Signal bars are `lookback ..= len - max_hold - 1`. A series too short for
/// that range (including an empty one) yields no trades. With
/// `allow_overlapping_trades = false` the scan resumes after each exit bar.
pub fn run(series: &PriceSeries, params: &StrategyParams) -> Vec<Trade> {
    debug_assert!(params.validate().is_ok(), "params must be validated");

    let mut trades = Vec::new();

    // Last bar that still has max_hold bars after it
    let last_signal = match params
        .max_hold
        .checked_add(1)
        .and_then(|needed| series.len().checked_sub(needed))
    {
        Some(last) if last >= params.lookback => last,
        _ => {
            debug!(
                bars = series.len(),
                required = params.min_bars(),
                "Series too short for lookback + max_hold, no trades"
            );
            return trades;
        }
    };

    let detector = create_detector(params);
    let mut i = params.lookback;

    while i <= last_signal {
        let Some(signal) = detector.detect(series, i) else {
            i += 1;
            continue;
        };

        let trade = strategies::simulate(series, i, signal.direction, params);
        debug!(
            entry = trade.entry_index,
            exit = trade.exit_index,
            direction = %trade.direction,
            reason = %trade.exit_reason,
            pnl = trade.pnl,
            "Trade closed"
        );

        i = if params.allow_overlapping_trades {
            i + 1
        } else {
            trade.exit_index + 1
        };
        trades.push(trade);
    }

    trades
}

/// Equity replay settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySettings {
    pub starting_balance: f64,
    pub stake: StakePolicy,
}

impl Default for EquitySettings {
    fn default() -> Self {
        Self {
            starting_balance: 10_000.0,
            stake: StakePolicy::Kelly,
        }
    }
}

/// Backtest engine bundling the run, metrics, and optional equity replay
pub struct Backtester {
    params: StrategyParams,
    equity: Option<EquitySettings>,
}

impl Backtester {
    /// Validates `params` up front; invalid parameters never reach the scan
    pub fn new(params: StrategyParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Backtester {
            params,
            equity: None,
        })
    }

    pub fn with_equity(mut self, settings: EquitySettings) -> Self {
        self.equity = Some(settings);
        self
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn run(&self, series: &PriceSeries) -> BacktestResult {
        let trades = run(series, &self.params);
        let mut metrics = compute_metrics(&trades, None);

        let equity = self.equity.map(|settings| {
            let fraction = settings.stake.resolve(&metrics);
            simulate_equity(&trades, fraction, settings.starting_balance)
        });
        if let Some(curve) = &equity {
            apply_equity(&mut metrics, curve);
        }

        info!(
            bars = series.len(),
            trades = metrics.total_trades,
            net_profit = metrics.net_profit,
            final_balance = equity.as_ref().map(|c| c.final_balance()),
            "Backtest finished"
        );

        BacktestResult {
            trades,
            metrics,
            equity,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub metrics: MetricsRecord,
    pub equity: Option<EquityCurve>,
}

impl BacktestResult {
    /// Final equity when an equity replay ran, otherwise net profit
    pub fn final_equity_or_net_profit(&self) -> f64 {
        self.equity
            .as_ref()
            .map(EquityCurve::final_balance)
            .unwrap_or(self.metrics.net_profit)
    }
}
