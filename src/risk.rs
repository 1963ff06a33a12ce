//! Stake sizing and equity replay
//!
//! Trades are replayed against a starting balance. Each trade risks a fixed
//! fraction of the current balance, so results compound:
//! ```text
//! stake   = balance * max(fraction, 0)
//! balance = balance + pnl * stake
//! ```
//! `pnl` is in price units per unit stake, so the fraction must be expressed
//! in the same units. Mixing pip PnL with a price-unit fraction is not
//! detectable here; configs convert pips to price units at load time.

use serde::{Deserialize, Serialize};

use crate::{MetricsRecord, Trade};

/// How much of the balance to stake on each trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakePolicy {
    /// Constant fraction of the current balance
    Fixed(f64),
    /// Kelly fraction taken from the run's own metrics
    #[default]
    Kelly,
}

impl StakePolicy {
    /// Resolve to a stake fraction. Negative fractions mean "do not trade"
    /// and clamp to zero.
    pub fn resolve(&self, metrics: &MetricsRecord) -> f64 {
        let fraction = match self {
            StakePolicy::Fixed(f) => *f,
            StakePolicy::Kelly => metrics.kelly_fraction,
        };
        if fraction.is_finite() {
            fraction.max(0.0)
        } else {
            0.0
        }
    }
}

/// Balance after each trade; element 0 is the starting balance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquityCurve(Vec<f64>);

impl EquityCurve {
    pub fn balances(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starting_balance(&self) -> f64 {
        self.0.first().copied().unwrap_or(0.0)
    }

    pub fn final_balance(&self) -> f64 {
        self.0.last().copied().unwrap_or(0.0)
    }

    /// Largest peak-to-trough decline in balance units
    pub fn max_drawdown(&self) -> f64 {
        let mut peak = f64::MIN;
        let mut max_dd = 0.0_f64;
        for &balance in &self.0 {
            peak = peak.max(balance);
            max_dd = max_dd.max(peak - balance);
        }
        max_dd
    }

    /// Largest decline as a percent of the running peak balance.
    ///
    /// Only positive peaks are measured.
    pub fn max_drawdown_pct(&self) -> f64 {
        let mut peak = f64::MIN;
        let mut max_pct = 0.0_f64;
        for &balance in &self.0 {
            peak = peak.max(balance);
            if peak > 0.0 {
                max_pct = max_pct.max((peak - balance) / peak * 100.0);
            }
        }
        max_pct
    }

    /// Total return in percent, zero when the start is not positive
    pub fn total_return_pct(&self) -> f64 {
        let start = self.starting_balance();
        if start > 0.0 {
            (self.final_balance() - start) / start * 100.0
        } else {
            0.0
        }
    }
}

/// Replay `trades` in order against `starting_balance`.
///
/// The curve always has `trades.len() + 1` points.
pub fn simulate_equity(trades: &[Trade], stake_fraction: f64, starting_balance: f64) -> EquityCurve {
    let fraction = if stake_fraction.is_finite() {
        stake_fraction.max(0.0)
    } else {
        0.0
    };

    let mut balance = starting_balance;
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(balance);

    for trade in trades {
        let stake = balance * fraction;
        balance += trade.pnl * stake;
        curve.push(balance);
    }

    EquityCurve(curve)
}
