//! Performance metrics
//!
//! Reduces a trade list to a [`MetricsRecord`]. Every ratio is guarded so an
//! empty or degenerate trade list produces zeros, never NaN or infinity; the
//! optimizer sorts on these values.
//!
//! The Kelly fraction is the binary-payout approximation
//! `p - (1 - p) / (avg_win / avg_loss)` evaluated at the realized averages,
//! not a portfolio Kelly.

use statrs::statistics::Statistics;

use crate::risk::EquityCurve;
use crate::{ExitReason, MetricsRecord, Trade};

/// Map NaN and infinities to zero
fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// `num / den`, or zero when the denominator is not positive
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        finite_or_zero(num / den)
    } else {
        0.0
    }
}

/// Mean of the values, zero for an empty slice
fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        finite_or_zero(values.mean())
    }
}

/// Largest peak-to-trough decline of cumulative PnL, starting from zero.
///
/// A first losing trade already counts as drawdown.
fn max_drawdown(pnls: impl IntoIterator<Item = f64>) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }

    finite_or_zero(max_dd)
}

/// Compute metrics for `trades`.
///
/// `max_drawdown` is measured on cumulative PnL. Shifting that walk by a
/// starting balance leaves the decline unchanged, so it is never added to
/// the balance. When `equity` carries the replayed balance path,
/// `max_drawdown_pct` is taken from it; otherwise it stays zero.
/// A zero-PnL trade counts as a loss.
pub fn compute_metrics(trades: &[Trade], equity: Option<&EquityCurve>) -> MetricsRecord {
    if trades.is_empty() {
        return MetricsRecord::default();
    }

    let (win_pnls, loss_pnls): (Vec<f64>, Vec<f64>) =
        trades.iter().map(|t| t.pnl).partition(|&pnl| pnl > 0.0);
    let loss_sizes: Vec<f64> = loss_pnls.iter().map(|pnl| -pnl).collect();

    let total = trades.len();
    let wins = win_pnls.len();
    let losses = loss_sizes.len();

    let win_rate = ratio(wins as f64, total as f64);
    let avg_win = mean_or_zero(&win_pnls);
    let avg_loss = mean_or_zero(&loss_sizes);
    let risk_reward = ratio(avg_win, avg_loss);
    let expectancy = win_rate * avg_win - (1.0 - win_rate) * avg_loss;
    let kelly_fraction = if risk_reward > 0.0 {
        win_rate - (1.0 - win_rate) / risk_reward
    } else {
        0.0
    };

    let net_profit: f64 = trades.iter().map(|t| t.pnl).sum();
    let count = |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count();

    let mut metrics = MetricsRecord {
        total_trades: total,
        wins,
        losses,
        win_rate,
        net_profit: finite_or_zero(net_profit),
        max_drawdown: max_drawdown(trades.iter().map(|t| t.pnl)),
        expectancy: finite_or_zero(expectancy),
        kelly_fraction: finite_or_zero(kelly_fraction),
        avg_win,
        avg_loss,
        risk_reward,
        max_drawdown_pct: 0.0,
        take_profit_hits: count(ExitReason::TakeProfit),
        stop_loss_hits: count(ExitReason::StopLoss),
        timeouts: count(ExitReason::Timeout),
    };
    if let Some(curve) = equity {
        apply_equity(&mut metrics, curve);
    }
    metrics
}

/// Fill the balance-relative fields from a replayed equity curve.
///
/// The stake policy may need the trade metrics first (Kelly), so callers
/// that replay afterwards attach the curve here.
pub fn apply_equity(metrics: &mut MetricsRecord, curve: &EquityCurve) {
    metrics.max_drawdown_pct = finite_or_zero(curve.max_drawdown_pct());
}
