//! Trade simulation
//!
//! Half the spread is paid on entry and half on exit. Targets and stops are
//! checked against bar extremes, starting with the bar after entry.

use super::config::{EntryBasis, SameBarPolicy, StrategyParams};
use crate::{Direction, ExitReason, PriceSeries, Trade};

/// Simulate one trade opened on `entry_index`.
///
/// Scans bars `entry_index + 1 ..= entry_index + max_hold` for the first stop
/// or target touch; if neither is hit the trade closes at the last scanned
/// bar's close. The caller guarantees `entry_index + max_hold < series.len()`.
pub fn simulate(
    series: &PriceSeries,
    entry_index: usize,
    direction: Direction,
    params: &StrategyParams,
) -> Trade {
    let last = entry_index + params.max_hold;
    debug_assert!(last < series.len(), "trade window runs past the series");

    let sign = direction.sign();
    let half_spread = params.spread / 2.0;

    let signal_price = match params.entry_basis {
        EntryBasis::Open => series.open(entry_index),
        EntryBasis::Close => series.close(entry_index),
    };
    let entry_price = signal_price + sign * half_spread;
    let target = entry_price + sign * params.take_profit;
    let stop = entry_price - sign * params.stop_loss;

    let mut exit = (last, series.close(last), ExitReason::Timeout);

    for j in (entry_index + 1)..=last {
        let bar = &series[j];
        let (stop_hit, target_hit) = match direction {
            Direction::Long => (bar.low <= stop, bar.high >= target),
            Direction::Short => (bar.high >= stop, bar.low <= target),
        };

        let reason = match (stop_hit, target_hit, params.same_bar_policy) {
            (true, true, SameBarPolicy::StopFirst) | (true, false, _) => ExitReason::StopLoss,
            (true, true, SameBarPolicy::TargetFirst) | (false, true, _) => {
                ExitReason::TakeProfit
            }
            (false, false, _) => continue,
        };

        let level = match reason {
            ExitReason::StopLoss => stop,
            _ => target,
        };
        exit = (j, level, reason);
        break;
    }

    let (exit_index, raw_exit, exit_reason) = exit;
    let exit_price = raw_exit - sign * half_spread;
    let pnl = (exit_price - entry_price) * sign;

    Trade {
        entry_index,
        exit_index,
        direction,
        entry_price,
        exit_price,
        pnl,
        exit_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(tp: f64, sl: f64, max_hold: usize, spread: f64) -> StrategyParams {
        StrategyParams::new(1, 0.0, tp, sl, max_hold, spread).unwrap()
    }

    fn series(rows: Vec<(f64, f64, f64, f64)>) -> PriceSeries {
        PriceSeries::from_ohlc(rows).unwrap()
    }

    #[test]
    fn test_long_take_profit() {
        let s = series(vec![
            (1.0, 1.0, 1.0, 1.0),
            (1.0, 1.005, 0.999, 1.004),
            (1.004, 1.012, 1.003, 1.011),
            (1.011, 1.012, 1.010, 1.011),
        ]);
        let trade = simulate(&s, 0, Direction::Long, &params(0.01, 0.005, 3, 0.0002));

        assert_relative_eq!(trade.entry_price, 1.0001);
        assert_eq!(trade.exit_index, 2);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_relative_eq!(trade.exit_price, 1.0101 - 0.0001, epsilon = 1e-12);
        // Target distance minus the exit half spread
        assert_relative_eq!(trade.pnl, 0.0099, epsilon = 1e-12);
    }

    #[test]
    fn test_short_stop_loss() {
        let s = series(vec![
            (1.0, 1.0, 1.0, 1.0),
            (1.0, 1.002, 0.999, 1.001),
            (1.001, 1.006, 1.0, 1.005),
        ]);
        let trade = simulate(&s, 0, Direction::Short, &params(0.01, 0.005, 2, 0.0002));

        assert_relative_eq!(trade.entry_price, 0.9999);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_index, 2);
        // stop = 1.0049, exit pays the other half spread
        assert_relative_eq!(trade.exit_price, 1.0050, epsilon = 1e-12);
        assert_relative_eq!(trade.pnl, -0.0051, epsilon = 1e-12);
    }

    #[test]
    fn test_short_take_profit() {
        let s = series(vec![
            (1.0, 1.0, 1.0, 1.0),
            (1.0, 1.001, 0.997, 0.998),
            (0.998, 0.999, 0.994, 0.995),
            (0.995, 0.996, 0.993, 0.994),
        ]);
        let trade = simulate(&s, 0, Direction::Short, &params(0.005, 0.005, 3, 0.0002));

        assert_relative_eq!(trade.entry_price, 0.9999);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.exit_index, 2);
        // target = 0.9949, buying back pays the other half spread
        assert_relative_eq!(trade.exit_price, 0.9950, epsilon = 1e-12);
        assert_relative_eq!(trade.pnl, 0.0049, epsilon = 1e-12);
    }

    #[test]
    fn test_timeout_exits_at_close() {
        let s = series(vec![
            (1.0, 1.0, 1.0, 1.0),
            (1.0, 1.001, 0.999, 1.0005),
            (1.0005, 1.001, 0.999, 1.0008),
        ]);
        let trade = simulate(&s, 0, Direction::Long, &params(0.01, 0.01, 2, 0.0));

        assert_eq!(trade.exit_reason, ExitReason::Timeout);
        assert_eq!(trade.exit_index, 2);
        assert_relative_eq!(trade.exit_price, 1.0008);
        assert_relative_eq!(trade.pnl, 0.0008, epsilon = 1e-12);
    }

    #[test]
    fn test_same_bar_stop_priority() {
        // Bar 1 spans both target and stop
        let s = series(vec![(1.0, 1.0, 1.0, 1.0), (1.0, 1.02, 0.98, 1.0)]);
        let p = params(0.01, 0.01, 1, 0.0);

        let stop_first = simulate(&s, 0, Direction::Long, &p);
        assert_eq!(stop_first.exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(stop_first.pnl, -0.01, epsilon = 1e-12);

        let target_first = simulate(
            &s,
            0,
            Direction::Long,
            &p.clone().with_same_bar_policy(SameBarPolicy::TargetFirst),
        );
        assert_eq!(target_first.exit_reason, ExitReason::TakeProfit);
        assert_relative_eq!(target_first.pnl, 0.01, epsilon = 1e-12);

        let short = simulate(&s, 0, Direction::Short, &p);
        assert_eq!(short.exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn test_entry_on_close() {
        let s = series(vec![(1.0, 1.01, 0.99, 1.005), (1.005, 1.006, 1.004, 1.005)]);
        let p = params(0.1, 0.1, 1, 0.0).with_entry_basis(EntryBasis::Close);
        let trade = simulate(&s, 0, Direction::Long, &p);
        assert_relative_eq!(trade.entry_price, 1.005);
        assert_relative_eq!(trade.pnl, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exit_within_max_hold() {
        let s = series(vec![(1.0, 1.0, 1.0, 1.0); 8]);
        let trade = simulate(&s, 2, Direction::Short, &params(0.01, 0.01, 5, 0.0002));
        assert!(trade.exit_index > trade.entry_index);
        assert!(trade.bars_held() <= 5);
        assert_eq!(trade.exit_reason, ExitReason::Timeout);
        // Flat market: the only cost is the spread
        assert_relative_eq!(trade.pnl, -0.0002, epsilon = 1e-12);
    }
}
