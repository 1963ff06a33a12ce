//! Hover Breakout pattern
//!
//! Entry: the last `lookback` bars hover inside a range no wider than
//! `range_threshold`, and the current close leaves that range.
//! A close exactly on the boundary is not a breakout.

use super::config::{RangeBasis, StrategyParams};
use super::{Breakout, PatternDetector};
use crate::{Direction, PriceSeries};

/// Check bar `i` for a hover breakout.
///
/// The window is `[i - lookback, i)`; bar `i` itself is only used for its
/// close. Returns `None` when the window is too wide or the close stays
/// inside the range.
pub fn detect(
    series: &PriceSeries,
    i: usize,
    lookback: usize,
    range_threshold: f64,
    range_basis: RangeBasis,
) -> Option<Breakout> {
    debug_assert!(lookback > 0 && lookback <= i && i < series.len());
    if lookback == 0 || i < lookback || i >= series.len() {
        return None;
    }

    let window = series.window(i - lookback, i);
    let (range_high, range_low) = match range_basis {
        RangeBasis::CloseOnly => window.iter().fold((f64::MIN, f64::MAX), |(h, l), b| {
            (h.max(b.close), l.min(b.close))
        }),
        RangeBasis::HighLow => window.iter().fold((f64::MIN, f64::MAX), |(h, l), b| {
            (h.max(b.high), l.min(b.low))
        }),
    };

    if range_high - range_low > range_threshold {
        return None;
    }

    let close = series.close(i);
    let direction = if close > range_high {
        Direction::Long
    } else if close < range_low {
        Direction::Short
    } else {
        return None;
    };

    Some(Breakout {
        direction,
        range_high,
        range_low,
    })
}

/// Hover breakout detector bound to one parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverBreakout {
    lookback: usize,
    range_threshold: f64,
    range_basis: RangeBasis,
}

impl HoverBreakout {
    pub fn new(lookback: usize, range_threshold: f64, range_basis: RangeBasis) -> Self {
        Self {
            lookback,
            range_threshold,
            range_basis,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.lookback, params.range_threshold, params.range_basis)
    }
}

impl PatternDetector for HoverBreakout {
    fn name(&self) -> &'static str {
        "hover"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn detect(&self, series: &PriceSeries, i: usize) -> Option<Breakout> {
        detect(
            series,
            i,
            self.lookback,
            self.range_threshold,
            self.range_basis,
        )
    }
}
