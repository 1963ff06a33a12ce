//! Grouped Volatility pattern
//!
//! Entry: the most recent candle in the lookback window whose body is at least
//! `candle_size` sets the direction. Bullish body goes long, bearish goes
//! short; `follow_direction = false` fades it instead. A doji (only
//! reachable with `candle_size = 0`) counts as bearish.

use super::config::StrategyParams;
use super::{Breakout, PatternDetector};
use crate::{Direction, PriceSeries};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupedVolatility {
    lookback: usize,
    candle_size: f64,
    follow_direction: bool,
}

impl GroupedVolatility {
    pub fn new(lookback: usize, candle_size: f64, follow_direction: bool) -> Self {
        Self {
            lookback,
            candle_size,
            follow_direction,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(
            params.lookback,
            params.candle_size,
            params.follow_direction,
        )
    }
}

impl PatternDetector for GroupedVolatility {
    fn name(&self) -> &'static str {
        "grouped_volatility"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn detect(&self, series: &PriceSeries, i: usize) -> Option<Breakout> {
        debug_assert!(self.lookback > 0 && self.lookback <= i && i < series.len());
        if self.lookback == 0 || i < self.lookback || i >= series.len() {
            return None;
        }

        let window = series.window(i - self.lookback, i);
        let large = window.iter().rev().find(|b| b.body() >= self.candle_size)?;

        let candle_dir = if large.close > large.open {
            Direction::Long
        } else {
            Direction::Short
        };
        let direction = if self.follow_direction {
            candle_dir
        } else {
            candle_dir.opposite()
        };

        let (range_high, range_low) = window
            .iter()
            .fold((f64::MIN, f64::MAX), |(h, l), b| (h.max(b.close), l.min(b.close)));

        Some(Breakout {
            direction,
            range_high,
            range_low,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small-bodied bars with one large candle at `big_at`
    fn series_with_big_candle(big_at: usize, bullish: bool, bars: usize) -> PriceSeries {
        let rows: Vec<(f64, f64, f64, f64)> = (0..bars)
            .map(|k| {
                if k == big_at {
                    if bullish {
                        (1.1000, 1.1045, 1.0995, 1.1040)
                    } else {
                        (1.1040, 1.1045, 1.0995, 1.1000)
                    }
                } else {
                    (1.1000, 1.1003, 1.0997, 1.1001)
                }
            })
            .collect();
        PriceSeries::from_ohlc(rows).unwrap()
    }

    #[test]
    fn test_follows_bullish_candle() {
        let series = series_with_big_candle(5, true, 12);
        let detector = GroupedVolatility::new(10, 0.0030, true);
        let b = detector.detect(&series, 10).unwrap();
        assert_eq!(b.direction, Direction::Long);
        approx::assert_relative_eq!(b.range_high, 1.1040);
    }

    #[test]
    fn test_fades_bearish_candle() {
        let series = series_with_big_candle(5, false, 12);
        let detector = GroupedVolatility::new(10, 0.0030, false);
        assert_eq!(
            detector.detect(&series, 10).map(|b| b.direction),
            Some(Direction::Long)
        );
    }

    #[test]
    fn test_no_large_candle_is_flat() {
        let series = series_with_big_candle(11, true, 12);
        let detector = GroupedVolatility::new(10, 0.0030, true);
        // The big candle sits at the signal bar itself, outside the window
        assert!(detector.detect(&series, 11).is_none());
        assert!(detector.detect(&series, 10).is_none());
    }

    #[test]
    fn test_doji_counts_as_bearish() {
        let mut rows: Vec<(f64, f64, f64, f64)> = vec![(1.1000, 1.1003, 1.0997, 1.1001); 12];
        rows[9] = (1.1000, 1.1002, 1.0998, 1.1000);
        let series = PriceSeries::from_ohlc(rows).unwrap();

        let follow = GroupedVolatility::new(10, 0.0, true);
        assert_eq!(
            follow.detect(&series, 10).map(|b| b.direction),
            Some(Direction::Short)
        );
        let fade = GroupedVolatility::new(10, 0.0, false);
        assert_eq!(
            fade.detect(&series, 10).map(|b| b.direction),
            Some(Direction::Long)
        );
    }

    #[test]
    fn test_uses_most_recent_large_candle() {
        let mut rows: Vec<(f64, f64, f64, f64)> = vec![(1.1000, 1.1003, 1.0997, 1.1001); 12];
        rows[3] = (1.1000, 1.1045, 1.0995, 1.1040);
        rows[7] = (1.1040, 1.1045, 1.0995, 1.1000);
        let series = PriceSeries::from_ohlc(rows).unwrap();
        let detector = GroupedVolatility::new(10, 0.0030, true);
        assert_eq!(
            detector.detect(&series, 10).map(|b| b.direction),
            Some(Direction::Short)
        );
    }
}
