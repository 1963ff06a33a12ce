//! Core data types used across the backtesting engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for bar data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarValidationError {
    #[error("prices must be finite: open={open}, high={high}, low={low}, close={close}")]
    NonFinitePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },
}

/// Errors raised while assembling a price series
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar indices must be strictly increasing: {previous} followed by {current}")]
    NonIncreasingIndex { previous: usize, current: usize },

    #[error("invalid bar at index {index}: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarValidationError,
    },
}

/// OHLC bar. The index is the only identity the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub index: usize,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// Create a new bar with validation
    pub fn new(
        index: usize,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self::new_unchecked(index, open, high, low, close);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(index: usize, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            index,
            open,
            high,
            low,
            close,
        }
    }

    /// Validate the bar data
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if ![self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite())
        {
            return Err(BarValidationError::NonFinitePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Check if the bar is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Absolute candle body size
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Immutable, time-ordered sequence of bars.
///
/// Indices are strictly increasing. The engine addresses bars by position,
/// so gaps in `Bar::index` are a loader concern and are not interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bar>", into = "Vec<Bar>")]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series from bars, validating ordering and each bar.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for bar in &bars {
            bar.validate().map_err(|source| SeriesError::InvalidBar {
                index: bar.index,
                source,
            })?;
        }
        for pair in bars.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(SeriesError::NonIncreasingIndex {
                    previous: pair[0].index,
                    current: pair[1].index,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from `(open, high, low, close)` tuples, numbering bars from zero.
    pub fn from_ohlc<I>(rows: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (f64, f64, f64, f64)>,
    {
        let bars = rows
            .into_iter()
            .enumerate()
            .map(|(index, (open, high, low, close))| {
                Bar::new_unchecked(index, open, high, low, close)
            })
            .collect();
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, i: usize) -> Option<&Bar> {
        self.bars.get(i)
    }

    pub fn open(&self, i: usize) -> f64 {
        self.bars[i].open
    }

    pub fn high(&self, i: usize) -> f64 {
        self.bars[i].high
    }

    pub fn low(&self, i: usize) -> f64 {
        self.bars[i].low
    }

    pub fn close(&self, i: usize) -> f64 {
        self.bars[i].close
    }

    /// Bars in `[start, end)`
    pub fn window(&self, start: usize, end: usize) -> &[Bar] {
        &self.bars[start..end]
    }
}

impl std::ops::Index<usize> for PriceSeries {
    type Output = Bar;

    fn index(&self, i: usize) -> &Bar {
        &self.bars[i]
    }
}

impl TryFrom<Vec<Bar>> for PriceSeries {
    type Error = SeriesError;

    fn try_from(bars: Vec<Bar>) -> Result<Self, Self::Error> {
        Self::new(bars)
    }
}

impl From<PriceSeries> for Vec<Bar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// `+1.0` for long, `-1.0` for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Why a trade was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    /// Neither level was touched within `max_hold` bars
    Timeout,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "Take Profit"),
            ExitReason::StopLoss => write!(f, "Stop Loss"),
            ExitReason::Timeout => write!(f, "Timeout"),
        }
    }
}

/// Completed trade record. Prices and PnL are in price units per unit stake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Bars held, entry bar excluded
    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

/// Performance statistics derived from a trade list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub net_profit: f64,
    pub max_drawdown: f64,
    pub expectancy: f64,
    pub kelly_fraction: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub risk_reward: f64,
    pub max_drawdown_pct: f64,
    pub take_profit_hits: usize,
    pub stop_loss_hits: usize,
    pub timeouts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_validation() {
        assert!(Bar::new(0, 1.0, 1.2, 0.9, 1.1).is_ok());
        assert_eq!(
            Bar::new(0, 1.0, 0.9, 1.2, 1.0),
            Err(BarValidationError::HighLessThanLow {
                high: 0.9,
                low: 1.2
            })
        );
        assert!(matches!(
            Bar::new(0, 1.5, 1.2, 0.9, 1.0),
            Err(BarValidationError::OpenOutOfRange { .. })
        ));
        assert!(matches!(
            Bar::new(0, 1.0, 1.2, 0.9, f64::NAN),
            Err(BarValidationError::NonFinitePrice { .. })
        ));
    }

    #[test]
    fn test_series_rejects_non_increasing_index() {
        let bars = vec![
            Bar::new_unchecked(0, 1.0, 1.0, 1.0, 1.0),
            Bar::new_unchecked(0, 1.0, 1.0, 1.0, 1.0),
        ];
        assert_eq!(
            PriceSeries::new(bars),
            Err(SeriesError::NonIncreasingIndex {
                previous: 0,
                current: 0
            })
        );
    }

    #[test]
    fn test_series_from_ohlc_numbers_bars() {
        let series =
            PriceSeries::from_ohlc(vec![(1.0, 1.1, 0.9, 1.0), (1.0, 1.2, 1.0, 1.1)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].index, 1);
        assert_eq!(series.close(1), 1.1);
    }

    #[test]
    fn test_empty_series_is_valid() {
        let series = PriceSeries::new(Vec::new()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
    }
}
