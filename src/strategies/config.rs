//! Strategy parameters shared by every breakout pattern
//!
//! All distances (`range_threshold`, `take_profit`, `stop_loss`, `spread`,
//! `candle_size`) are raw price distances. Pip-denominated configs are
//! converted once at load time (see [`crate::config::DistanceUnits`]), so the
//! engine never mixes the two conventions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter fields expressed as price distances
pub const DISTANCE_FIELDS: &[&str] = &[
    "range_threshold",
    "take_profit",
    "stop_loss",
    "spread",
    "candle_size",
];

/// Configuration errors. These are fatal and never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("{field} must be > 0")]
    ZeroPeriod { field: &'static str },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be > 0, got {value}")]
    NonPositive { field: &'static str, value: f64 },
}

/// Which prices define the consolidation range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBasis {
    /// Highest and lowest close of the window
    #[default]
    CloseOnly,
    /// Highest high and lowest low of the window
    HighLow,
}

/// Which level wins when a single bar breaches both stop and target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameBarPolicy {
    /// Assume the stop was hit first (conservative)
    #[default]
    StopFirst,
    TargetFirst,
}

/// Price of the signal bar used for entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryBasis {
    #[default]
    Open,
    Close,
}

/// Entry pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Tight consolidation followed by a close outside the range
    #[default]
    Hover,
    /// Direction of the last large-bodied candle in the window
    GroupedVolatility,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Hover => write!(f, "hover"),
            PatternKind::GroupedVolatility => write!(f, "grouped_volatility"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Immutable parameter set for one backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyParams {
    /// Bars in the consolidation window (default: 10)
    pub lookback: usize,

    /// Maximum high-low spread of the window (default: 0.0008)
    pub range_threshold: f64,

    /// Target distance from entry (default: 0.0012)
    pub take_profit: f64,

    /// Stop distance from entry (default: 0.0020)
    pub stop_loss: f64,

    /// Bars after entry before a time exit (default: 12)
    pub max_hold: usize,

    /// Round-trip bid/ask cost; half is paid on entry, half on exit (default: 0.0002)
    #[serde(default)]
    pub spread: f64,

    #[serde(default)]
    pub range_basis: RangeBasis,

    /// Keep scanning while a trade is open (default: true)
    #[serde(default = "default_true")]
    pub allow_overlapping_trades: bool,

    #[serde(default)]
    pub same_bar_policy: SameBarPolicy,

    #[serde(default)]
    pub entry_basis: EntryBasis,

    #[serde(default)]
    pub pattern: PatternKind,

    /// Minimum candle body for the grouped volatility pattern
    #[serde(default)]
    pub candle_size: f64,

    /// Trade with the large candle (true) or fade it (false)
    #[serde(default = "default_true")]
    pub follow_direction: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            lookback: 10,
            range_threshold: 0.0008,
            take_profit: 0.0012,
            stop_loss: 0.0020,
            max_hold: 12,
            spread: 0.0002,
            range_basis: RangeBasis::CloseOnly,
            allow_overlapping_trades: true,
            same_bar_policy: SameBarPolicy::StopFirst,
            entry_basis: EntryBasis::Open,
            pattern: PatternKind::Hover,
            candle_size: 0.0,
            follow_direction: true,
        }
    }
}

impl StrategyParams {
    /// Construct and validate the core hover breakout parameters
    pub fn new(
        lookback: usize,
        range_threshold: f64,
        take_profit: f64,
        stop_loss: f64,
        max_hold: usize,
        spread: f64,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            lookback,
            range_threshold,
            take_profit,
            stop_loss,
            max_hold,
            spread,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_range_basis(mut self, basis: RangeBasis) -> Self {
        self.range_basis = basis;
        self
    }

    pub fn with_overlapping_trades(mut self, allow: bool) -> Self {
        self.allow_overlapping_trades = allow;
        self
    }

    pub fn with_same_bar_policy(mut self, policy: SameBarPolicy) -> Self {
        self.same_bar_policy = policy;
        self
    }

    pub fn with_entry_basis(mut self, basis: EntryBasis) -> Self {
        self.entry_basis = basis;
        self
    }

    /// Switch to the grouped volatility pattern
    pub fn with_grouped_volatility(mut self, candle_size: f64, follow_direction: bool) -> Self {
        self.pattern = PatternKind::GroupedVolatility;
        self.candle_size = candle_size;
        self.follow_direction = follow_direction;
        self
    }

    /// Reject non-positive periods, negative or non-finite distances
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.lookback == 0 {
            return Err(ParamsError::ZeroPeriod { field: "lookback" });
        }
        if self.max_hold == 0 {
            return Err(ParamsError::ZeroPeriod { field: "max_hold" });
        }

        for (field, value) in [
            ("range_threshold", self.range_threshold),
            ("spread", self.spread),
            ("candle_size", self.candle_size),
        ] {
            check_finite(field, value)?;
            if value < 0.0 {
                return Err(ParamsError::Negative { field, value });
            }
        }

        for (field, value) in [
            ("take_profit", self.take_profit),
            ("stop_loss", self.stop_loss),
        ] {
            check_finite(field, value)?;
            if value <= 0.0 {
                return Err(ParamsError::NonPositive { field, value });
            }
        }

        Ok(())
    }

    /// Multiply every distance field by `factor` (pips to price conversion)
    pub fn scale_distances(&self, factor: f64) -> Self {
        Self {
            range_threshold: self.range_threshold * factor,
            take_profit: self.take_profit * factor,
            stop_loss: self.stop_loss * factor,
            spread: self.spread * factor,
            candle_size: self.candle_size * factor,
            ..self.clone()
        }
    }

    /// Smallest series length that allows at least one signal bar
    pub fn min_bars(&self) -> usize {
        self.lookback
            .saturating_add(self.max_hold)
            .saturating_add(1)
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::NonFinite { field, value })
    }
}
