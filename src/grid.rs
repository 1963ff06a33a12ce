//! Grid search parameter generation
//!
//! A [`ParameterGrid`] maps strategy field names to candidate values. Axes keep
//! the order they were declared in (JSON document order or insertion order),
//! and combinations are enumerated lexicographically over that order: the first
//! axis varies slowest, the last fastest.

use std::fmt;

use itertools::Itertools;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::strategies::{ParamsError, StrategyParams, DISTANCE_FIELDS};

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid parameter '{name}' is not a strategy field")]
    UnknownParameter { name: String },

    #[error("grid parameter '{name}' has no candidate values")]
    EmptyAxis { name: String },

    #[error("invalid grid override '{0}', expected name=v1,v2,...")]
    InvalidOverride(String),

    #[error("combination {index} ({values}) does not form valid parameters: {source}")]
    Malformed {
        index: usize,
        values: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("combination {index} ({values}) is invalid: {source}")]
    Invalid {
        index: usize,
        values: String,
        #[source]
        source: ParamsError,
    },

    #[error("failed to encode base parameters: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Ordered mapping of parameter name to candidate values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    axes: Vec<(String, Vec<Value>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis, or replace the values of an existing one in place
    pub fn set_axis(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name, values)),
        }
    }

    /// Builder form of [`set_axis`](Self::set_axis)
    pub fn with_axis<V: Into<Value>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.set_axis(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.axes.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of combinations; an empty grid has one (the base params)
    pub fn total_combinations(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Multiply numeric values of price-distance axes by `factor`
    pub fn scale_distances(&mut self, factor: f64) {
        for (name, values) in &mut self.axes {
            if !DISTANCE_FIELDS.contains(&name.as_str()) {
                continue;
            }
            for value in values.iter_mut() {
                if let Some(n) = value.as_f64() {
                    *value = serde_json::json!(n * factor);
                }
            }
        }
    }

    /// Apply `name=v1,v2` overrides from the command line
    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<(), GridError> {
        for s in overrides {
            let (name, values) =
                parse_grid_override(s).ok_or_else(|| GridError::InvalidOverride(s.clone()))?;
            self.set_axis(name, values);
        }
        Ok(())
    }

    /// Expand the grid into validated parameter sets.
    ///
    /// Each combination overlays its values onto `base`. Axis names must be
    /// strategy fields and every combination must validate; any failure
    /// rejects the whole grid. An empty grid yields `base` alone.
    pub fn expand(&self, base: &StrategyParams) -> Result<Vec<StrategyParams>, GridError> {
        let Value::Object(base_obj) = serde_json::to_value(base).map_err(GridError::Encode)?
        else {
            return Err(GridError::Encode(serde::ser::Error::custom(
                "strategy params did not encode as an object",
            )));
        };

        for (name, values) in &self.axes {
            if !base_obj.contains_key(name) {
                return Err(GridError::UnknownParameter { name: name.clone() });
            }
            if values.is_empty() {
                return Err(GridError::EmptyAxis { name: name.clone() });
            }
        }

        if self.axes.is_empty() {
            base.validate().map_err(|source| GridError::Invalid {
                index: 0,
                values: String::new(),
                source,
            })?;
            return Ok(vec![base.clone()]);
        }

        self.axes
            .iter()
            .map(|(_, values)| 0..values.len())
            .multi_cartesian_product()
            .enumerate()
            .map(|(index, picks)| {
                let mut obj = base_obj.clone();
                for ((name, values), &k) in self.axes.iter().zip(&picks) {
                    obj.insert(name.clone(), values[k].clone());
                }
                let params: StrategyParams = serde_json::from_value(Value::Object(obj))
                    .map_err(|source| GridError::Malformed {
                        index,
                        values: self.describe(&picks),
                        source,
                    })?;
                params.validate().map_err(|source| GridError::Invalid {
                    index,
                    values: self.describe(&picks),
                    source,
                })?;
                Ok(params)
            })
            .collect()
    }

    fn describe(&self, picks: &[usize]) -> String {
        self.axes
            .iter()
            .zip(picks)
            .map(|((name, values), &k)| format!("{}={}", name, values[k]))
            .join(", ")
    }
}

impl Serialize for ParameterGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.axes.len()))?;
        for (name, values) in &self.axes {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

struct GridVisitor;

impl<'de> Visitor<'de> for GridVisitor {
    type Value = ParameterGrid;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter names to arrays of values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut grid = ParameterGrid::new();
        while let Some((name, values)) = access.next_entry::<String, Vec<Value>>()? {
            if grid.axes.iter().any(|(n, _)| *n == name) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate grid parameter '{}'",
                    name
                )));
            }
            grid.axes.push((name, values));
        }
        Ok(grid)
    }
}

impl<'de> Deserialize<'de> for ParameterGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(GridVisitor)
    }
}

/// Parse a CLI override into a grid axis
/// Format: "param=val1,val2,val3"
pub fn parse_grid_override(s: &str) -> Option<(String, Vec<Value>)> {
    let (key, raw) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let values: Vec<Value> = raw
        .split(',')
        .filter_map(|v| {
            let v = v.trim();
            // Integers first so lookback/max_hold stay integral
            if let Ok(n) = v.parse::<i64>() {
                Some(serde_json::json!(n))
            } else if let Ok(n) = v.parse::<f64>() {
                Some(serde_json::json!(n))
            } else if v == "true" {
                Some(serde_json::json!(true))
            } else if v == "false" {
                Some(serde_json::json!(false))
            } else if !v.is_empty() {
                Some(serde_json::json!(v))
            } else {
                None
            }
        })
        .collect();

    if values.is_empty() {
        None
    } else {
        Some((key.to_string(), values))
    }
}
