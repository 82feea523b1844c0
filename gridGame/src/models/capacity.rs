use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::models::source::SourceSet;

/// Installed capacity per source, in MW.
///
/// Sources without an entry have no capacity installed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacityVector(BTreeMap<String, f64>);

impl CapacityVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, mw: f64) -> Self {
        self.0.insert(name.to_string(), mw);
        self
    }

    pub fn set(&mut self, name: &str, mw: f64) {
        self.0.insert(name.to_string(), mw);
    }

    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Capacities in catalogue order, rejecting unknown names and invalid values.
    pub fn to_dense(&self, sources: &SourceSet) -> Result<Vec<f64>> {
        for (name, &mw) in &self.0 {
            if sources.index_of(name).is_none() {
                return Err(GridError::invalid(format!("unknown source in capacity vector: {}", name)));
            }
            if !mw.is_finite() || mw < 0.0 {
                return Err(GridError::invalid(format!(
                    "capacity for {} must be finite and non-negative, got {}",
                    name, mw
                )));
            }
        }
        Ok(sources.iter().map(|s| self.get(&s.name)).collect())
    }

    pub fn from_dense(sources: &SourceSet, values: &[f64]) -> Self {
        sources
            .iter()
            .zip(values)
            .map(|(s, &mw)| (s.name.clone(), mw))
            .collect()
    }
}

impl FromIterator<(String, f64)> for CapacityVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapacityVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={:.1} MW", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Search bounds for one source. `upper == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: Option<f64>,
}

impl Bound {
    pub const UNBOUNDED: Bound = Bound { lower: 0.0, upper: None };

    pub fn new(lower: f64, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn upper_or_infinity(&self) -> f64 {
        self.upper.unwrap_or(f64::INFINITY)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.lower.is_finite() || self.lower < 0.0 {
            return Err(GridError::invalid(format!(
                "lower bound for {} must be finite and non-negative, got {}",
                name, self.lower
            )));
        }
        if let Some(upper) = self.upper {
            if upper.is_nan() || upper < self.lower {
                return Err(GridError::invalid(format!(
                    "upper bound for {} ({}) is below its lower bound ({})",
                    name, upper, self.lower
                )));
            }
        }
        Ok(())
    }
}

/// Per-source capacity bounds with a shared default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityBounds {
    pub default: Bound,
    #[serde(default)]
    pub per_source: BTreeMap<String, Bound>,
}

impl Default for CapacityBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl CapacityBounds {
    pub fn unbounded() -> Self {
        Self {
            default: Bound::UNBOUNDED,
            per_source: BTreeMap::new(),
        }
    }

    /// Every source between 0 and `max_mw`.
    pub fn uniform(max_mw: f64) -> Self {
        Self {
            default: Bound::new(0.0, Some(max_mw)),
            per_source: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, lower: f64, upper: Option<f64>) -> Self {
        self.per_source.insert(name.to_string(), Bound::new(lower, upper));
        self
    }

    pub fn bound_for(&self, name: &str) -> Bound {
        self.per_source.get(name).copied().unwrap_or(self.default)
    }

    /// Bounds in catalogue order as `(lower, upper)` pairs.
    pub fn to_dense(&self, sources: &SourceSet) -> Result<Vec<(f64, f64)>> {
        for name in self.per_source.keys() {
            if sources.index_of(name).is_none() {
                return Err(GridError::invalid(format!("bounds given for unknown source: {}", name)));
            }
        }
        sources
            .iter()
            .map(|s| {
                let bound = self.bound_for(&s.name);
                bound.validate(&s.name)?;
                Ok((bound.lower, bound.upper_or_infinity()))
            })
            .collect()
    }
}
