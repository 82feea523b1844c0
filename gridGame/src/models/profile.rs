use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::error::{GridError, Result};
use crate::models::source::SourceSet;

/// ISO week number used to key profiles and optima.
pub type WeekId = u32;

/// Demand and availability for one week.
///
/// Demand is in MW and held constant over each timestep of `step_hours`.
/// Availability factors are only required for intermittent sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub week: WeekId,
    pub timestamps: Vec<NaiveDateTime>,
    pub step_hours: f64,
    pub demand: Vec<f64>,
    pub availability: BTreeMap<String, Vec<f64>>,
}

impl Profile {
    pub fn new(week: WeekId, timestamps: Vec<NaiveDateTime>, step_hours: f64, demand: Vec<f64>) -> Self {
        Self {
            week,
            timestamps,
            step_hours,
            demand,
            availability: BTreeMap::new(),
        }
    }

    /// Evenly spaced timestamps from `start`.
    pub fn from_demand(week: WeekId, start: NaiveDateTime, step_hours: f64, demand: Vec<f64>) -> Self {
        let step_seconds = (step_hours * 3600.0).round() as i64;
        let timestamps = (0..demand.len())
            .map(|i| start + Duration::seconds(step_seconds * i as i64))
            .collect();
        Self::new(week, timestamps, step_hours, demand)
    }

    pub fn with_availability(mut self, source: &str, factors: Vec<f64>) -> Self {
        self.availability.insert(source.to_string(), factors);
        self
    }

    pub fn len(&self) -> usize {
        self.demand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demand.is_empty()
    }

    pub fn duration_hours(&self) -> f64 {
        self.demand.len() as f64 * self.step_hours
    }

    /// Total demand over the profile, in MWh.
    pub fn total_demand(&self) -> f64 {
        self.demand.iter().sum::<f64>() * self.step_hours
    }

    pub fn peak_demand(&self) -> f64 {
        self.demand.iter().copied().fold(0.0, f64::max)
    }

    pub fn availability_for(&self, source: &str) -> Option<&[f64]> {
        self.availability.get(source).map(Vec::as_slice)
    }

    /// Check the profile against the sources it will be dispatched with.
    pub fn validate(&self, sources: &SourceSet) -> Result<()> {
        if self.demand.is_empty() {
            return Err(GridError::invalid(format!("profile for week {} has no timesteps", self.week)));
        }
        if !self.step_hours.is_finite() || self.step_hours <= 0.0 {
            return Err(GridError::invalid(format!(
                "profile for week {} has invalid step length {} h",
                self.week, self.step_hours
            )));
        }
        if self.timestamps.len() != self.demand.len() {
            return Err(GridError::invalid(format!(
                "profile for week {} has {} timestamps for {} demand values",
                self.week,
                self.timestamps.len(),
                self.demand.len()
            )));
        }
        if let Some((i, d)) = self
            .demand
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d <= 0.0)
        {
            return Err(GridError::invalid(format!(
                "demand at step {} of week {} must be positive, got {}",
                i, self.week, d
            )));
        }
        for source in sources.iter().filter(|s| s.class.uses_availability()) {
            let factors = self.availability_for(&source.name).ok_or_else(|| {
                GridError::invalid(format!(
                    "profile for week {} has no availability for intermittent source {}",
                    self.week, source.name
                ))
            })?;
            if factors.len() != self.demand.len() {
                return Err(GridError::invalid(format!(
                    "availability for {} has {} values, expected {}",
                    source.name,
                    factors.len(),
                    self.demand.len()
                )));
            }
            if let Some((i, a)) = factors
                .iter()
                .enumerate()
                .find(|(_, a)| !(0.0..=1.0).contains(*a))
            {
                return Err(GridError::invalid(format!(
                    "availability for {} at step {} must lie in [0, 1], got {}",
                    source.name, i, a
                )));
            }
        }
        Ok(())
    }
}
