use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::const_funcs::weekly_capacity_cost;
use crate::config::constants::*;
use crate::error::{GridError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceClass {
    /// Output limited by a per-timestep availability factor (wind, solar).
    Intermittent,
    /// Firm zero-fuel source delivering its full capacity (hydro, geothermal).
    Renewable,
    /// Fuel-burning source dispatched in merit order.
    Dispatchable,
}

impl SourceClass {
    /// Priority sources are dispatched before the merit-ordered ones.
    pub fn has_priority(&self) -> bool {
        matches!(self, SourceClass::Intermittent | SourceClass::Renewable)
    }

    pub fn uses_availability(&self) -> bool {
        matches!(self, SourceClass::Intermittent)
    }
}

impl FromStr for SourceClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intermittent" => Ok(SourceClass::Intermittent),
            "renewable" => Ok(SourceClass::Renewable),
            "dispatchable" => Ok(SourceClass::Dispatchable),
            _ => Err(format!("Unknown source class: {}", s)),
        }
    }
}

impl fmt::Display for SourceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceClass::Intermittent => write!(f, "Intermittent"),
            SourceClass::Renewable => write!(f, "Renewable"),
            SourceClass::Dispatchable => write!(f, "Dispatchable"),
        }
    }
}

/// A generation technology available to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub class: SourceClass,
    /// EUR per MWh dispatched.
    pub unit_cost: f64,
    /// tCO2e per MWh dispatched.
    pub emissions_intensity: f64,
    /// EUR per MW installed per week.
    #[serde(default)]
    pub capacity_cost: f64,
    /// Whether emissions also pay the carbon tax on top of the social cost.
    #[serde(default)]
    pub carbon_taxed: bool,
}

impl Source {
    pub fn new(name: &str, class: SourceClass, unit_cost: f64, emissions_intensity: f64) -> Self {
        Self {
            name: name.to_string(),
            class,
            unit_cost,
            emissions_intensity,
            capacity_cost: 0.0,
            carbon_taxed: false,
        }
    }

    pub fn with_capacity_cost(mut self, capacity_cost: f64) -> Self {
        self.capacity_cost = capacity_cost;
        self
    }

    pub fn with_carbon_tax(mut self, carbon_taxed: bool) -> Self {
        self.carbon_taxed = carbon_taxed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GridError::invalid("source name must not be empty"));
        }
        for (field, value) in [
            ("unit_cost", self.unit_cost),
            ("emissions_intensity", self.emissions_intensity),
            ("capacity_cost", self.capacity_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GridError::invalid(format!(
                    "source {}: {} must be finite and non-negative, got {}",
                    self.name, field, value
                )));
            }
        }
        Ok(())
    }
}

/// The fixed set of sources known for a run, in catalogue order.
///
/// Construction checks that names are unique and parameters are in range, so
/// every other module can index sources by position without re-validating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Source>", into = "Vec<Source>")]
pub struct SourceSet {
    sources: Vec<Source>,
}

impl SourceSet {
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        if sources.is_empty() {
            return Err(GridError::invalid("source set must contain at least one source"));
        }
        let mut seen = HashSet::new();
        for source in &sources {
            source.validate()?;
            if !seen.insert(source.name.as_str()) {
                return Err(GridError::invalid(format!("duplicate source name: {}", source.name)));
            }
        }
        Ok(Self { sources })
    }

    /// Technologies of the game with default cost and emissions figures.
    pub fn default_catalog() -> Self {
        let sources = vec![
            Source::new("solar", SourceClass::Intermittent, SOLAR_FUEL_COST, SOLAR_EMISSIONS)
                .with_capacity_cost(weekly_capacity_cost(SOLAR_CAPEX, SOLAR_LIFETIME, SOLAR_FIXED_OM)),
            Source::new("wind", SourceClass::Intermittent, WIND_FUEL_COST, WIND_EMISSIONS)
                .with_capacity_cost(weekly_capacity_cost(WIND_CAPEX, WIND_LIFETIME, WIND_FIXED_OM)),
            Source::new("nuclear", SourceClass::Dispatchable, NUCLEAR_FUEL_COST, NUCLEAR_EMISSIONS)
                .with_capacity_cost(weekly_capacity_cost(NUCLEAR_CAPEX, NUCLEAR_LIFETIME, NUCLEAR_FIXED_OM)),
            Source::new("gas", SourceClass::Dispatchable, GAS_FUEL_COST, GAS_EMISSIONS)
                .with_capacity_cost(weekly_capacity_cost(GAS_CAPEX, GAS_LIFETIME, GAS_FIXED_OM))
                .with_carbon_tax(true),
            Source::new("coal", SourceClass::Dispatchable, COAL_FUEL_COST, COAL_EMISSIONS)
                .with_capacity_cost(weekly_capacity_cost(COAL_CAPEX, COAL_LIFETIME, COAL_FIXED_OM))
                .with_carbon_tax(true),
        ];
        Self { sources }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let sources: Vec<Source> = serde_json::from_str(&contents)?;
        Self::new(sources)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.sources)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Source> {
        self.sources.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Indices in dispatch order: priority sources first, then merit order.
    ///
    /// Within each group sources are sorted by unit cost, then emissions
    /// intensity, then name, so the order is total.
    pub fn merit_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.sources.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (&self.sources[a], &self.sources[b]);
            sb.class
                .has_priority()
                .cmp(&sa.class.has_priority())
                .then(sa.unit_cost.total_cmp(&sb.unit_cost))
                .then(sa.emissions_intensity.total_cmp(&sb.emissions_intensity))
                .then(sa.name.cmp(&sb.name))
        });
        order
    }
}

impl TryFrom<Vec<Source>> for SourceSet {
    type Error = GridError;

    fn try_from(sources: Vec<Source>) -> Result<Self> {
        Self::new(sources)
    }
}

impl From<SourceSet> for Vec<Source> {
    fn from(set: SourceSet) -> Self {
        set.sources
    }
}

impl<'a> IntoIterator for &'a SourceSet {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}
