use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::constants::*;
use crate::error::{GridError, Result};
use crate::models::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ObjectiveMode {
    /// Operating cost, capacity cost and priced emissions.
    #[default]
    Balanced,
    /// Operating and capacity cost only; emissions are reported but not priced.
    CostOnly,
}

/// How emissions are priced into the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConfig {
    pub mode: ObjectiveMode,
    /// EUR per tCO2e charged on every source's emissions.
    pub social_carbon_cost: f64,
    /// EUR per tCO2e charged additionally on carbon-taxed sources.
    pub carbon_tax: f64,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            mode: ObjectiveMode::Balanced,
            social_carbon_cost: SOCIAL_CARBON_COST,
            carbon_tax: CARBON_TAX,
        }
    }
}

impl ObjectiveConfig {
    pub fn cost_only() -> Self {
        Self {
            mode: ObjectiveMode::CostOnly,
            ..Self::default()
        }
    }

    /// EUR per tCO2e applied to a source's emissions.
    pub fn carbon_price(&self, source: &Source) -> f64 {
        match self.mode {
            ObjectiveMode::CostOnly => 0.0,
            ObjectiveMode::Balanced => {
                self.social_carbon_cost + if source.carbon_taxed { self.carbon_tax } else { 0.0 }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.social_carbon_cost.is_finite() || self.social_carbon_cost < 0.0 {
            return Err(GridError::invalid("social_carbon_cost must be finite and non-negative"));
        }
        if !self.carbon_tax.is_finite() || self.carbon_tax < 0.0 {
            return Err(GridError::invalid("carbon_tax must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Budget and seeding of the optimum search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of Nelder-Mead starts, the first from the capacity ceiling.
    pub restarts: usize,
    /// Iterations per start.
    pub max_iterations: usize,
    /// Relative convergence tolerance on the penalised objective.
    pub tolerance: f64,
    /// Scales the shortfall penalty above the most expensive way of covering a MWh.
    pub penalty_multiplier: f64,
    /// Bisection steps per source when trimming unused capacity.
    pub trim_iterations: usize,
    pub seed: u64,
    pub objective: ObjectiveConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            penalty_multiplier: DEFAULT_PENALTY_MULTIPLIER,
            trim_iterations: DEFAULT_TRIM_ITERATIONS,
            seed: DEFAULT_SEED,
            objective: ObjectiveConfig::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.restarts == 0 {
            return Err(GridError::invalid("solver needs at least one restart"));
        }
        if self.max_iterations == 0 {
            return Err(GridError::invalid("solver needs at least one iteration"));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(GridError::invalid("solver tolerance must be positive"));
        }
        if !self.penalty_multiplier.is_finite() || self.penalty_multiplier < 1.0 {
            return Err(GridError::invalid("penalty multiplier must be at least 1"));
        }
        self.objective.validate()
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Worker pool and cancellation settings of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// Stop starting new weeks after this many seconds.
    pub deadline_secs: Option<u64>,
    pub show_progress: bool,
    pub solver: SolverConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            deadline_secs: None,
            show_progress: false,
            solver: SolverConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(GridError::invalid("batch needs at least one worker"));
        }
        self.solver.validate()
    }
}
