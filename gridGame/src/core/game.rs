// Interactive entry points: score a player's choice and compare it to the week's optimum
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::optimum_table::WeeklyOptimumTable;
use crate::config::game_config::ObjectiveConfig;
use crate::core::dispatch::{DispatchReport, Dispatcher, Score};
use crate::data::profile_loader::ProfileLoader;
use crate::error::Result;
use crate::models::capacity::CapacityVector;
use crate::models::profile::WeekId;
use crate::models::source::SourceSet;
use crate::utils::logging::{self, OperationCategory};

/// A candidate's score next to the optimum of the same week.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub week: WeekId,
    pub candidate: Score,
    pub optimum: Score,
    pub optimum_capacity: CapacityVector,
    /// Candidate objective over optimum objective; `None` when the optimum is free.
    pub relative_cost: Option<f64>,
}

impl Comparison {
    pub fn candidate_feasible(&self) -> bool {
        self.candidate.is_feasible()
    }
}

pub struct GameEngine {
    sources: SourceSet,
    objective: ObjectiveConfig,
    loader: Arc<dyn ProfileLoader>,
    table: WeeklyOptimumTable,
}

impl GameEngine {
    pub fn new(
        sources: SourceSet,
        objective: ObjectiveConfig,
        loader: Arc<dyn ProfileLoader>,
        table: WeeklyOptimumTable,
    ) -> Self {
        if table.is_stale_for(&sources, &objective) {
            warn!("Optimum table was computed for a different catalogue or objective; regenerate it");
        }
        Self {
            sources,
            objective,
            loader,
            table,
        }
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn table(&self) -> &WeeklyOptimumTable {
        &self.table
    }

    /// Score a candidate against the week's profile. Blackouts are a normal outcome.
    pub fn evaluate(&self, capacity: &CapacityVector, week: WeekId) -> Result<Score> {
        let _timing = logging::start_timing("evaluate", OperationCategory::Dispatch);
        let profile = self.loader.load_week(week)?;
        let score = Dispatcher::new(&self.sources, &profile, &self.objective)?.score(capacity)?;
        debug!(
            "Week {}: candidate objective {:.2}, shortfall {:.3} MWh",
            week, score.objective, score.shortfall
        );
        Ok(score)
    }

    /// Per-timestep dispatch of a candidate, for plotting.
    pub fn dispatch(&self, capacity: &CapacityVector, week: WeekId) -> Result<DispatchReport> {
        let _timing = logging::start_timing("dispatch_report", OperationCategory::Dispatch);
        let profile = self.loader.load_week(week)?;
        Dispatcher::new(&self.sources, &profile, &self.objective)?.report(capacity)
    }

    pub fn lookup_optimum(&self, week: WeekId) -> Result<(CapacityVector, Score)> {
        self.table.lookup_optimum(week)
    }

    pub fn compare(&self, capacity: &CapacityVector, week: WeekId) -> Result<Comparison> {
        let (optimum_capacity, optimum) = self.lookup_optimum(week)?;
        let candidate = self.evaluate(capacity, week)?;
        let relative_cost = if optimum.objective > 0.0 {
            Some(candidate.objective / optimum.objective)
        } else {
            None
        };
        Ok(Comparison {
            week,
            candidate,
            optimum,
            optimum_capacity,
            relative_cost,
        })
    }
}
