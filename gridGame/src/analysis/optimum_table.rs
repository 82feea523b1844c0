use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::game_config::ObjectiveConfig;
use crate::core::dispatch::Score;
use crate::error::{GridError, Result};
use crate::models::capacity::CapacityVector;
use crate::models::profile::WeekId;
use crate::models::source::SourceSet;
use crate::utils::logging::{self, FileIOType, OperationCategory};

/// Optimum found for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimumRecord {
    pub capacity: CapacityVector,
    pub score: Score,
    /// Seed the search for this week was run with.
    pub seed: u64,
}

/// Why a week has no optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeekFailure {
    Infeasible { best_shortfall: f64 },
    InvalidInput { message: String },
    LoadFailed { message: String },
    NotFound,
    Cancelled,
    Panicked { message: String },
}

impl From<&GridError> for WeekFailure {
    fn from(err: &GridError) -> Self {
        match err {
            GridError::Infeasible { best_shortfall, .. } => WeekFailure::Infeasible {
                best_shortfall: *best_shortfall,
            },
            GridError::NotFound(_) => WeekFailure::NotFound,
            GridError::InvalidInput(message) => WeekFailure::InvalidInput {
                message: message.clone(),
            },
            GridError::IoError(_) | GridError::CsvError(_) | GridError::JsonError(_) => WeekFailure::LoadFailed {
                message: err.to_string(),
            },
            GridError::BatchPartialFailure { .. } => WeekFailure::InvalidInput {
                message: err.to_string(),
            },
        }
    }
}

impl std::fmt::Display for WeekFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeekFailure::Infeasible { best_shortfall } => {
                write!(f, "infeasible (smallest shortfall {:.3} MWh)", best_shortfall)
            }
            WeekFailure::InvalidInput { message } => write!(f, "invalid input: {}", message),
            WeekFailure::LoadFailed { message } => write!(f, "profile could not be loaded: {}", message),
            WeekFailure::NotFound => write!(f, "no profile for this week"),
            WeekFailure::Cancelled => write!(f, "cancelled before it started"),
            WeekFailure::Panicked { message } => write!(f, "solver panicked: {}", message),
        }
    }
}

/// Per-week optima of a batch run, with the weeks that failed.
///
/// The table remembers the catalogue and objective it was computed with so a
/// consumer can tell when it no longer matches the active configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyOptimumTable {
    pub generated_at: String,
    #[serde(default)]
    pub sources: Option<SourceSet>,
    #[serde(default)]
    pub objective: Option<ObjectiveConfig>,
    pub entries: BTreeMap<WeekId, OptimumRecord>,
    #[serde(default)]
    pub failures: BTreeMap<WeekId, WeekFailure>,
}

impl WeeklyOptimumTable {
    pub fn new(sources: &SourceSet, objective: &ObjectiveConfig) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            sources: Some(sources.clone()),
            objective: Some(objective.clone()),
            entries: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn record_success(&mut self, week: WeekId, record: OptimumRecord) {
        self.failures.remove(&week);
        self.entries.insert(week, record);
    }

    pub fn record_failure(&mut self, week: WeekId, failure: WeekFailure) {
        self.entries.remove(&week);
        self.failures.insert(week, failure);
    }

    pub fn get(&self, week: WeekId) -> Option<&OptimumRecord> {
        self.entries.get(&week)
    }

    pub fn failure(&self, week: WeekId) -> Option<&WeekFailure> {
        self.failures.get(&week)
    }

    pub fn lookup_optimum(&self, week: WeekId) -> Result<(CapacityVector, Score)> {
        self.entries
            .get(&week)
            .map(|r| (r.capacity.clone(), r.score.clone()))
            .ok_or(GridError::NotFound(week))
    }

    pub fn succeeded(&self) -> usize {
        self.entries.len()
    }

    pub fn failed_weeks(&self) -> Vec<WeekId> {
        self.failures.keys().copied().collect()
    }

    /// Weeks that were cancelled rather than attempted.
    pub fn cancelled_weeks(&self) -> Vec<WeekId> {
        self.failures
            .iter()
            .filter(|(_, f)| **f == WeekFailure::Cancelled)
            .map(|(w, _)| *w)
            .collect()
    }

    pub fn ensure_complete(&self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(GridError::BatchPartialFailure {
                failed: self.failed_weeks(),
                succeeded: self.succeeded(),
            })
        }
    }

    /// True when the table was not computed for this catalogue and objective.
    pub fn is_stale_for(&self, sources: &SourceSet, objective: &ObjectiveConfig) -> bool {
        self.sources.as_ref() != Some(sources) || self.objective.as_ref() != Some(objective)
    }

    /// Write the whole table at once; a crash mid-write leaves any previous file intact.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let _timing = logging::start_timing(
            "save_table",
            OperationCategory::FileIO { subcategory: FileIOType::TableSave },
        );
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp_path, path)?;
        info!(
            "Saved optimum table ({} weeks, {} failures) to {}",
            self.entries.len(),
            self.failures.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let _timing = logging::start_timing(
            "load_table",
            OperationCategory::FileIO { subcategory: FileIOType::TableLoad },
        );
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mw: f64) -> OptimumRecord {
        OptimumRecord {
            capacity: CapacityVector::new().with("gas", mw),
            score: Score {
                cost: mw * 10.0,
                objective: mw * 10.0,
                ..Score::default()
            },
            seed: 1,
        }
    }

    #[test]
    fn success_replaces_failure() {
        let mut table = WeeklyOptimumTable::default();
        table.record_failure(4, WeekFailure::Cancelled);
        table.record_success(4, record(5.0));
        assert!(table.failure(4).is_none());
        assert_eq!(table.lookup_optimum(4).unwrap().0.get("gas"), 5.0);
        assert!(table.ensure_complete().is_ok());
    }

    #[test]
    fn lookup_of_failed_week_is_not_found() {
        let mut table = WeeklyOptimumTable::default();
        table.record_failure(2, WeekFailure::Infeasible { best_shortfall: 3.0 });
        assert!(matches!(table.lookup_optimum(2), Err(GridError::NotFound(2))));
        match table.ensure_complete() {
            Err(GridError::BatchPartialFailure { failed, succeeded }) => {
                assert_eq!(failed, vec![2]);
                assert_eq!(succeeded, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lookup_is_idempotent() {
        let mut table = WeeklyOptimumTable::default();
        table.record_success(1, record(7.0));
        assert_eq!(table.lookup_optimum(1).unwrap(), table.lookup_optimum(1).unwrap());
    }

    #[test]
    fn staleness_tracks_catalogue_and_objective() {
        let sources = SourceSet::default_catalog();
        let objective = ObjectiveConfig::default();
        let table = WeeklyOptimumTable::new(&sources, &objective);
        assert!(!table.is_stale_for(&sources, &objective));
        assert!(table.is_stale_for(&sources, &ObjectiveConfig::cost_only()));
        assert!(WeeklyOptimumTable::default().is_stale_for(&sources, &objective));
    }

    #[test]
    fn failures_serialise_with_a_kind_tag() {
        let json = serde_json::to_string(&WeekFailure::Infeasible { best_shortfall: 1.5 }).unwrap();
        assert_eq!(json, r#"{"kind":"infeasible","best_shortfall":1.5}"#);
    }

    #[test]
    fn error_mapping() {
        let err = GridError::Infeasible { restarts: 3, best_shortfall: 2.0 };
        assert_eq!(WeekFailure::from(&err), WeekFailure::Infeasible { best_shortfall: 2.0 });
        assert_eq!(WeekFailure::from(&GridError::NotFound(5)), WeekFailure::NotFound);
    }
}
