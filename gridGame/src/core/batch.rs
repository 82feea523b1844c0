//! Weekly optimum search across many weeks on a bounded worker pool.
//!
//! Every week is an independent task on a rayon pool. Tasks report back over a
//! channel and the calling thread assembles the table, so a failing, panicking
//! or cancelled week only ever shows up as a recorded failure.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::analysis::optimum_table::{OptimumRecord, WeekFailure, WeeklyOptimumTable};
use crate::config::const_funcs::week_seed;
use crate::config::game_config::{BatchConfig, SolverConfig};
use crate::core::solver::solve_from;
use crate::data::profile_loader::ProfileLoader;
use crate::error::{GridError, Result};
use crate::models::capacity::{CapacityBounds, CapacityVector};
use crate::models::profile::WeekId;
use crate::models::source::SourceSet;
use crate::utils::logging::{self, OperationCategory};

/// Cooperative stop signal shared between the caller and a running batch.
///
/// Weeks already being solved finish; weeks not yet started are recorded as
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum WeekOutcome {
    Solved(OptimumRecord),
    Failed(WeekFailure),
}

/// Everything a week task needs, shared read-only between workers.
struct WeekJob {
    loader: Arc<dyn ProfileLoader>,
    sources: SourceSet,
    bounds: CapacityBounds,
    solver: SolverConfig,
    warm_starts: BTreeMap<WeekId, CapacityVector>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl WeekJob {
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    fn solve_week(&self, week: WeekId) -> WeekOutcome {
        let profile = match self.loader.load_week(week) {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Week {}: could not load profile: {}", week, err);
                return WeekOutcome::Failed(WeekFailure::from(&err));
            }
        };

        let seed = week_seed(self.solver.seed, week);
        let config = self.solver.clone().with_seed(seed);
        match solve_from(&profile, &self.sources, &self.bounds, &config, self.warm_starts.get(&week)) {
            Ok(solution) => WeekOutcome::Solved(OptimumRecord {
                capacity: solution.capacity,
                score: solution.score,
                seed,
            }),
            Err(err) => {
                warn!("Week {}: {}", week, err);
                WeekOutcome::Failed(WeekFailure::from(&err))
            }
        }
    }

    fn run(&self, week: WeekId) -> WeekOutcome {
        if self.should_stop() {
            return WeekOutcome::Failed(WeekFailure::Cancelled);
        }
        panic::catch_unwind(AssertUnwindSafe(|| self.solve_week(week))).unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            warn!("Week {}: solver panicked: {}", week, message);
            WeekOutcome::Failed(WeekFailure::Panicked { message })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Solves the optimum of many weeks and collects them into a table.
pub struct BatchOptimizer {
    loader: Arc<dyn ProfileLoader>,
    sources: SourceSet,
    bounds: CapacityBounds,
    config: BatchConfig,
    warm_starts: BTreeMap<WeekId, CapacityVector>,
    cancel: CancellationToken,
}

impl BatchOptimizer {
    pub fn new(loader: Arc<dyn ProfileLoader>, sources: SourceSet, bounds: CapacityBounds, config: BatchConfig) -> Self {
        Self {
            loader,
            sources,
            bounds,
            config,
            warm_starts: BTreeMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Start each week's search from the optimum in a previous table as well.
    ///
    /// Entries naming sources outside the current catalogue are skipped.
    pub fn with_warm_starts(mut self, previous: &WeeklyOptimumTable) -> Self {
        self.warm_starts = previous
            .entries
            .iter()
            .filter(|(_, record)| record.capacity.iter().all(|(name, _)| self.sources.index_of(name).is_some()))
            .map(|(week, record)| (*week, record.capacity.clone()))
            .collect();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Solve every listed week. Duplicate ids are solved once.
    ///
    /// Only configuration errors are returned as `Err`; week failures are
    /// recorded in the table.
    pub fn run(&self, weeks: &[WeekId]) -> Result<WeeklyOptimumTable> {
        let _timing = logging::start_timing("run_batch", OperationCategory::Batch);
        self.config.validate()?;
        self.bounds.to_dense(&self.sources)?;

        let weeks: BTreeSet<WeekId> = weeks.iter().copied().collect();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("gridgame-week-{}", i))
            .build()
            .map_err(|e| GridError::invalid(format!("could not start worker pool: {}", e)))?;

        let job = Arc::new(WeekJob {
            loader: Arc::clone(&self.loader),
            sources: self.sources.clone(),
            bounds: self.bounds.clone(),
            solver: self.config.solver.clone(),
            warm_starts: self.warm_starts.clone(),
            cancel: self.cancel.clone(),
            deadline: self
                .config
                .deadline_secs
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        });

        info!(
            "Solving {} weeks on {} workers (seed {})",
            weeks.len(),
            self.config.workers,
            self.config.solver.seed
        );
        let progress = self.progress_bar(weeks.len());
        let mut table = WeeklyOptimumTable::new(&self.sources, &self.config.solver.objective);
        let (tx, rx) = mpsc::channel::<(WeekId, WeekOutcome)>();

        for &week in &weeks {
            if job.should_stop() {
                table.record_failure(week, WeekFailure::Cancelled);
                progress.inc(1);
                continue;
            }
            let job = Arc::clone(&job);
            let tx = tx.clone();
            pool.spawn(move || {
                let outcome = job.run(week);
                let _ = tx.send((week, outcome));
            });
        }
        drop(tx);

        for (week, outcome) in rx {
            match outcome {
                WeekOutcome::Solved(record) => {
                    info!("Week {}: objective {:.2} EUR", week, record.score.objective);
                    table.record_success(week, record);
                }
                WeekOutcome::Failed(failure) => table.record_failure(week, failure),
            }
            progress.set_message(format!("week {}", week));
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            "Batch finished: {} solved, {} failed ({} cancelled)",
            table.succeeded(),
            table.failures.len(),
            table.cancelled_weeks().len()
        );
        Ok(table)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {pos}/{len} weeks {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64).with_style(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::profile_loader::InMemoryLoader;
    use crate::models::profile::Profile;
    use crate::models::source::{Source, SourceClass};
    use chrono::NaiveDate;

    fn gas_only() -> SourceSet {
        SourceSet::new(vec![Source::new("gas", SourceClass::Dispatchable, 2.0, 0.0)]).unwrap()
    }

    fn loader(weeks: &[WeekId]) -> Arc<dyn ProfileLoader> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Arc::new(
            weeks
                .iter()
                .map(|&w| Profile::from_demand(w, start, 1.0, vec![10.0 * w as f64; 4]))
                .collect::<InMemoryLoader>(),
        )
    }

    fn config(workers: usize) -> BatchConfig {
        BatchConfig {
            workers,
            solver: SolverConfig {
                restarts: 2,
                max_iterations: 50,
                ..SolverConfig::default()
            },
            ..BatchConfig::default()
        }
    }

    struct PanickingLoader;

    impl ProfileLoader for PanickingLoader {
        fn load_week(&self, week: WeekId) -> Result<Profile> {
            panic!("no data for week {}", week)
        }

        fn available_weeks(&self) -> Vec<WeekId> {
            Vec::new()
        }
    }

    #[test]
    fn duplicate_weeks_are_solved_once() {
        let batch = BatchOptimizer::new(loader(&[1, 2]), gas_only(), CapacityBounds::unbounded(), config(2));
        let table = batch.run(&[2, 1, 2, 1]).unwrap();
        assert_eq!(table.entries.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!((table.get(2).unwrap().capacity.get("gas") - 20.0).abs() < 1e-6);
    }

    #[test]
    fn missing_profile_recorded_as_not_found() {
        let batch = BatchOptimizer::new(loader(&[1]), gas_only(), CapacityBounds::unbounded(), config(1));
        let table = batch.run(&[1, 5]).unwrap();
        assert_eq!(table.failure(5), Some(&WeekFailure::NotFound));
        assert!(table.get(1).is_some());
    }

    #[test]
    fn panicking_week_does_not_abort_batch() {
        let batch = BatchOptimizer::new(Arc::new(PanickingLoader), gas_only(), CapacityBounds::unbounded(), config(2));
        let table = batch.run(&[1, 2]).unwrap();
        assert!(table.entries.is_empty());
        match table.failure(1) {
            Some(WeekFailure::Panicked { message }) => assert!(message.contains("week 1")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cancelled_before_start_records_every_week() {
        let batch = BatchOptimizer::new(loader(&[1, 2, 3]), gas_only(), CapacityBounds::unbounded(), config(2));
        batch.cancellation_token().cancel();
        let table = batch.run(&[1, 2, 3]).unwrap();
        assert_eq!(table.cancelled_weeks(), vec![1, 2, 3]);
        assert!(table.entries.is_empty());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let batch = BatchOptimizer::new(loader(&[1]), gas_only(), CapacityBounds::unbounded(), config(0));
        assert!(matches!(batch.run(&[1]), Err(GridError::InvalidInput(_))));
    }

    #[test]
    fn seeds_depend_on_week_not_schedule() {
        let sources = gas_only();
        let one = BatchOptimizer::new(loader(&[1, 2, 3]), sources.clone(), CapacityBounds::unbounded(), config(1))
            .run(&[1, 2, 3])
            .unwrap();
        let many = BatchOptimizer::new(loader(&[1, 2, 3]), sources, CapacityBounds::unbounded(), config(3))
            .run(&[3, 2, 1])
            .unwrap();
        assert_eq!(one.entries, many.entries);
    }
}
