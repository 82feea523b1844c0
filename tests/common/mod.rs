//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use gridgame::config::game_config::{BatchConfig, SolverConfig};
use gridgame::{Profile, Source, SourceClass, SourceSet, WeekId};

/// Monday 2 January 2023, 00:00.
pub fn week_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Hourly profile with constant demand.
pub fn flat_profile(week: WeekId, demand_mw: f64, steps: usize) -> Profile {
    Profile::from_demand(week, week_start(), 1.0, vec![demand_mw; steps])
}

/// Single dispatchable source without emissions or fixed cost.
pub fn single_dispatchable(unit_cost: f64) -> SourceSet {
    SourceSet::new(vec![Source::new("gas", SourceClass::Dispatchable, unit_cost, 0.0)]).unwrap()
}

/// Wind (free, intermittent) backed by two dispatchable sources of different cost.
pub fn wind_gas_coal() -> SourceSet {
    SourceSet::new(vec![
        Source::new("wind", SourceClass::Intermittent, 0.0, 0.0),
        Source::new("gas", SourceClass::Dispatchable, 20.0, 0.4),
        Source::new("coal", SourceClass::Dispatchable, 35.0, 0.9),
    ])
    .unwrap()
}

/// A day of hourly demand with a daily shape and gusty wind, seeded by `week`.
pub fn daily_profile(week: WeekId) -> Profile {
    let demand: Vec<f64> = (0..24)
        .map(|h| 500.0 + 150.0 * ((h as f64 - 6.0) / 24.0 * std::f64::consts::TAU).sin())
        .collect();
    let wind: Vec<f64> = (0..24)
        .map(|h| ((h * 7 + week as usize * 3) % 10) as f64 / 10.0)
        .collect();
    Profile::from_demand(week, week_start(), 1.0, demand).with_availability("wind", wind)
}

/// Small, seeded search budget that keeps the tests quick.
pub fn quick_solver(seed: u64) -> SolverConfig {
    SolverConfig {
        restarts: 3,
        max_iterations: 150,
        ..SolverConfig::default()
    }
    .with_seed(seed)
}

pub fn quick_batch(workers: usize) -> BatchConfig {
    BatchConfig {
        workers,
        solver: quick_solver(42),
        ..BatchConfig::default()
    }
}
