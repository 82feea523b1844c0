//! End-to-end checks of dispatch scoring and the optimum search.

mod common;

use gridgame::config::game_config::ObjectiveConfig;
use gridgame::core::dispatch::evaluate_with;
use gridgame::{evaluate, solve, solve_from, CapacityBounds, CapacityVector, GridError, Profile, Source, SourceClass, SourceSet};

#[test]
fn scenario_single_dispatchable_source() {
    let sources = common::single_dispatchable(1.0);
    let profile = common::flat_profile(1, 100.0, 10);

    let (capacity, score) = solve(&profile, &sources, &CapacityBounds::unbounded(), &common::quick_solver(1)).unwrap();

    assert!((capacity.get("gas") - 100.0).abs() < 1e-6);
    assert_eq!(score.shortfall, 0.0);
    assert!((score.cost - 1000.0).abs() < 1e-6);
}

#[test]
fn scenario_intermittent_only_is_infeasible() {
    let sources = SourceSet::new(vec![Source::new("wind", SourceClass::Intermittent, 0.0, 0.0)]).unwrap();
    let profile = common::flat_profile(1, 100.0, 10).with_availability("wind", vec![0.5; 10]);

    let err = solve(&profile, &sources, &CapacityBounds::uniform(150.0), &common::quick_solver(1)).unwrap_err();
    assert!(err.is_infeasible());
    if let GridError::Infeasible { best_shortfall, .. } = err {
        assert!((best_shortfall - 250.0).abs() < 1e-9);
    }
}

#[test]
fn scenario_free_renewable_displaces_gas() {
    let sources = SourceSet::new(vec![
        Source::new("renewable", SourceClass::Intermittent, 0.0, 0.0),
        Source::new("gas", SourceClass::Dispatchable, 5.0, 0.0),
    ])
    .unwrap();
    let profile = common::flat_profile(1, 50.0, 10).with_availability("renewable", vec![1.0; 10]);

    let (capacity, score) = solve(&profile, &sources, &CapacityBounds::unbounded(), &common::quick_solver(3)).unwrap();

    assert!((capacity.get("renewable") - 50.0).abs() < 1e-6);
    assert!(capacity.get("gas").abs() < 1e-6);
    assert!(score.cost.abs() < 1e-9);
    assert!(score.is_feasible());
}

#[test]
fn evaluation_is_deterministic() {
    let sources = common::wind_gas_coal();
    let profile = common::daily_profile(5);
    let capacity = CapacityVector::new().with("wind", 321.0).with("gas", 250.5).with("coal", 99.9);

    let first = evaluate(&sources, &capacity, &profile).unwrap();
    for _ in 0..5 {
        assert_eq!(evaluate(&sources, &capacity, &profile).unwrap(), first);
    }
}

#[test]
fn more_capacity_never_adds_shortfall_or_removes_own_cost() {
    let sources = common::wind_gas_coal();
    let profile = common::daily_profile(2);
    let base = CapacityVector::new().with("wind", 200.0).with("gas", 150.0).with("coal", 100.0);

    for name in ["wind", "gas", "coal"] {
        let mut previous = evaluate(&sources, &base, &profile).unwrap();
        for step in 1..=8 {
            let capacity = base.clone().with(name, base.get(name) + 50.0 * step as f64);
            let score = evaluate(&sources, &capacity, &profile).unwrap();
            assert!(score.shortfall <= previous.shortfall, "{} shortfall rose", name);
            assert!(
                score.sources[name].cost >= previous.sources[name].cost,
                "{} cost fell",
                name
            );
            previous = score;
        }
    }
}

#[test]
fn cheaper_dispatchable_is_used_first() {
    let sources = SourceSet::new(vec![
        Source::new("pricey", SourceClass::Dispatchable, 50.0, 0.0),
        Source::new("cheap", SourceClass::Dispatchable, 10.0, 0.0),
    ])
    .unwrap();
    let profile = common::flat_profile(1, 50.0, 3);
    let capacity = CapacityVector::new().with("cheap", 60.0).with("pricey", 60.0);

    let score = evaluate(&sources, &capacity, &profile).unwrap();
    assert_eq!(score.sources["cheap"].dispatched, 150.0);
    assert_eq!(score.sources["pricey"].dispatched, 0.0);
    assert_eq!(score.cost, 1500.0);
}

#[test]
fn solved_capacity_meets_demand_at_every_step() {
    let sources = common::wind_gas_coal();
    for week in 1..=4 {
        let profile = common::daily_profile(week);
        let solution = solve_from(&profile, &sources, &CapacityBounds::unbounded(), &common::quick_solver(week as u64), None)
            .unwrap();

        assert_eq!(solution.score.shortfall, 0.0);
        let rescored = evaluate(&sources, &solution.capacity, &profile).unwrap();
        assert_eq!(rescored.shortfall, 0.0);
        assert_eq!(rescored.blackout_steps, 0);
    }
}

#[test]
fn optimum_beats_a_gas_only_grid() {
    let sources = common::wind_gas_coal();
    let profile = common::daily_profile(7);
    let gas_only = CapacityVector::new().with("gas", profile.peak_demand());
    let reference = evaluate(&sources, &gas_only, &profile).unwrap();
    assert!(reference.is_feasible());

    let (_, score) = solve(&profile, &sources, &CapacityBounds::unbounded(), &common::quick_solver(11)).unwrap();
    assert!(score.objective <= reference.objective);
}

#[test]
fn same_seed_gives_same_optimum() {
    let sources = common::wind_gas_coal();
    let profile = common::daily_profile(9);
    let bounds = CapacityBounds::uniform(2000.0);

    let a = solve(&profile, &sources, &bounds, &common::quick_solver(99)).unwrap();
    let b = solve(&profile, &sources, &bounds, &common::quick_solver(99)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn cost_only_objective_ignores_emissions() {
    let sources = SourceSet::new(vec![
        Source::new("clean", SourceClass::Dispatchable, 30.0, 0.0),
        Source::new("dirty", SourceClass::Dispatchable, 20.0, 1.0).with_carbon_tax(true),
    ])
    .unwrap();
    let profile = common::flat_profile(1, 10.0, 4);
    let capacity = CapacityVector::new().with("dirty", 10.0);

    let cost_only = evaluate_with(&sources, &capacity, &profile, &ObjectiveConfig::cost_only()).unwrap();
    let balanced = evaluate_with(&sources, &capacity, &profile, &ObjectiveConfig::default()).unwrap();
    assert_eq!(cost_only.carbon_cost, 0.0);
    assert_eq!(cost_only.emissions, balanced.emissions);
    assert!(balanced.objective > cost_only.objective);
}

#[test]
fn invalid_profiles_are_rejected_not_clamped() {
    let sources = common::wind_gas_coal();
    let capacity = CapacityVector::new().with("gas", 10.0);

    let empty = Profile::from_demand(1, common::week_start(), 1.0, Vec::new());
    assert!(matches!(evaluate(&sources, &capacity, &empty), Err(GridError::InvalidInput(_))));

    let bad_factor = common::flat_profile(1, 10.0, 2).with_availability("wind", vec![0.5, 1.5]);
    assert!(matches!(evaluate(&sources, &capacity, &bad_factor), Err(GridError::InvalidInput(_))));

    let negative = CapacityVector::new().with("coal", -1.0);
    let ok_profile = common::flat_profile(1, 10.0, 2).with_availability("wind", vec![0.5, 0.5]);
    assert!(matches!(evaluate(&sources, &negative, &ok_profile), Err(GridError::InvalidInput(_))));
}
