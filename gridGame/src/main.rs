use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use gridgame::analysis::optimum_table::WeeklyOptimumTable;
use gridgame::cli::cli::{Args, Command, DataArgs, EvaluateArgs, LookupArgs, OptimiseArgs};
use gridgame::config::game_config::{BatchConfig, ObjectiveConfig, ObjectiveMode, SolverConfig};
use gridgame::core::batch::BatchOptimizer;
use gridgame::core::dispatch::Score;
use gridgame::core::game::GameEngine;
use gridgame::data::csv_loader::CsvProfileLoader;
use gridgame::models::capacity::CapacityBounds;
use gridgame::models::source::SourceSet;
use gridgame::utils::csv_export;
use gridgame::utils::logging;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.enable_timing(), args.debug_logging());

    let result = match args.command() {
        Command::Optimise(opts) => optimise(opts),
        Command::Evaluate(opts) => evaluate(opts),
        Command::Lookup(opts) => lookup(opts),
    };

    logging::print_timing_report();
    result
}

fn load_sources(data: &DataArgs) -> Result<SourceSet> {
    match &data.sources {
        Some(path) => SourceSet::load_from_file(path)
            .with_context(|| format!("loading source catalogue {}", path.display())),
        None => Ok(SourceSet::default_catalog()),
    }
}

fn load_profiles(data: &DataArgs) -> Result<CsvProfileLoader> {
    let loader = CsvProfileLoader::from_path(&data.data)
        .with_context(|| format!("loading dataset {}", data.data.display()))?;
    Ok(loader.with_demand_scale(data.demand_scale))
}

fn objective(data: &DataArgs, base: ObjectiveConfig) -> ObjectiveConfig {
    if data.cost_only {
        ObjectiveConfig { mode: ObjectiveMode::CostOnly, ..base }
    } else {
        base
    }
}

fn optimise(opts: &OptimiseArgs) -> Result<()> {
    let sources = load_sources(&opts.data)?;
    let loader = load_profiles(&opts.data)?;

    let mut solver = match &opts.solver_config {
        Some(path) => SolverConfig::load_from_file(path)
            .with_context(|| format!("loading solver configuration {}", path.display()))?,
        None => SolverConfig::default(),
    };
    if let Some(seed) = opts.seed {
        solver.seed = seed;
    }
    if let Some(restarts) = opts.restarts {
        solver.restarts = restarts;
    }
    if let Some(max_iterations) = opts.max_iterations {
        solver.max_iterations = max_iterations;
    }
    solver.objective = objective(&opts.data, solver.objective);

    let mut config = BatchConfig {
        deadline_secs: opts.deadline_secs,
        show_progress: !opts.no_progress,
        solver,
        ..BatchConfig::default()
    };
    if let Some(workers) = opts.workers {
        config.workers = workers;
    }

    let bounds = match opts.max_capacity {
        Some(max) => CapacityBounds::uniform(max),
        None => CapacityBounds::unbounded(),
    };

    let mut batch = BatchOptimizer::new(Arc::new(loader), sources, bounds, config);
    if let Some(path) = &opts.warm_start {
        let previous = WeeklyOptimumTable::load_from_file(path)
            .with_context(|| format!("loading warm-start table {}", path.display()))?;
        batch = batch.with_warm_starts(&previous);
    }

    let table = batch.run(&opts.weeks.0).context("running batch")?;
    table
        .save_to_file(&opts.output)
        .with_context(|| format!("writing {}", opts.output.display()))?;
    if let Some(summary) = &opts.summary {
        csv_export::export_table_summary(&table, summary)
            .with_context(|| format!("writing {}", summary.display()))?;
    }

    println!(
        "Solved {} of {} weeks; table written to {}",
        table.succeeded(),
        opts.weeks.0.len(),
        opts.output.display()
    );
    for (week, failure) in &table.failures {
        println!("  week {:>2}: {}", week, failure);
    }
    if opts.strict {
        table.ensure_complete()?;
    }
    Ok(())
}

fn evaluate(opts: &EvaluateArgs) -> Result<()> {
    let sources = load_sources(&opts.data)?;
    let loader = load_profiles(&opts.data)?;
    let objective = objective(&opts.data, ObjectiveConfig::default());
    let capacity = opts.capacity_vector()?;

    let table = match &opts.table {
        Some(path) => load_table(path)?,
        None => WeeklyOptimumTable::new(&sources, &objective),
    };
    let engine = GameEngine::new(sources, objective, Arc::new(loader), table);

    let report = engine.dispatch(&capacity, opts.week)?;
    println!("Week {} with {}", opts.week, capacity);
    print_score(&report.score);
    for window in report.blackout_windows() {
        println!(
            "  blackout {} to {}: {:.1} MWh unmet, peak {:.1} MW",
            window.start, window.end, window.energy, window.peak
        );
    }

    if opts.table.is_some() {
        let comparison = engine.compare(&capacity, opts.week)?;
        println!("Optimum: {}", comparison.optimum_capacity);
        print_score(&comparison.optimum);
        if let Some(ratio) = comparison.relative_cost {
            println!("Candidate costs {:.1}% of the optimum", ratio * 100.0);
        }
    }

    if let Some(path) = &opts.dispatch_out {
        csv_export::export_dispatch_csv(&report, path).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn lookup(opts: &LookupArgs) -> Result<()> {
    let table = load_table(&opts.table)?;
    if let Some(failure) = table.failure(opts.week) {
        bail!("week {} has no optimum: {}", opts.week, failure);
    }
    let (capacity, score) = table.lookup_optimum(opts.week)?;
    println!("Week {} optimum: {}", opts.week, capacity);
    print_score(&score);
    Ok(())
}

fn load_table(path: &Path) -> Result<WeeklyOptimumTable> {
    WeeklyOptimumTable::load_from_file(path).with_context(|| format!("loading optimum table {}", path.display()))
}

fn print_score(score: &Score) {
    println!(
        "  objective {:.0} EUR (operating {:.0}, capacity {:.0}, carbon {:.0})",
        score.objective, score.cost, score.capacity_cost, score.carbon_cost
    );
    println!(
        "  emissions {:.1} t, shortfall {:.1} MWh over {} steps, surplus {:.1} MWh",
        score.emissions, score.shortfall, score.blackout_steps, score.surplus
    );
    if let Some(per_mwh) = score.cost_per_mwh() {
        println!("  {:.2} EUR/MWh served", per_mwh);
    }
}
