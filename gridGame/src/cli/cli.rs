use std::ops::RangeInclusive;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::error::{GridError, Result as GridResult};
use crate::models::capacity::CapacityVector;
use crate::models::profile::WeekId;

#[derive(Parser)]
#[command(author, version, about = "Weekly capacity optimum search and scoring for the grid balancing game", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, default_value_t = false)]
    enable_timing: bool,

    #[arg(long, global = true, help = "Log solver restarts and dispatch details", default_value_t = false)]
    debug_logging: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Solve the optimum of every requested week and write the table
    Optimise(OptimiseArgs),
    /// Score a capacity vector against one week
    Evaluate(EvaluateArgs),
    /// Print the stored optimum of one week
    Lookup(LookupArgs),
}

#[derive(ClapArgs)]
pub struct DataArgs {
    #[arg(short, long, help = "CSV with datetime, demand and one column per source")]
    pub data: PathBuf,

    #[arg(long, help = "JSON source catalogue; defaults to the built-in technologies")]
    pub sources: Option<PathBuf>,

    #[arg(long, default_value_t = 1.0, help = "Factor applied to every demand value")]
    pub demand_scale: f64,

    #[arg(long, help = "Ignore emissions in the objective", default_value_t = false)]
    pub cost_only: bool,
}

#[derive(ClapArgs)]
pub struct OptimiseArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(short, long, default_value = "1-52", value_parser = parse_weeks, help = "Weeks as a list or range, e.g. 1-10,20")]
    pub weeks: WeekList,

    #[arg(short, long, default_value = "weekly_optimum.json")]
    pub output: PathBuf,

    #[arg(long, help = "CSV summary of the table")]
    pub summary: Option<PathBuf>,

    #[arg(long, help = "Previous table to warm-start from")]
    pub warm_start: Option<PathBuf>,

    #[arg(long, help = "JSON solver configuration")]
    pub solver_config: Option<PathBuf>,

    #[arg(long, help = "Upper bound in MW for every source")]
    pub max_capacity: Option<f64>,

    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    #[arg(long, help = "Random seed for the restarts")]
    pub seed: Option<u64>,

    #[arg(short, long)]
    pub restarts: Option<usize>,

    #[arg(long)]
    pub max_iterations: Option<usize>,

    #[arg(long, help = "Stop starting new weeks after this many seconds")]
    pub deadline_secs: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, help = "Exit with an error if any week failed", default_value_t = false)]
    pub strict: bool,
}

#[derive(ClapArgs)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(short, long)]
    pub week: WeekId,

    #[arg(short, long = "capacity", value_parser = parse_capacity, help = "Installed capacity as name=MW, repeatable")]
    pub capacity: Vec<(String, f64)>,

    #[arg(long, help = "Optimum table to compare against")]
    pub table: Option<PathBuf>,

    #[arg(long, help = "Write the per-timestep dispatch to this CSV")]
    pub dispatch_out: Option<PathBuf>,
}

#[derive(ClapArgs)]
pub struct LookupArgs {
    #[arg(short, long, default_value = "weekly_optimum.json")]
    pub table: PathBuf,

    #[arg(short, long)]
    pub week: WeekId,
}

/// Sorted, de-duplicated week ids.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekList(pub Vec<WeekId>);

fn parse_range(part: &str) -> Result<RangeInclusive<WeekId>, String> {
    let parse = |s: &str| s.trim().parse::<WeekId>().map_err(|_| format!("invalid week: {}", s));
    match part.split_once('-') {
        Some((a, b)) => {
            let (a, b) = (parse(a)?, parse(b)?);
            if a > b {
                return Err(format!("empty week range: {}", part));
            }
            Ok(a..=b)
        }
        None => {
            let w = parse(part)?;
            Ok(w..=w)
        }
    }
}

pub fn parse_weeks(s: &str) -> Result<WeekList, String> {
    let mut weeks: Vec<WeekId> = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        weeks.extend(parse_range(part)?);
    }
    if weeks.is_empty() {
        return Err("no weeks given".to_string());
    }
    weeks.sort_unstable();
    weeks.dedup();
    Ok(WeekList(weeks))
}

pub fn parse_capacity(s: &str) -> Result<(String, f64), String> {
    let (name, mw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=MW, got {}", s))?;
    let mw: f64 = mw.trim().parse().map_err(|_| format!("invalid capacity for {}: {}", name, mw))?;
    Ok((name.trim().to_string(), mw))
}

impl EvaluateArgs {
    /// The `-c` pairs as a capacity vector. A source named twice is rejected.
    pub fn capacity_vector(&self) -> GridResult<CapacityVector> {
        let mut capacity = CapacityVector::new();
        for (name, mw) in &self.capacity {
            if capacity.iter().any(|(seen, _)| seen == name.as_str()) {
                return Err(GridError::invalid(format!("capacity given twice for {}", name)));
            }
            capacity = capacity.with(name, *mw);
        }
        Ok(capacity)
    }
}

impl Args {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn enable_timing(&self) -> bool {
        self.enable_timing
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_lists_and_ranges() {
        assert_eq!(parse_weeks("3,1-2,2").unwrap(), WeekList(vec![1, 2, 3]));
        assert!(parse_weeks("5-1").is_err());
        assert!(parse_weeks("x").is_err());
    }

    #[test]
    fn capacity_pairs() {
        assert_eq!(parse_capacity("wind = 120.5").unwrap(), ("wind".to_string(), 120.5));
        assert!(parse_capacity("wind").is_err());
    }

    #[test]
    fn parses_subcommands() {
        let args = Args::try_parse_from([
            "gridgame", "--debug-logging", "evaluate", "--data", "d.csv", "--week", "4", "-c", "gas=10", "-c", "wind=5",
        ])
        .unwrap();
        assert!(args.debug_logging());
        match args.command() {
            Command::Evaluate(e) => {
                assert_eq!(e.week, 4);
                assert_eq!(e.capacity.len(), 2);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn repeated_capacity_name_is_rejected() {
        let args = Args::try_parse_from([
            "gridgame", "evaluate", "--data", "d.csv", "--week", "1", "-c", "gas=10", "-c", "gas=20",
        ])
        .unwrap();
        match args.command() {
            Command::Evaluate(e) => assert!(matches!(e.capacity_vector(), Err(GridError::InvalidInput(_)))),
            _ => panic!("expected evaluate"),
        }

        let args = Args::try_parse_from([
            "gridgame", "evaluate", "--data", "d.csv", "--week", "1", "-c", "gas=10", "-c", "wind=5",
        ])
        .unwrap();
        match args.command() {
            Command::Evaluate(e) => {
                let capacity = e.capacity_vector().unwrap();
                assert_eq!(capacity.get("gas"), 10.0);
                assert_eq!(capacity.get("wind"), 5.0);
            }
            _ => panic!("expected evaluate"),
        }
    }
}
