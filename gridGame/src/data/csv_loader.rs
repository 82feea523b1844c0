use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDateTime};
use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::config::constants::DAYS_PER_PROFILE;
use crate::data::profile_loader::ProfileLoader;
use crate::error::{GridError, Result};
use crate::models::profile::{Profile, WeekId};
use crate::utils::logging::{self, FileIOType, OperationCategory};

const DATETIME_COLUMN: &str = "datetime";
const DEMAND_COLUMN: &str = "demand";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| GridError::invalid(format!("unrecognised datetime: {}", raw)))
}

fn parse_value(raw: &str, column: &str, row: usize) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| GridError::invalid(format!("row {}: {} is not a number: {:?}", row, column, raw)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(GridError::invalid(format!(
            "row {}: {} must be finite and non-negative, got {}",
            row, column, value
        )));
    }
    Ok(value)
}

/// Weekly profiles cut from one timestamped dataset.
///
/// The CSV holds a `datetime` column, a `demand` column in MW and one column
/// per source with its generation history. Each source column is scaled by
/// its maximum over the whole dataset to give availability factors. A week
/// starts at the first timestamp in that ISO week and spans seven days.
#[derive(Debug, Clone)]
pub struct CsvProfileLoader {
    timestamps: Vec<NaiveDateTime>,
    demand: Vec<f64>,
    availability: BTreeMap<String, Vec<f64>>,
    week_starts: BTreeMap<WeekId, usize>,
    demand_scale: f64,
}

impl CsvProfileLoader {
    pub fn from_path(path: &Path) -> Result<Self> {
        let _timing = logging::start_timing(
            "load_profiles",
            OperationCategory::FileIO { subcategory: FileIOType::DataLoad },
        );
        let file = std::fs::File::open(path)?;
        let loader = Self::from_reader(file)?;
        info!(
            "Loaded {} rows covering {} weeks from {}",
            loader.timestamps.len(),
            loader.week_starts.len(),
            path.display()
        );
        Ok(loader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| GridError::invalid(format!("dataset has no {} column", name)))
        };
        let datetime_idx = column(DATETIME_COLUMN)?;
        let demand_idx = column(DEMAND_COLUMN)?;
        let source_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != datetime_idx && *i != demand_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows: Vec<(NaiveDateTime, f64, Vec<f64>)> = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let ts = parse_datetime(field(datetime_idx))?;
            let demand = parse_value(field(demand_idx), DEMAND_COLUMN, row + 1)?;
            let values = source_columns
                .iter()
                .map(|(idx, name)| parse_value(field(*idx), name, row + 1))
                .collect::<Result<Vec<f64>>>()?;
            rows.push((ts, demand, values));
        }
        if rows.is_empty() {
            return Err(GridError::invalid("dataset has no rows"));
        }
        rows.sort_by_key(|(ts, _, _)| *ts);

        let mut seen = HashSet::new();
        if let Some((ts, _, _)) = rows.iter().find(|(ts, _, _)| !seen.insert(*ts)) {
            return Err(GridError::invalid(format!("duplicate timestamp {}", ts)));
        }

        let timestamps: Vec<NaiveDateTime> = rows.iter().map(|(ts, _, _)| *ts).collect();
        let demand = rows.iter().map(|(_, d, _)| *d).collect();
        let mut availability = BTreeMap::new();
        for (k, (_, name)) in source_columns.iter().enumerate() {
            let raw: Vec<f64> = rows.iter().map(|(_, _, v)| v[k]).collect();
            let max = raw.iter().copied().fold(0.0, f64::max);
            let factors = if max > 0.0 {
                raw.iter().map(|v| v / max).collect()
            } else {
                vec![0.0; raw.len()]
            };
            availability.insert(name.clone(), factors);
        }

        let mut week_starts = BTreeMap::new();
        for (i, ts) in timestamps.iter().enumerate() {
            week_starts.entry(ts.date().iso_week().week()).or_insert(i);
        }
        debug!(
            "Dataset columns: {:?}",
            source_columns.iter().map(|(_, n)| n.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            timestamps,
            demand,
            availability,
            week_starts,
            demand_scale: 1.0,
        })
    }

    /// Multiply every demand value, e.g. to size the dataset to a smaller grid.
    pub fn with_demand_scale(mut self, scale: f64) -> Self {
        self.demand_scale = scale;
        self
    }

    pub fn source_columns(&self) -> Vec<&str> {
        self.availability.keys().map(String::as_str).collect()
    }

    fn step_hours(&self, range: std::ops::Range<usize>, week: WeekId) -> Result<f64> {
        let slice = &self.timestamps[range];
        let step = match slice {
            [first, second, ..] => *second - *first,
            _ => match self.timestamps.as_slice() {
                [first, second, ..] => *second - *first,
                _ => return Err(GridError::invalid("dataset needs at least two rows to infer a timestep")),
            },
        };
        if let Some(pair) = slice.windows(2).find(|w| w[1] - w[0] != step) {
            return Err(GridError::invalid(format!(
                "week {} has an irregular timestep between {} and {}",
                week, pair[0], pair[1]
            )));
        }
        Ok(step.num_seconds() as f64 / 3600.0)
    }
}

impl ProfileLoader for CsvProfileLoader {
    fn load_week(&self, week: WeekId) -> Result<Profile> {
        let start = *self.week_starts.get(&week).ok_or(GridError::NotFound(week))?;
        let end_ts = self.timestamps[start] + Duration::days(DAYS_PER_PROFILE);
        let end = start + self.timestamps[start..].partition_point(|ts| *ts < end_ts);

        let step_hours = self.step_hours(start..end, week)?;
        let demand = self.demand[start..end].iter().map(|d| d * self.demand_scale).collect();
        let mut profile = Profile::new(week, self.timestamps[start..end].to_vec(), step_hours, demand);
        for (name, factors) in &self.availability {
            profile = profile.with_availability(name, factors[start..end].to_vec());
        }
        Ok(profile)
    }

    fn available_weeks(&self) -> Vec<WeekId> {
        self.week_starts.keys().copied().collect()
    }
}
