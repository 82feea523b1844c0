use chrono::{Duration, NaiveDateTime};

/// A contiguous run of timesteps where a series exceeds a threshold.
///
/// `start_index` is inclusive and `end_index` exclusive. `end` is the
/// timestamp at which the run stops, i.e. the start of the first step after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start_index: usize,
    pub end_index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Sum of the series over the run times the step length (MWh).
    pub energy: f64,
    pub peak: f64,
}

impl Window {
    pub fn steps(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn duration_hours(&self, step_hours: f64) -> f64 {
        self.steps() as f64 * step_hours
    }
}

/// Group consecutive values above `threshold` into windows.
pub fn find_windows(values: &[f64], timestamps: &[NaiveDateTime], step_hours: f64, threshold: f64) -> Vec<Window> {
    let step = Duration::seconds((step_hours * 3600.0).round() as i64);
    let end_of = |index: usize| -> NaiveDateTime {
        match timestamps.get(index) {
            Some(ts) => *ts,
            None => timestamps[index - 1] + step,
        }
    };

    let mut windows = Vec::new();
    let mut open: Option<usize> = None;
    let len = values.len().min(timestamps.len());

    for i in 0..=len {
        let active = i < len && values[i] > threshold;
        match (open, active) {
            (None, true) => open = Some(i),
            (Some(start), false) => {
                let run = &values[start..i];
                windows.push(Window {
                    start_index: start,
                    end_index: i,
                    start: timestamps[start],
                    end: end_of(i),
                    energy: run.iter().sum::<f64>() * step_hours,
                    peak: run.iter().copied().fold(0.0, f64::max),
                });
                open = None;
            }
            _ => {}
        }
    }
    windows
}
