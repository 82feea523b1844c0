// Error types shared by the evaluator, solver, batch driver and loaders
use crate::models::profile::WeekId;

#[derive(Debug)]
pub enum GridError {
    /// Malformed or out-of-range capacity vector, profile, bounds or config.
    InvalidInput(String),
    /// No restart produced a shortfall-free capacity vector within budget.
    Infeasible {
        restarts: usize,
        best_shortfall: f64,
    },
    /// No precomputed optimum (or profile) exists for the week.
    NotFound(WeekId),
    /// A batch run recorded failures for some weeks.
    BatchPartialFailure {
        failed: Vec<WeekId>,
        succeeded: usize,
    },
    IoError(std::io::Error),
    CsvError(csv::Error),
    JsonError(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GridError::InvalidInput(msg.into())
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(self, GridError::Infeasible { .. })
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::IoError(err)
    }
}

impl From<csv::Error> for GridError {
    fn from(err: csv::Error) -> Self {
        GridError::CsvError(err)
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonError(err)
    }
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::InvalidInput(s) => write!(f, "Invalid input: {}", s),
            GridError::Infeasible { restarts, best_shortfall } => write!(
                f,
                "No feasible capacity found after {} restarts (smallest shortfall {:.3} MWh)",
                restarts, best_shortfall
            ),
            GridError::NotFound(week) => write!(f, "No entry for week {}", week),
            GridError::BatchPartialFailure { failed, succeeded } => write!(
                f,
                "Batch finished with {} failed weeks ({} succeeded): {:?}",
                failed.len(),
                succeeded,
                failed
            ),
            GridError::IoError(e) => write!(f, "IO error: {}", e),
            GridError::CsvError(e) => write!(f, "CSV error: {}", e),
            GridError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridError::IoError(e) => Some(e),
            GridError::CsvError(e) => Some(e),
            GridError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}
