// Module layout for the grid balancing game engine

pub mod error;

// Dispatch, optimum search, batch driver and game facade
pub mod core {
    pub mod dispatch;
    pub mod solver;
    pub mod batch;
    pub mod game;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod const_funcs;
    pub mod game_config;
}

// Model definitions
pub mod models {
    pub mod source;
    pub mod capacity;
    pub mod profile;
}

// Profile loaders
pub mod data {
    pub mod profile_loader;
    pub mod csv_loader;
}

// Results and derived views
pub mod analysis {
    pub mod optimum_table;
    pub mod windows;
}

// Utility functions
pub mod utils {
    pub mod logging;
    pub mod csv_export;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

// Re-export commonly used items
pub use crate::analysis::optimum_table::{OptimumRecord, WeekFailure, WeeklyOptimumTable};
pub use crate::core::batch::{BatchOptimizer, CancellationToken};
pub use crate::core::dispatch::{evaluate, DispatchReport, Score};
pub use crate::core::game::GameEngine;
pub use crate::core::solver::{solve, solve_from, Solution};
pub use crate::error::{GridError, Result};
pub use crate::models::capacity::{CapacityBounds, CapacityVector};
pub use crate::models::profile::{Profile, WeekId};
pub use crate::models::source::{Source, SourceClass, SourceSet};
