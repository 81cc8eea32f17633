//! Simulation engine module
//!
//! This module contains:
//! - `simulation` - The day-stepping lifecycle driver
//! - `error` - Engine error types
//! - `inputs` - Per-run inputs (bounds, driving variables, weather)
//! - `output` - Output extraction and daily details
//! - `result` - Run summary types
//! - `timing` - Optional per-run step timings
//! - `snapshot` - Checksummed context snapshots
//! - `batch` - Parallel runner for independent simulations

pub mod batch;
pub mod error;
pub mod inputs;
pub mod output;
pub mod result;
pub mod simulation;
pub mod snapshot;
pub mod timing;

pub use batch::{BatchResult, BatchRunError, BatchRunner, RunOutcome, RunRequest};
pub use error::EngineError;
pub use inputs::SimulationInputs;
pub use output::{DailyDetails, OutputExtractor, DAY_COLUMN, DOY_COLUMN};
pub use result::RunSummary;
pub use simulation::SimulationEngine;
pub use snapshot::{ContextSnapshot, SnapshotError};
pub use timing::{PhaseTiming, TimingCollector};
