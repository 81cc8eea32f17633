//! Batch runner
//!
//! Run many independent simulations of one workflow in parallel, e.g. one
//! per site or per year. Every run owns its own context; the engine and its
//! definition are shared read-only. Runs are synchronous, so each one is
//! executed on tokio's blocking pool, bounded by a semaphore.
//!
//! ```no_run
//! # async fn demo(engine: cropsim::SimulationEngine) -> Result<(), Box<dyn std::error::Error>> {
//! use cropsim::engine::BatchRunner;
//!
//! let result = BatchRunner::new(engine)
//!     .parallel(8)
//!     .fail_fast(true)
//!     .run_directory("inputs/")
//!     .await?;
//! println!("{} runs completed", result.completed().count());
//! # Ok(())
//! # }
//! ```

use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::error::EngineError;
use super::inputs::SimulationInputs;
use super::result::RunSummary;
use super::simulation::SimulationEngine;
use crate::workflow::loader::{LoadError, WorkflowLoader};

#[derive(Debug, thiserror::Error)]
pub enum BatchRunError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Duplicate run id: {0}")]
    DuplicateRun(String),

    #[error("No run mode given and the workflow enables none")]
    NoRunMode,
}

/// One run of a batch
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub id: String,
    pub inputs: SimulationInputs,

    /// Overrides the runner's run mode
    pub run_mode: Option<String>,
}

impl RunRequest {
    pub fn new(id: impl Into<String>, inputs: SimulationInputs) -> Self {
        Self {
            id: id.into(),
            inputs,
            run_mode: None,
        }
    }

    pub fn with_run_mode(mut self, run_mode: impl Into<String>) -> Self {
        self.run_mode = Some(run_mode.into());
        self
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Failed(EngineError),
    /// The run's thread panicked
    Panicked(String),
    /// Not started because an earlier run failed with fail-fast enabled
    Skipped,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub success: bool,

    /// Outcome per run id, in request order
    pub runs: IndexMap<String, RunOutcome>,
}

impl BatchResult {
    pub fn completed(&self) -> impl Iterator<Item = (&str, &RunSummary)> {
        self.runs.iter().filter_map(|(id, outcome)| match outcome {
            RunOutcome::Completed(summary) => Some((id.as_str(), summary)),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.runs.iter().filter_map(|(id, outcome)| match outcome {
            RunOutcome::Failed(_) | RunOutcome::Panicked(_) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.runs
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RunOutcome::Skipped))
            .map(|(id, _)| id.as_str())
    }
}

pub struct BatchRunner {
    engine: Arc<SimulationEngine>,
    max_concurrent: usize,
    fail_fast: bool,
    run_mode: Option<String>,
}

impl BatchRunner {
    pub fn new(engine: SimulationEngine) -> Self {
        Self::from_shared(Arc::new(engine))
    }

    pub fn from_shared(engine: Arc<SimulationEngine>) -> Self {
        Self {
            engine,
            max_concurrent: 4,
            fail_fast: false,
            run_mode: None,
        }
    }

    pub fn parallel(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Run mode for requests that do not name one. Defaults to the
    /// workflow's first enabled run mode.
    pub fn run_mode(mut self, name: impl Into<String>) -> Self {
        self.run_mode = Some(name.into());
        self
    }

    /// Load every input file in `dir` and run them, using file stems as ids
    pub async fn run_directory(&self, dir: impl AsRef<Path>) -> Result<BatchResult, BatchRunError> {
        let requests = WorkflowLoader::load_inputs_directory(dir.as_ref())?
            .into_iter()
            .map(|(id, inputs)| RunRequest::new(id, inputs))
            .collect();
        self.run(requests).await
    }

    pub async fn run(&self, requests: Vec<RunRequest>) -> Result<BatchResult, BatchRunError> {
        let mut ids = HashSet::new();
        for request in &requests {
            if !ids.insert(request.id.as_str()) {
                return Err(BatchRunError::DuplicateRun(request.id.clone()));
            }
        }

        let default_mode = match &self.run_mode {
            Some(mode) => Some(mode.clone()),
            None => self.engine.default_run_mode().map(str::to_string),
        };
        if default_mode.is_none() && requests.iter().any(|r| r.run_mode.is_none()) {
            return Err(BatchRunError::NoRunMode);
        }

        info!(
            runs = requests.len(),
            parallel = self.max_concurrent,
            fail_fast = self.fail_fast,
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let failed = Arc::new(AtomicBool::new(false));

        let futures: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let engine = Arc::clone(&self.engine);
                let semaphore = Arc::clone(&semaphore);
                let failed = Arc::clone(&failed);
                let fail_fast = self.fail_fast;
                let run_mode = request
                    .run_mode
                    .or_else(|| default_mode.clone())
                    .unwrap_or_default();
                let id = request.id;
                let inputs = request.inputs;

                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (id, RunOutcome::Skipped);
                    };

                    if fail_fast && failed.load(Ordering::SeqCst) {
                        warn!(run = %id, "Skipping run after earlier failure");
                        return (id, RunOutcome::Skipped);
                    }

                    let task =
                        tokio::task::spawn_blocking(move || engine.run_to_end(inputs, &run_mode));

                    let outcome = match task.await {
                        Ok(Ok(summary)) => RunOutcome::Completed(summary),
                        Ok(Err(e)) => {
                            error!(run = %id, "Run failed: {}", e);
                            failed.store(true, Ordering::SeqCst);
                            RunOutcome::Failed(e)
                        }
                        Err(e) => {
                            error!(run = %id, "Run panicked: {}", e);
                            failed.store(true, Ordering::SeqCst);
                            RunOutcome::Panicked(e.to_string())
                        }
                    };
                    (id, outcome)
                }
            })
            .collect();

        let runs: IndexMap<String, RunOutcome> = join_all(futures).await.into_iter().collect();
        let success = runs.values().all(RunOutcome::is_success);

        info!(
            completed = runs.values().filter(|o| o.is_success()).count(),
            total = runs.len(),
            "Batch finished"
        );

        Ok(BatchResult { success, runs })
    }
}
