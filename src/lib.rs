//! # cropsim
//!
//! A configuration-driven daily crop simulation engine. Independent
//! computational components ("steps") are assembled into run modes by a
//! declarative YAML workflow and driven through a per-day lifecycle over one
//! shared, dynamically extensible execution context.
//!
//! ## Features
//!
//! - **Declarative YAML workflows** - Run modes, init instructions, driving variables
//! - **Pluggable steps** - Self-describing components behind the `Step` trait
//! - **Dotted-path outputs** - `status.crop.states.LAI`, `status.soil.SM[0]`, `status.soil.SM.mean()`
//! - **Daily details** - Optional per-day time series of every declared output
//! - **Parallel batches** - Many independent runs sharing one immutable workflow
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cropsim::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let workflow_yaml = r#"
//! name: thermal-time
//! run_modes:
//!   potential:
//!     steps: [crop.ThermalTime]
//!     outputs:
//!       - name: TSUM
//!         source: status.thermaltime.states.TSUM
//! "#;
//!
//!     let engine = SimulationEngine::from_yaml(workflow_yaml, &StepRegistry::with_builtins())?;
//!     let inputs = WorkflowLoader::load_inputs("site.yaml".as_ref())?;
//!
//!     let mut ctx = engine.initialize(inputs)?;
//!     while ctx.day() <= ctx.simulation_end_day() {
//!         engine.execute_step(&mut ctx, "potential")?;
//!     }
//!
//!     println!("{:?}", engine.finalize(&ctx, "potential")?);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod step;
pub mod workflow;

// Re-export main types
pub use engine::{
    BatchResult, BatchRunError, BatchRunner, ContextSnapshot, DailyDetails, EngineError,
    OutputExtractor, RunOutcome, RunRequest, RunSummary, SimulationEngine, SimulationInputs,
    SnapshotError, TimingCollector,
};
pub use step::{
    FailurePolicy, LifecyclePhase, ParameterSchema, ParameterSpec, Step, StepError, StepRegistry,
    ValueType, VariableSchema, VariableSpec,
};
pub use workflow::{
    ContextError, DefinitionError, ExecutionContext, LoadError, RunMode, RunState, TimeBounds,
    WeatherSeries, WorkflowDefinition, WorkflowDocument, WorkflowLoader,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{
        BatchRunner, EngineError, RunOutcome, RunRequest, RunSummary, SimulationEngine,
        SimulationInputs, TimingCollector,
    };
    pub use crate::step::{Step, StepError, StepRegistry};
    pub use crate::workflow::{
        ExecutionContext, LoadError, WeatherSeries, WorkflowDefinition, WorkflowLoader,
    };
}
