//! Simulation Engine - Drives runs of a workflow day by day
//!
//! The engine owns nothing run-specific. It holds a shared, immutable
//! [`WorkflowDefinition`] and moves caller-owned [`ExecutionContext`]s
//! through the lifecycle:
//!
//! 1. `initialize` validates the inputs, seeds the context and returns it
//!    positioned on the first day
//! 2. `execute_step` processes one calendar day and advances the context
//!    by exactly one day
//! 3. `finalize` resolves the declared outputs against the context
//!
//! On the simulation start day every step receives `set_parameters`, then
//! every step receives `initialize`, then `run_step`. On later in-bounds days
//! every step receives `integrate` before `run_step`. Days outside the
//! bounds only advance the calendar.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::error::EngineError;
use super::inputs::SimulationInputs;
use super::output::{DailyDetails, OutputExtractor};
use super::result::RunSummary;
use super::timing::TimingCollector;
use crate::step::{FailurePolicy, LifecyclePhase, ParameterSchema, Step, StepRegistry};
use crate::workflow::context::ExecutionContext;
use crate::workflow::definition::{RunMode, WorkflowDefinition};
use crate::workflow::expressions::Expression;
use crate::workflow::loader::WorkflowLoader;

/// Stateless driver for runs of one workflow
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    definition: Arc<WorkflowDefinition>,
}

impl SimulationEngine {
    pub fn new(definition: WorkflowDefinition) -> Self {
        Self::from_shared(Arc::new(definition))
    }

    pub fn from_shared(definition: Arc<WorkflowDefinition>) -> Self {
        Self { definition }
    }

    /// Parse and compile a YAML workflow document
    pub fn from_yaml(yaml: &str, registry: &StepRegistry) -> Result<Self, EngineError> {
        let document = WorkflowLoader::from_str(yaml)?;
        Ok(Self::new(WorkflowDefinition::build(document, registry)?))
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn shared_definition(&self) -> Arc<WorkflowDefinition> {
        Arc::clone(&self.definition)
    }

    pub fn run_mode_names(&self) -> Vec<&str> {
        self.definition.run_mode_names()
    }

    /// First run mode whose `run` flag is set
    pub fn default_run_mode(&self) -> Option<&str> {
        self.definition.enabled_run_mode_names().into_iter().next()
    }

    pub fn output_variable_names(&self, run_mode: &str) -> Result<Vec<&str>, EngineError> {
        Ok(self.definition.run_mode(run_mode)?.output_names())
    }

    /// Parameter schema per step type
    pub fn parameters_list(&self) -> IndexMap<String, ParameterSchema> {
        self.definition.parameters_list()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Validate inputs and create the context for one run
    #[instrument(
        skip(self, inputs),
        fields(
            workflow = self.definition.name().unwrap_or("<unnamed>"),
            start = %inputs.simulation_start_day,
            end = %inputs.simulation_end_day,
        )
    )]
    pub fn initialize(&self, inputs: SimulationInputs) -> Result<ExecutionContext, EngineError> {
        let bounds = inputs.bounds();
        bounds.validate().map_err(EngineError::InvalidTimeBounds)?;

        if !inputs.weather.is_empty() {
            if let Some(day) = inputs
                .weather
                .first_missing(bounds.simulation_start_day, bounds.simulation_end_day)
            {
                return Err(EngineError::MissingWeather(day));
            }
        }

        for variable in self.definition.driving_variables() {
            let value = inputs
                .driving
                .get(&variable.name)
                .filter(|v| !v.is_null())
                .ok_or_else(|| EngineError::MissingDrivingVariable(variable.name.clone()))?;
            if !variable.value_type.accepts(value) {
                return Err(EngineError::DrivingVariableType {
                    name: variable.name.clone(),
                    expected: variable.value_type,
                    value: value.clone(),
                });
            }
        }

        let daily_details = inputs
            .daily_details
            .unwrap_or(self.definition.options().daily_details);

        let mut ctx = ExecutionContext::new(bounds)
            .with_weather(inputs.weather, inputs.weather_columns)
            .with_driving(inputs.driving)
            .with_parameters(inputs.parameters)
            .with_daily_details(daily_details);

        for instruction in self.definition.init_instructions() {
            let value = match instruction.expression().evaluate(&ctx) {
                Some(value) => value,
                None if matches!(instruction.expression(), Expression::Literal(Value::Null)) => {
                    Value::Null
                }
                None => {
                    return Err(EngineError::InitInstruction {
                        name: instruction.name().to_string(),
                        reason: format!("source '{}' is unavailable", instruction.source_text()),
                    })
                }
            };
            ctx.set_fields(instruction.target(), value)
                .map_err(|e| EngineError::InitInstruction {
                    name: instruction.name().to_string(),
                    reason: e.to_string(),
                })?;
            debug!("Init {} <- {}", instruction.name(), instruction.source_text());
        }

        info!(run_id = %ctx.run_id(), first_day = %ctx.first_day(), "Run initialized");
        Ok(ctx)
    }

    /// Process the context's current day and advance it by one day
    pub fn execute_step(
        &self,
        ctx: &mut ExecutionContext,
        run_mode: &str,
    ) -> Result<(), EngineError> {
        self.execute_step_with_timings(ctx, run_mode, None)
    }

    /// `execute_step`, recording per-step phase durations into `timings`
    #[instrument(skip(self, ctx, timings), fields(run_id = %ctx.run_id(), day = %ctx.day()))]
    pub fn execute_step_with_timings(
        &self,
        ctx: &mut ExecutionContext,
        run_mode: &str,
        mut timings: Option<&mut TimingCollector>,
    ) -> Result<(), EngineError> {
        let mode = self.definition.run_mode(run_mode)?;
        if let Some(active) = ctx.run_mode() {
            if active != run_mode {
                return Err(EngineError::RunModeMismatch {
                    expected: active.to_string(),
                    actual: run_mode.to_string(),
                });
            }
        }

        let day = ctx.day();

        if ctx.is_in_bounds() {
            inject_weather(ctx)?;

            let start_day = ctx.is_start_day();
            if start_day {
                info!(run_mode, steps = mode.steps().len(), "Bootstrapping steps");
                run_phase(mode, LifecyclePhase::SetParameters, ctx, timings.as_deref_mut())?;
                run_phase(mode, LifecyclePhase::Initialize, ctx, timings.as_deref_mut())?;
                ctx.mark_initialized(run_mode);
            } else {
                if !ctx.model_initialized() {
                    return Err(EngineError::NotInitialized { day });
                }
                run_phase(mode, LifecyclePhase::Integrate, ctx, timings.as_deref_mut())?;
            }

            run_phase(mode, LifecyclePhase::RunStep, ctx, timings.as_deref_mut())?;

            if ctx.collects_daily_details() {
                if start_day {
                    ctx.start_daily_details(DailyDetails::new(&mode.output_names()));
                }
                OutputExtractor::capture_day(ctx, mode);
            }

            if day == ctx.simulation_end_day() {
                ctx.mark_completed();
                info!(run_mode, "Simulation period completed");
            }
        } else {
            debug!("Outside simulation bounds, advancing only");
        }

        ctx.advance_day().ok_or(EngineError::DateOverflow(day))?;
        Ok(())
    }

    /// Summary values of `run_mode`'s outputs, `0.0` where unavailable
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id()))]
    pub fn finalize(&self, ctx: &ExecutionContext, run_mode: &str) -> Result<Vec<f64>, EngineError> {
        let mode = self.definition.run_mode(run_mode)?;
        Ok(OutputExtractor::summary(ctx, mode))
    }

    /// Initialize a run and drive it through its end day
    pub fn run_to_end(
        &self,
        inputs: SimulationInputs,
        run_mode: &str,
    ) -> Result<RunSummary, EngineError> {
        let mode = self.definition.run_mode(run_mode)?;
        let mut ctx = self.initialize(inputs)?;
        let end_day = ctx.simulation_end_day();

        while ctx.day() <= end_day {
            self.execute_step(&mut ctx, run_mode)?;
        }

        Ok(RunSummary {
            run_id: ctx.run_id().to_string(),
            run_mode: run_mode.to_string(),
            end_day,
            outputs: OutputExtractor::named_summary(&ctx, mode),
            daily_details: ctx.take_daily_details(),
        })
    }
}

/// Copy today's weather record into `status.weather`
fn inject_weather(ctx: &mut ExecutionContext) -> Result<(), EngineError> {
    if ctx.weather().is_empty() {
        return Ok(());
    }
    let record = ctx
        .current_weather()
        .ok_or(EngineError::MissingWeather(ctx.day()))?;
    ctx.set_fields(&["weather"], Value::Object(record))?;
    Ok(())
}

fn run_phase(
    mode: &RunMode,
    phase: LifecyclePhase,
    ctx: &mut ExecutionContext,
    mut timings: Option<&mut TimingCollector>,
) -> Result<(), EngineError> {
    for step in mode.steps() {
        let started = Instant::now();
        let result = invoke(step.as_ref(), phase, ctx);
        if let Some(timings) = timings.as_deref_mut() {
            timings.record(step.name(), phase, started.elapsed());
        }

        match result {
            Ok(()) => debug!(step = step.name(), %phase, "Step phase done"),
            Err(e) => match step.failure_policy() {
                FailurePolicy::Soft => {
                    warn!(step = step.name(), %phase, day = %ctx.day(), "Step failed, continuing: {}", e);
                }
                FailurePolicy::Hard => {
                    error!(step = step.name(), %phase, day = %ctx.day(), "Step failed: {}", e);
                    return Err(EngineError::StepFailed {
                        step: step.name().to_string(),
                        phase,
                        day: ctx.day(),
                        error: e,
                    });
                }
            },
        }
    }
    Ok(())
}

fn invoke(
    step: &dyn Step,
    phase: LifecyclePhase,
    ctx: &mut ExecutionContext,
) -> Result<(), crate::step::StepError> {
    match phase {
        LifecyclePhase::SetParameters => step.set_parameters(ctx),
        LifecyclePhase::Initialize => step.initialize(ctx),
        LifecyclePhase::Integrate => step.integrate(ctx),
        LifecyclePhase::RunStep => step.run_step(ctx),
    }
}
