//! Steps: the pluggable units of a daily simulation
//!
//! This module contains:
//! - `Step` - the lifecycle contract every component implements
//! - `schema` - parameter/input/output metadata
//! - `registry` - string-keyed factory used when building workflows
//! - `builtin` - reference steps shipped with the engine
//!
//! A step instance is created once per workflow definition and shared by
//! every run of it, possibly from several threads. All run-specific state
//! therefore lives in the [`ExecutionContext`], never in the step itself.

pub mod builtin;
pub mod registry;
pub mod schema;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workflow::context::{ContextError, ExecutionContext};

pub use registry::StepRegistry;
pub use schema::{ParameterSchema, ParameterSpec, ValueType, VariableSchema, VariableSpec};

/// The four per-run lifecycle calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    SetParameters,
    Initialize,
    Integrate,
    RunStep,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::SetParameters => "set_parameters",
            LifecyclePhase::Initialize => "initialize",
            LifecyclePhase::Integrate => "integrate",
            LifecyclePhase::RunStep => "run_step",
        };
        f.write_str(name)
    }
}

/// What the engine does when a step returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log a warning and continue the run with whatever the step left behind
    Soft,
    /// Log an error and abort the run
    #[default]
    Hard,
}

/// Errors raised by a step's own lifecycle code
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing input '{name}' on {day}")]
    MissingInput { name: String, day: NaiveDate },

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Computation failed: {0}")]
    Computation(String),
}

/// The lifecycle contract of a simulation component
///
/// The engine calls, for every step of the selected run mode and in list
/// order:
/// 1. `set_parameters` for all steps, once, on the simulation start day
/// 2. `initialize` for all steps, once, right after
/// 3. `integrate` on every in-bounds day except the start day
/// 4. `run_step` on every in-bounds day
///
/// ## Example
///
/// ```
/// use cropsim::step::{Step, StepError, VariableSchema, VariableSpec, ValueType};
/// use cropsim::ExecutionContext;
///
/// struct Counter;
///
/// impl Step for Counter {
///     fn name(&self) -> &str { "demo.Counter" }
///     fn namespace(&self) -> &str { "counter" }
///
///     fn output_schema(&self) -> VariableSchema {
///         VariableSchema::from([(
///             "N".to_string(),
///             VariableSpec::new("Days seen", ValueType::Int, "status.counter.states.N"),
///         )])
///     }
///
///     fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
///         ctx.set("counter.states.N", 0)?;
///         Ok(())
///     }
///
///     fn integrate(&self, _ctx: &mut ExecutionContext) -> Result<(), StepError> {
///         Ok(())
///     }
///
///     fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
///         let n = ctx.get_f64("counter.states.N").unwrap_or(0.0);
///         ctx.set("counter.states.N", n + 1.0)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Step: Send + Sync {
    /// Registry identifier, e.g. `crop.ThermalTime`
    fn name(&self) -> &str;

    /// Top-level `status` subtree owned by this step
    fn namespace(&self) -> &str;

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    fn input_schema(&self) -> VariableSchema {
        VariableSchema::new()
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema::new()
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    /// Bind configuration parameters into `<namespace>.params`
    fn set_parameters(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        bind_parameters(ctx, self.namespace(), &self.parameter_schema())
    }

    /// Establish initial state
    fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError>;

    /// Fold yesterday's rates into state
    fn integrate(&self, ctx: &mut ExecutionContext) -> Result<(), StepError>;

    /// Compute today's rates
    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError>;
}

impl fmt::Debug for dyn Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step({})", self.name())
    }
}

/// Copy every parameter of `schema` from the caller's parameter map into
/// `<namespace>.params.<name>`, applying defaults and checking types.
pub fn bind_parameters(
    ctx: &mut ExecutionContext,
    namespace: &str,
    schema: &ParameterSchema,
) -> Result<(), StepError> {
    for (name, spec) in schema {
        let value = match ctx.parameter(namespace, name) {
            Some(value) => value.clone(),
            None => match &spec.default {
                Some(default) => default.clone(),
                None if spec.mandatory => {
                    return Err(StepError::MissingParameter(format!("{}.{}", namespace, name)))
                }
                None => continue,
            },
        };

        if !spec.value_type.accepts(&value) {
            return Err(StepError::InvalidParameter {
                name: name.clone(),
                reason: format!("expected {:?}, got {}", spec.value_type, value),
            });
        }

        ctx.set_fields(&[namespace, "params", name.as_str()], value)?;
    }

    Ok(())
}
