//! Compiled, immutable workflow definitions
//!
//! A [`WorkflowDefinition`] is built once from a [`WorkflowDocument`] and a
//! [`StepRegistry`]. Building compiles every init and output expression,
//! instantiates each distinct step type exactly once, and checks that every
//! step consuming another step's output is listed after its producer. The
//! result is read-only and safe to share across concurrent runs.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::RESERVED_FIELDS;
use super::document::{DrivingVariable, WorkflowDocument, WorkflowOptions};
use super::expressions::{Expression, ExpressionError};
use super::path::{self, ContextPath, PathError, PathRoot};
use crate::engine::output::{DAY_COLUMN, DOY_COLUMN};
use crate::step::{ParameterSchema, Step, StepRegistry};

/// Errors raised while building a definition
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Run mode '{run_mode}' uses unknown step type '{step}'")]
    UnknownStepType { run_mode: String, step: String },

    #[error("Unknown run mode: {0}")]
    UnknownRunMode(String),

    #[error("Duplicate driving variable: {0}")]
    DuplicateDrivingVariable(String),

    #[error("Run mode '{run_mode}' declares output '{name}' more than once")]
    DuplicateOutput { run_mode: String, name: String },

    #[error("Run mode '{run_mode}' declares output '{name}', which is a reserved column")]
    ReservedOutputName { run_mode: String, name: String },

    #[error("Output '{name}' in run mode '{run_mode}' has an invalid source: {error}")]
    InvalidOutput {
        run_mode: String,
        name: String,
        #[source]
        error: ExpressionError,
    },

    #[error("Init instruction '{name}' has an invalid source: {error}")]
    InvalidInitSource {
        name: String,
        #[source]
        error: ExpressionError,
    },

    #[error("Init instruction target '{name}' is invalid: {reason}")]
    InvalidInitTarget { name: String, reason: String },

    #[error("Step '{step}' declares an invalid context path for '{variable}': {error}")]
    InvalidSchemaPath {
        step: String,
        variable: String,
        #[source]
        error: PathError,
    },

    #[error(
        "Run mode '{run_mode}': step '{consumer}' reads {path} but is listed before its producer '{producer}'"
    )]
    StepOrder {
        run_mode: String,
        consumer: String,
        producer: String,
        path: String,
    },
}

/// A compiled init instruction
#[derive(Debug, Clone)]
pub struct InitInstruction {
    name: String,
    target: Vec<String>,
    source_text: String,
    source: Expression,
}

impl InitInstruction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names of the `status` target
    pub fn target(&self) -> &[String] {
        &self.target
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn expression(&self) -> &Expression {
        &self.source
    }
}

/// A compiled output variable
#[derive(Debug, Clone)]
pub struct OutputVariable {
    name: String,
    description: String,
    source_text: String,
    source: Expression,

    /// Plain `status` field names when direct lookup is possible
    direct: Option<Vec<String>>,
}

impl OutputVariable {
    pub fn compile(
        name: impl Into<String>,
        source: &str,
        description: impl Into<String>,
    ) -> Result<Self, ExpressionError> {
        let expression = Expression::parse(source)?;
        let direct = expression.as_path().and_then(direct_fields);
        Ok(Self {
            name: name.into(),
            description: description.into(),
            source_text: source.to_string(),
            source: expression,
            direct,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn expression(&self) -> &Expression {
        &self.source
    }

    pub fn direct_fields(&self) -> Option<&[String]> {
        self.direct.as_deref()
    }
}

fn direct_fields(path: &ContextPath) -> Option<Vec<String>> {
    if path.root() != PathRoot::Status {
        return None;
    }
    let names = path.field_names()?;
    let first = names.first()?;
    if RESERVED_FIELDS.contains(first) {
        return None;
    }
    Some(names.into_iter().map(str::to_string).collect())
}

/// A named, ordered list of steps plus its declared outputs
#[derive(Clone)]
pub struct RunMode {
    name: String,
    enabled: bool,
    steps: Vec<Arc<dyn Step>>,
    outputs: Vec<OutputVariable>,
}

impl RunMode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document's `run` flag
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    pub fn outputs(&self) -> &[OutputVariable] {
        &self.outputs
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name()).collect()
    }
}

impl fmt::Debug for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunMode")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("outputs", &self.output_names())
            .finish()
    }
}

/// Validated, immutable workflow
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    name: Option<String>,
    options: WorkflowOptions,
    driving_variables: Vec<DrivingVariable>,
    init: Vec<InitInstruction>,
    run_modes: IndexMap<String, RunMode>,
    step_types: IndexMap<String, Arc<dyn Step>>,
}

impl WorkflowDefinition {
    /// Compile a document against a registry
    pub fn build(
        document: WorkflowDocument,
        registry: &StepRegistry,
    ) -> Result<Self, DefinitionError> {
        let mut seen = std::collections::HashSet::new();
        for var in &document.driving_variables {
            if !seen.insert(var.name.as_str()) {
                return Err(DefinitionError::DuplicateDrivingVariable(var.name.clone()));
            }
        }

        let init = document
            .init
            .iter()
            .map(|decl| {
                let target = path::parse_field_path(&decl.name).map_err(|e| {
                    DefinitionError::InvalidInitTarget {
                        name: decl.name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if RESERVED_FIELDS.contains(&target[0].as_str()) {
                    return Err(DefinitionError::InvalidInitTarget {
                        name: decl.name.clone(),
                        reason: format!("'{}' is a reserved run field", target[0]),
                    });
                }
                let source = Expression::parse(&decl.source).map_err(|error| {
                    DefinitionError::InvalidInitSource {
                        name: decl.name.clone(),
                        error,
                    }
                })?;
                Ok(InitInstruction {
                    name: decl.name.clone(),
                    target,
                    source_text: decl.source.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut step_types: IndexMap<String, Arc<dyn Step>> = IndexMap::new();
        let mut run_modes = IndexMap::new();

        for (mode_name, decl) in &document.run_modes {
            let mut steps = Vec::with_capacity(decl.steps.len());
            for step_name in &decl.steps {
                let step = match step_types.get(step_name) {
                    Some(step) => Arc::clone(step),
                    None => {
                        let step = registry.create(step_name).ok_or_else(|| {
                            DefinitionError::UnknownStepType {
                                run_mode: mode_name.clone(),
                                step: step_name.clone(),
                            }
                        })?;
                        step_types.insert(step_name.clone(), Arc::clone(&step));
                        step
                    }
                };
                steps.push(step);
            }

            check_step_order(mode_name, &steps)?;

            let mut outputs: Vec<OutputVariable> = Vec::with_capacity(decl.outputs.len());
            for out in &decl.outputs {
                if out.name == DAY_COLUMN || out.name == DOY_COLUMN {
                    return Err(DefinitionError::ReservedOutputName {
                        run_mode: mode_name.clone(),
                        name: out.name.clone(),
                    });
                }
                if outputs.iter().any(|o| o.name() == out.name) {
                    return Err(DefinitionError::DuplicateOutput {
                        run_mode: mode_name.clone(),
                        name: out.name.clone(),
                    });
                }
                let output = OutputVariable::compile(&out.name, &out.source, &out.description)
                    .map_err(|error| DefinitionError::InvalidOutput {
                        run_mode: mode_name.clone(),
                        name: out.name.clone(),
                        error,
                    })?;
                outputs.push(output);
            }

            run_modes.insert(
                mode_name.clone(),
                RunMode {
                    name: mode_name.clone(),
                    enabled: decl.run,
                    steps,
                    outputs,
                },
            );
        }

        Ok(Self {
            name: document.name,
            options: document.options,
            driving_variables: document.driving_variables,
            init,
            run_modes,
            step_types,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    pub fn driving_variables(&self) -> &[DrivingVariable] {
        &self.driving_variables
    }

    pub fn init_instructions(&self) -> &[InitInstruction] {
        &self.init
    }

    pub fn run_mode(&self, name: &str) -> Result<&RunMode, DefinitionError> {
        self.run_modes
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownRunMode(name.to_string()))
    }

    pub fn run_modes(&self) -> impl Iterator<Item = &RunMode> {
        self.run_modes.values()
    }

    /// All run mode names in document order
    pub fn run_mode_names(&self) -> Vec<&str> {
        self.run_modes.keys().map(String::as_str).collect()
    }

    /// Names of run modes whose `run` flag is set
    pub fn enabled_run_mode_names(&self) -> Vec<&str> {
        self.run_modes
            .values()
            .filter(|m| m.enabled())
            .map(|m| m.name())
            .collect()
    }

    /// Parameter schema of every step type, keyed by step identifier
    pub fn parameters_list(&self) -> IndexMap<String, ParameterSchema> {
        self.step_types
            .iter()
            .map(|(name, step)| (name.clone(), step.parameter_schema()))
            .collect()
    }

    /// Distinct step instances in first-use order
    pub fn step_types(&self) -> impl Iterator<Item = &Arc<dyn Step>> {
        self.step_types.values()
    }
}

/// Every input whose context path is produced by a step of the same run
/// mode must have at least one producer listed before (or at) the consumer.
fn check_step_order(run_mode: &str, steps: &[Arc<dyn Step>]) -> Result<(), DefinitionError> {
    let mut producers: HashMap<String, usize> = HashMap::new();

    for (index, step) in steps.iter().enumerate() {
        for (variable, spec) in step.output_schema() {
            let path = normalize(step.name(), &variable, &spec.context_path)?;
            producers.entry(path).or_insert(index);
        }
    }

    for (index, step) in steps.iter().enumerate() {
        for (variable, spec) in step.input_schema() {
            let path = normalize(step.name(), &variable, &spec.context_path)?;
            if let Some(&producer) = producers.get(&path) {
                if producer > index {
                    return Err(DefinitionError::StepOrder {
                        run_mode: run_mode.to_string(),
                        consumer: step.name().to_string(),
                        producer: steps[producer].name().to_string(),
                        path,
                    });
                }
            }
        }
    }

    Ok(())
}

fn normalize(step: &str, variable: &str, context_path: &str) -> Result<String, DefinitionError> {
    ContextPath::parse(context_path)
        .map(|p| p.to_string())
        .map_err(|error| DefinitionError::InvalidSchemaPath {
            step: step.to_string(),
            variable: variable.to_string(),
            error,
        })
}
