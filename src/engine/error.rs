//! Engine error types

use chrono::NaiveDate;

use crate::step::{LifecyclePhase, StepError, ValueType};
use crate::workflow::context::ContextError;
use crate::workflow::definition::DefinitionError;
use crate::workflow::loader::LoadError;

/// Errors that can occur while driving a simulation run
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Workflow error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Missing driving variable: {0}")]
    MissingDrivingVariable(String),

    #[error("Driving variable '{name}' must be {expected:?}, got {value}")]
    DrivingVariableType {
        name: String,
        expected: ValueType,
        value: serde_json::Value,
    },

    #[error("Init instruction '{name}' failed: {reason}")]
    InitInstruction { name: String, reason: String },

    #[error("Invalid time bounds: {0}")]
    InvalidTimeBounds(String),

    #[error("No weather record for {0}")]
    MissingWeather(NaiveDate),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Model not initialized on {day}: integrate requested before initialize")]
    NotInitialized { day: NaiveDate },

    #[error("Context was started with run mode '{expected}', not '{actual}'")]
    RunModeMismatch { expected: String, actual: String },

    #[error("Step '{step}' failed during {phase} on {day}: {error}")]
    StepFailed {
        step: String,
        phase: LifecyclePhase,
        day: NaiveDate,
        #[source]
        error: StepError,
    },

    #[error("Calendar overflow after {0}")]
    DateOverflow(NaiveDate),
}

impl EngineError {
    /// Configuration errors abort before any simulated day runs
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::Definition(_)
                | EngineError::Load(_)
                | EngineError::MissingDrivingVariable(_)
                | EngineError::DrivingVariableType { .. }
                | EngineError::InitInstruction { .. }
                | EngineError::InvalidTimeBounds(_)
                | EngineError::MissingWeather(_)
        )
    }

    /// Sequencing errors point at a caller bug
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            EngineError::NotInitialized { .. } | EngineError::RunModeMismatch { .. }
        )
    }
}
