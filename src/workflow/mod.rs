//! Workflow types and definitions
//!
//! This module contains all types for describing a simulation workflow:
//! - `document` - serde types mirroring the YAML workflow document
//! - `definition` - the compiled, immutable `WorkflowDefinition`
//! - `path` - dotted-path parser and resolver
//! - `expressions` - literal/path expressions for `${{ }}` syntax
//! - `context` - ExecutionContext for per-run state
//! - `weather` - daily weather driving data
//! - `loader` - Load workflows and run inputs from files

pub mod context;
pub mod definition;
pub mod document;
pub mod expressions;
pub mod loader;
pub mod path;
pub mod weather;

pub use context::{ContextError, ExecutionContext, RunState, TimeBounds};
pub use definition::{
    DefinitionError, InitInstruction, OutputVariable, RunMode, WorkflowDefinition,
};
pub use document::{
    DrivingVariable, InitDecl, OutputDecl, RunModeDecl, WorkflowDocument, WorkflowOptions,
};
pub use expressions::{Expression, ExpressionError};
pub use loader::{LoadError, WorkflowLoader};
pub use path::{Accessor, ContextPath, PathError, PathRoot, Segment};
pub use weather::{WeatherRecord, WeatherSeries};
