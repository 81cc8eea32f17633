//! Workflow document types
//!
//! These mirror the declarative YAML source one-to-one. They are compiled
//! into a [`WorkflowDefinition`](super::definition::WorkflowDefinition)
//! before anything runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::step::ValueType;

/// A complete workflow document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow name (for logging)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub options: WorkflowOptions,

    /// Inputs every run must supply
    #[serde(default, alias = "DrivingVariables")]
    pub driving_variables: Vec<DrivingVariable>,

    /// Instructions that seed the context when a run is created
    #[serde(default, alias = "Init")]
    pub init: Vec<InitDecl>,

    /// Run modes in document order
    #[serde(alias = "RunModes")]
    pub run_modes: IndexMap<String, RunModeDecl>,
}

/// Workflow-wide defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Collect per-day output columns unless a run overrides it
    #[serde(default)]
    pub daily_details: bool,
}

/// A mandatory caller-supplied input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingVariable {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub unit: String,

    /// Any value is accepted when the type is omitted
    #[serde(rename = "type", default = "any_type")]
    pub value_type: ValueType,
}

/// `name` is a field path under `status`, `source` an expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitDecl {
    pub name: String,
    pub source: String,
}

/// One named run mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunModeDecl {
    /// Whether the mode is selected when no mode is named explicitly
    #[serde(default = "default_run")]
    pub run: bool,

    /// Step identifiers in execution order
    pub steps: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<OutputDecl>,
}

fn any_type() -> ValueType {
    ValueType::Any
}

fn default_run() -> bool {
    true
}

/// A declared output column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDecl {
    pub name: String,
    pub source: String,

    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_deserialize() {
        let yaml = r#"
name: wheat
options:
  daily_details: true
driving_variables:
  - name: latitude
    description: Site latitude
    unit: deg
    type: float
init:
  - name: site.latitude
    source: driving.latitude
run_modes:
  potential:
    steps: [crop.ThermalTime]
    outputs:
      - name: TSUM
        source: status.thermaltime.states.TSUM
  limited:
    run: false
    steps: [crop.ThermalTime, util.RunningTotal]
"#;

        let doc: WorkflowDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.name.as_deref(), Some("wheat"));
        assert!(doc.options.daily_details);
        assert_eq!(doc.driving_variables[0].value_type, ValueType::Float);
        assert_eq!(doc.init[0].source, "driving.latitude");

        let names: Vec<_> = doc.run_modes.keys().cloned().collect();
        assert_eq!(names, vec!["potential", "limited"]);
        assert!(doc.run_modes["potential"].run);
        assert!(!doc.run_modes["limited"].run);
        assert!(doc.run_modes["limited"].outputs.is_empty());
    }

    #[test]
    fn test_section_aliases() {
        let yaml = r#"
DrivingVariables:
  - name: co2
Init:
  - name: co2
    source: driving.co2
RunModes:
  main:
    steps: []
"#;

        let doc: WorkflowDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.driving_variables.len(), 1);
        assert_eq!(doc.driving_variables[0].value_type, ValueType::Any);
        assert_eq!(doc.init.len(), 1);
        assert!(doc.run_modes.contains_key("main"));
    }
}
