mod common;

use std::sync::Arc;

use common::*;
use cropsim::prelude::*;
use cropsim::step::ValueType;
use cropsim::DefinitionError;

fn build(yaml: &str, registry: &StepRegistry) -> Result<WorkflowDefinition, DefinitionError> {
    let document = WorkflowLoader::from_str(yaml).unwrap();
    WorkflowDefinition::build(document, registry)
}

#[test]
fn test_producer_must_precede_consumer() {
    let log = new_log();
    let registry = test_registry(&log);

    assert!(build(&workflow_with_steps(&["test.A", "test.B"]), &registry).is_ok());

    let err = build(&workflow_with_steps(&["test.B", "test.A"]), &registry).unwrap_err();
    match err {
        DefinitionError::StepOrder {
            consumer,
            producer,
            path,
            ..
        } => {
            assert_eq!(consumer, "test.B");
            assert_eq!(producer, "test.A");
            assert_eq!(path, "status.states.X");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_consumer_without_producer_is_allowed() {
    // X may come from an init instruction instead of a step
    let log = new_log();
    assert!(build(&workflow_with_steps(&["test.B"]), &test_registry(&log)).is_ok());
}

#[test]
fn test_unknown_step_is_configuration_error() {
    let err = build(
        &workflow_with_steps(&["crop.Phenology"]),
        &StepRegistry::with_builtins(),
    )
    .unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownStepType { .. }));

    let engine_err = SimulationEngine::from_yaml(
        &workflow_with_steps(&["crop.Phenology"]),
        &StepRegistry::with_builtins(),
    )
    .unwrap_err();
    assert!(engine_err.is_configuration());
}

#[test]
fn test_unknown_run_mode() {
    let engine =
        SimulationEngine::from_yaml(thermal_workflow(), &StepRegistry::with_builtins()).unwrap();
    let inputs: SimulationInputs = serde_yaml::from_str(&thermal_inputs_yaml(1.0)).unwrap();
    let mut ctx = engine.initialize(inputs).unwrap();

    let err = engine.execute_step(&mut ctx, "irrigated").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Definition(DefinitionError::UnknownRunMode(name)) if name == "irrigated"
    ));
    // nothing happened to the context
    assert_eq!(ctx.day(), ctx.first_day());
}

#[test]
fn test_run_mode_enumeration() {
    let definition = build(thermal_workflow(), &StepRegistry::with_builtins()).unwrap();

    assert_eq!(definition.name(), Some("thermal"));
    assert_eq!(definition.run_mode_names(), vec!["potential", "disabled"]);
    assert_eq!(definition.enabled_run_mode_names(), vec!["potential"]);
    assert_eq!(
        definition.run_mode("potential").unwrap().output_names(),
        vec!["TSUM", "DTT_TOTAL", "LAT"]
    );

    let driving = definition.driving_variables();
    assert_eq!(driving.len(), 1);
    assert_eq!(driving[0].name, "latitude");
    assert_eq!(driving[0].value_type, ValueType::Float);
    assert_eq!(driving[0].unit, "deg");
}

#[test]
fn test_steps_instantiated_once_per_definition() {
    let definition = build(thermal_workflow(), &StepRegistry::with_builtins()).unwrap();

    let potential = definition.run_mode("potential").unwrap();
    let disabled = definition.run_mode("disabled").unwrap();
    assert!(Arc::ptr_eq(&potential.steps()[0], &disabled.steps()[0]));
    assert_eq!(definition.step_types().count(), 2);
}

#[test]
fn test_parameters_list_per_step_type() {
    let engine =
        SimulationEngine::from_yaml(thermal_workflow(), &StepRegistry::with_builtins()).unwrap();
    let params = engine.parameters_list();

    assert_eq!(
        params.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["crop.ThermalTime", "util.RunningTotal"]
    );
    let tbase = &params["crop.ThermalTime"]["TBASE"];
    assert_eq!(tbase.value_type, ValueType::Float);
    assert!(!tbase.mandatory);
    assert!(params["util.RunningTotal"]["source"].mandatory);

    let json = serde_json::to_value(&params).unwrap();
    assert_eq!(json["crop.ThermalTime"]["TBASE"]["type"], "float");
}

#[test]
fn test_duplicate_driving_variable() {
    let yaml = r#"
driving_variables:
  - name: co2
  - name: co2
run_modes: {}
"#;
    assert!(matches!(
        build(yaml, &StepRegistry::new()),
        Err(DefinitionError::DuplicateDrivingVariable(name)) if name == "co2"
    ));
}

#[test]
fn test_malformed_output_path() {
    let yaml = r#"
run_modes:
  main:
    steps: []
    outputs:
      - name: BAD
        source: status.crop..LAI
"#;
    assert!(matches!(
        build(yaml, &StepRegistry::new()),
        Err(DefinitionError::InvalidOutput { .. })
    ));

    let yaml = r#"
run_modes:
  main:
    steps: []
    outputs:
      - name: BAD
        source: status.crop.sqrt()
"#;
    assert!(matches!(
        build(yaml, &StepRegistry::new()),
        Err(DefinitionError::InvalidOutput { .. })
    ));
}

#[test]
fn test_init_source_unavailable() {
    let yaml = r#"
init:
  - name: site.co2
    source: driving.co2
run_modes: {}
"#;
    let engine = SimulationEngine::from_yaml(yaml, &StepRegistry::new()).unwrap();
    let day = date(2024, 1, 1);
    let err = engine
        .initialize(SimulationInputs::new(day, day, day))
        .unwrap_err();
    assert!(matches!(err, EngineError::InitInstruction { name, .. } if name == "site.co2"));
}

#[test]
fn test_init_instructions_run_in_order() {
    let yaml = r#"
init:
  - name: site.co2
    source: driving.co2
  - name: site.co2_copy
    source: status.site.co2
  - name: site.label
    source: "'reference'"
run_modes: {}
"#;
    let engine = SimulationEngine::from_yaml(yaml, &StepRegistry::new()).unwrap();
    let day = date(2024, 1, 1);
    let ctx = engine
        .initialize(SimulationInputs::new(day, day, day).with_driving("co2", 420))
        .unwrap();

    assert_eq!(ctx.get_f64("site.co2_copy"), Some(420.0));
    assert_eq!(ctx.get("site.label").and_then(|v| v.as_str()), Some("reference"));
}
