mod common;

use common::*;
use cropsim::engine::{OutputExtractor, DAY_COLUMN, DOY_COLUMN};
use cropsim::prelude::*;
use serde_json::json;

fn thermal_engine() -> SimulationEngine {
    SimulationEngine::from_yaml(thermal_workflow(), &StepRegistry::with_builtins()).unwrap()
}

fn thermal_inputs() -> SimulationInputs {
    serde_yaml::from_str(&thermal_inputs_yaml(52.0)).unwrap()
}

#[test]
fn test_unset_output_defaults_to_zero() {
    let log = new_log();
    let engine = SimulationEngine::from_yaml(two_step_workflow(), &test_registry(&log)).unwrap();
    let mut ctx = engine
        .initialize(SimulationInputs::new(
            date(2024, 6, 1),
            date(2024, 6, 1),
            date(2024, 6, 3),
        ))
        .unwrap();

    for _ in 0..3 {
        engine.execute_step(&mut ctx, "main").unwrap();
    }

    assert_eq!(engine.finalize(&ctx, "main").unwrap(), vec![1.0, 2.0, 0.0]);
}

#[test]
fn test_finalize_before_any_step() {
    let engine = thermal_engine();
    let ctx = engine.initialize(thermal_inputs()).unwrap();

    // only the init instruction has run
    assert_eq!(engine.finalize(&ctx, "potential").unwrap(), vec![0.0, 0.0, 52.0]);
}

#[test]
fn test_finalize_does_not_mutate() {
    let engine = thermal_engine();
    let summary = engine.run_to_end(thermal_inputs(), "potential").unwrap();
    assert_eq!(summary.values(), vec![18.0, 18.0, 52.0]);

    let mut ctx = engine.initialize(thermal_inputs()).unwrap();
    while ctx.day() <= ctx.simulation_end_day() {
        engine.execute_step(&mut ctx, "potential").unwrap();
    }
    let before = serde_json::to_value(&ctx).unwrap();
    let first = engine.finalize(&ctx, "potential").unwrap();
    let second = engine.finalize(&ctx, "potential").unwrap();

    assert_eq!(first, second);
    assert_eq!(before, serde_json::to_value(&ctx).unwrap());
}

#[test]
fn test_daily_details_columns() {
    let engine = thermal_engine();
    let summary = engine
        .run_to_end(thermal_inputs().with_daily_details(true), "potential")
        .unwrap();

    let details = summary.daily_details.as_ref().expect("daily details collected");
    assert_eq!(
        details.column_names(),
        vec![DAY_COLUMN, DOY_COLUMN, "TSUM", "DTT_TOTAL", "LAT"]
    );

    // only in-bounds days are recorded
    assert_eq!(
        details.days(),
        &[
            date(2024, 4, 2),
            date(2024, 4, 3),
            date(2024, 4, 4),
            date(2024, 4, 5)
        ]
    );
    assert_eq!(details.day_of_year(), &[93, 94, 95, 96]);
    assert_eq!(
        details.column("TSUM").unwrap(),
        &[Some(0.0), Some(5.0), Some(11.0), Some(18.0)]
    );

    // the last row agrees with the summary
    assert_eq!(details.column("TSUM").unwrap()[3], summary.output("TSUM"));
}

#[test]
fn test_daily_details_disabled_by_default() {
    let engine = thermal_engine();
    let summary = engine.run_to_end(thermal_inputs(), "potential").unwrap();
    assert!(summary.daily_details.is_none());
}

#[test]
fn test_daily_details_workflow_option() {
    let yaml = thermal_workflow().replace("daily_details: false", "daily_details: true");
    let engine = SimulationEngine::from_yaml(&yaml, &StepRegistry::with_builtins()).unwrap();

    let summary = engine.run_to_end(thermal_inputs(), "potential").unwrap();
    assert_eq!(summary.daily_details.map(|d| d.len()), Some(4));

    let summary = engine
        .run_to_end(thermal_inputs().with_daily_details(false), "potential")
        .unwrap();
    assert!(summary.daily_details.is_none());
}

#[test]
fn test_path_forms() {
    let yaml = r#"
init:
  - name: soil.SM
    source: parameters.layers
run_modes:
  main:
    steps: []
    outputs:
      - name: SM0
        source: status.soil.SM[0]
      - name: SM_MEAN
        source: ${{ status.soil.SM.mean() }}
      - name: LAYERS
        source: status.soil.SM.len()
      - name: OUT_OF_RANGE
        source: status.soil.SM[9]
      - name: START_DOY
        source: time.simulation_start_day.doy()
      - name: FLAG
        source: status.model_initialized
      - name: CONSTANT
        source: "2.5"
"#;
    let engine = SimulationEngine::from_yaml(yaml, &StepRegistry::new()).unwrap();
    let inputs = SimulationInputs::new(date(2024, 2, 1), date(2024, 2, 1), date(2024, 2, 1))
        .with_parameter("layers", json!([0.1, 0.3, 0.2]));

    let summary = engine.run_to_end(inputs, "main").unwrap();
    assert_eq!(summary.output("SM0"), Some(0.1));
    assert!((summary.output("SM_MEAN").unwrap() - 0.2).abs() < 1e-12);
    assert_eq!(summary.output("LAYERS"), Some(3.0));
    assert_eq!(summary.output("OUT_OF_RANGE"), Some(0.0));
    assert_eq!(summary.output("START_DOY"), Some(32.0));
    assert_eq!(summary.output("FLAG"), Some(1.0));
    assert_eq!(summary.output("CONSTANT"), Some(2.5));
}

#[test]
fn test_none_intermediate_is_unavailable_not_error() {
    let engine = SimulationEngine::from_yaml(
        r#"
run_modes:
  main:
    steps: []
    outputs:
      - name: LAI
        source: status.crop.states.LAI
"#,
        &StepRegistry::new(),
    )
    .unwrap();

    let mut ctx = engine
        .initialize(SimulationInputs::new(
            date(2024, 1, 1),
            date(2024, 1, 1),
            date(2024, 1, 1),
        ))
        .unwrap();
    ctx.set("crop", serde_json::Value::Null).unwrap();

    let mode = engine.definition().run_mode("main").unwrap();
    let output = &mode.outputs()[0];
    assert_eq!(OutputExtractor::resolve(&ctx, output), None);
    assert_eq!(OutputExtractor::resolve(&ctx, output), None);
    assert_eq!(engine.finalize(&ctx, "main").unwrap(), vec![0.0]);
}
