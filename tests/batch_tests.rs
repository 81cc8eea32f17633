mod common;

use std::sync::Arc;

use common::*;
use cropsim::prelude::*;
use cropsim::BatchRunError;

fn engine() -> SimulationEngine {
    SimulationEngine::from_yaml(thermal_workflow(), &StepRegistry::with_builtins()).unwrap()
}

fn inputs(latitude: f64) -> SimulationInputs {
    serde_yaml::from_str(&thermal_inputs_yaml(latitude)).unwrap()
}

#[tokio::test]
async fn test_batch_matches_sequential_runs() {
    let engine = Arc::new(engine());
    let expected = engine.run_to_end(inputs(45.0), "potential").unwrap();

    let requests = (0..8)
        .map(|i| RunRequest::new(format!("cell-{:02}", i), inputs(45.0 + i as f64)))
        .collect();

    let result = BatchRunner::from_shared(Arc::clone(&engine))
        .parallel(3)
        .run(requests)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.runs.len(), 8);
    for (i, (id, summary)) in result.completed().enumerate() {
        assert_eq!(id, format!("cell-{:02}", i));
        assert_eq!(summary.output("TSUM"), expected.output("TSUM"));
        assert_eq!(summary.output("LAT"), Some(45.0 + i as f64));
    }
}

#[tokio::test]
async fn test_batch_run_mode_per_request() {
    let requests = vec![
        RunRequest::new("default", inputs(1.0)),
        RunRequest::new("explicit", inputs(1.0)).with_run_mode("disabled"),
    ];

    let result = BatchRunner::new(engine()).run(requests).await.unwrap();
    assert!(result.success);

    let runs: Vec<_> = result.completed().collect();
    assert_eq!(runs[0].1.run_mode, "potential");
    assert_eq!(runs[1].1.run_mode, "disabled");
    assert_eq!(runs[1].1.outputs.len(), 1);
}

#[tokio::test]
async fn test_batch_unknown_run_mode_fails_run() {
    let requests = vec![RunRequest::new("bad", inputs(1.0))];

    let result = BatchRunner::new(engine())
        .run_mode("irrigated")
        .run(requests)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed().collect::<Vec<_>>(), vec!["bad"]);
}

#[tokio::test]
async fn test_batch_without_enabled_mode() {
    let yaml = thermal_workflow().replace("  potential:\n", "  potential:\n    run: false\n");
    let engine = SimulationEngine::from_yaml(&yaml, &StepRegistry::with_builtins()).unwrap();

    let err = BatchRunner::new(engine)
        .run(vec![RunRequest::new("a", inputs(1.0))])
        .await
        .unwrap_err();
    assert!(matches!(err, BatchRunError::NoRunMode));
}

#[tokio::test]
async fn test_batch_run_directory() {
    let dir = create_test_dir();
    write_file(dir.path(), "north.yaml", &thermal_inputs_yaml(60.0));
    write_file(dir.path(), "south.yaml", &thermal_inputs_yaml(-30.0));

    let result = BatchRunner::new(engine())
        .run_directory(dir.path())
        .await
        .unwrap();

    let lats: Vec<_> = result
        .completed()
        .map(|(id, s)| (id.to_string(), s.output("LAT")))
        .collect();
    assert_eq!(
        lats,
        vec![
            ("north".to_string(), Some(60.0)),
            ("south".to_string(), Some(-30.0))
        ]
    );
}
