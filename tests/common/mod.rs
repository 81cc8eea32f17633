use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use cropsim::step::{FailurePolicy, LifecyclePhase, ValueType, VariableSchema, VariableSpec};
use cropsim::{ExecutionContext, Step, StepError, StepRegistry, WeatherSeries};
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write file");
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Constant daily weather from `first` through `last`
pub fn flat_weather(first: NaiveDate, last: NaiveDate, tmin: f64, tmax: f64) -> WeatherSeries {
    let mut series = WeatherSeries::new();
    let mut day = first;
    while day <= last {
        series.insert(
            day,
            BTreeMap::from([("TMIN".to_string(), tmin), ("TMAX".to_string(), tmax)]),
        );
        day = day.succ_opt().expect("date in range");
    }
    series
}

// ============================================================================
// Recording steps
// ============================================================================

/// (step, phase, day) for every lifecycle call
pub type CallLog = Arc<Mutex<Vec<(String, LifecyclePhase, NaiveDate)>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<(String, LifecyclePhase, NaiveDate)> {
    log.lock().unwrap().clone()
}

pub fn count(log: &CallLog, step: &str, phase: LifecyclePhase) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(s, p, _)| s == step && *p == phase)
        .count()
}

fn record(log: &CallLog, step: &str, phase: LifecyclePhase, ctx: &ExecutionContext) {
    log.lock().unwrap().push((step.to_string(), phase, ctx.day()));
}

/// Writes a constant into `states.X` on every run_step
pub struct WriterStep {
    pub log: CallLog,
}

impl Step for WriterStep {
    fn name(&self) -> &str {
        "test.A"
    }

    fn namespace(&self) -> &str {
        "states"
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema::from([(
            "X".to_string(),
            VariableSpec::new("Constant", ValueType::Float, "status.states.X"),
        )])
    }

    fn set_parameters(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::SetParameters, ctx);
        Ok(())
    }

    fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::Initialize, ctx);
        Ok(())
    }

    fn integrate(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::Integrate, ctx);
        Ok(())
    }

    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::RunStep, ctx);
        ctx.set("states.X", 1.0)?;
        Ok(())
    }
}

/// Reads `states.X` and writes `states.Y = X + 1` on every run_step
pub struct ReaderStep {
    pub log: CallLog,
}

impl Step for ReaderStep {
    fn name(&self) -> &str {
        "test.B"
    }

    fn namespace(&self) -> &str {
        "states"
    }

    fn input_schema(&self) -> VariableSchema {
        VariableSchema::from([(
            "X".to_string(),
            VariableSpec::new("Upstream value", ValueType::Float, "status.states.X"),
        )])
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema::from([(
            "Y".to_string(),
            VariableSpec::new("X plus one", ValueType::Float, "status.states.Y"),
        )])
    }

    fn set_parameters(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::SetParameters, ctx);
        Ok(())
    }

    fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::Initialize, ctx);
        Ok(())
    }

    fn integrate(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::Integrate, ctx);
        Ok(())
    }

    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        record(&self.log, self.name(), LifecyclePhase::RunStep, ctx);
        let x = ctx
            .get_f64("states.X")
            .ok_or_else(|| StepError::MissingInput {
                name: "X".to_string(),
                day: ctx.day(),
            })?;
        ctx.set("states.Y", x + 1.0)?;
        Ok(())
    }
}

/// Fails in run_step with the given policy, after writing a marker
pub struct FailingStep {
    pub name: &'static str,
    pub policy: FailurePolicy,
}

impl Step for FailingStep {
    fn name(&self) -> &str {
        self.name
    }

    fn namespace(&self) -> &str {
        "failing"
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    fn initialize(&self, _ctx: &mut ExecutionContext) -> Result<(), StepError> {
        Ok(())
    }

    fn integrate(&self, _ctx: &mut ExecutionContext) -> Result<(), StepError> {
        Ok(())
    }

    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        ctx.set("failing.reached", true)?;
        Err(StepError::Computation("division by zero".to_string()))
    }
}

/// Builtins plus `test.A`, `test.B`, `test.Soft` and `test.Hard`
pub fn test_registry(log: &CallLog) -> StepRegistry {
    let mut registry = StepRegistry::with_builtins();

    let writer_log = Arc::clone(log);
    registry.register("test.A", move || WriterStep {
        log: Arc::clone(&writer_log),
    });
    let reader_log = Arc::clone(log);
    registry.register("test.B", move || ReaderStep {
        log: Arc::clone(&reader_log),
    });
    registry.register("test.Soft", || FailingStep {
        name: "test.Soft",
        policy: FailurePolicy::Soft,
    });
    registry.register("test.Hard", || FailingStep {
        name: "test.Hard",
        policy: FailurePolicy::Hard,
    });

    registry
}

// ============================================================================
// Workflow builders
// ============================================================================

pub fn two_step_workflow() -> &'static str {
    r#"
name: two-step
run_modes:
  main:
    steps: [test.A, test.B]
    outputs:
      - name: X
        source: status.states.X
      - name: Y
        source: status.states.Y
      - name: Z
        source: status.states.Z
"#
}

pub fn workflow_with_steps(steps: &[&str]) -> String {
    format!(
        r#"
run_modes:
  main:
    steps: [{}]
    outputs:
      - name: Y
        source: status.states.Y
"#,
        steps.join(", ")
    )
}

pub fn thermal_workflow() -> &'static str {
    r#"
name: thermal
options:
  daily_details: false
driving_variables:
  - name: latitude
    description: Site latitude
    unit: deg
    type: float
init:
  - name: site.latitude
    source: ${{ driving.latitude }}
run_modes:
  potential:
    steps: [crop.ThermalTime, util.RunningTotal]
    outputs:
      - name: TSUM
        source: status.thermaltime.states.TSUM
      - name: DTT_TOTAL
        source: status.runningtotal.states.TOTAL
      - name: LAT
        source: status.site.latitude
  disabled:
    run: false
    steps: [crop.ThermalTime]
    outputs:
      - name: TSUM
        source: status.thermaltime.states.TSUM
"#
}

/// Inputs file for `thermal_workflow`, four simulated days after one warm-up day
pub fn thermal_inputs_yaml(latitude: f64) -> String {
    format!(
        r#"
first_day: 2024-04-01
simulation_start_day: 2024-04-02
simulation_end_day: 2024-04-05
driving:
  latitude: {}
parameters:
  thermaltime:
    TBASE: 5.0
  runningtotal:
    source: status.thermaltime.rates.DTT
weather_columns:
  TMIN: tn
  TMAX: tx
weather:
  - {{ day: 2024-04-01, tn: 4.0, tx: 12.0 }}
  - {{ day: 2024-04-02, tn: 5.0, tx: 15.0 }}
  - {{ day: 2024-04-03, tn: 6.0, tx: 16.0 }}
  - {{ day: 2024-04-04, tn: 7.0, tx: 17.0 }}
  - {{ day: 2024-04-05, tn: 8.0, tx: 18.0 }}
"#,
        latitude
    )
}
