//! Execution context ("status") for one simulation run
//!
//! The context is the single mutable record shared by every step of a run.
//! It carries the run's calendar bookkeeping as typed fields and a dynamic
//! tree of named values that steps extend under their own namespaces
//! (e.g. `thermaltime.states.TSUM`).
//!
//! A context is created by [`SimulationEngine::initialize`] and owned by the
//! caller driving that run. It is never shared between runs.
//!
//! [`SimulationEngine::initialize`]: crate::engine::SimulationEngine::initialize

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::path::{self, ContextPath, PathError, PathRoot, Segment};
use super::weather::WeatherSeries;
use crate::engine::output::DailyDetails;

/// Run fields exposed under `status` that steps may read but not write
pub const RESERVED_FIELDS: [&str; 6] = [
    "day",
    "first_day",
    "simulation_start_day",
    "simulation_end_day",
    "model_initialized",
    "run_id",
];

/// Errors raised when writing into the context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("Invalid field path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("'{0}' is a reserved run field and cannot be written")]
    ReservedField(String),

    #[error("Cannot write '{path}': '{segment}' is not an object")]
    NotAnObject { path: String, segment: String },
}

/// Lifecycle state of a run
///
/// A run has no state before `initialize`: the context only exists from
/// `Ready` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Context created, start day not reached
    Ready,
    /// Steps bootstrapped, inside the simulation period
    Running,
    /// Simulation end day processed
    Completed,
}

/// Calendar bounds of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub first_day: NaiveDate,
    pub simulation_start_day: NaiveDate,
    pub simulation_end_day: NaiveDate,
}

impl TimeBounds {
    pub fn new(
        first_day: NaiveDate,
        simulation_start_day: NaiveDate,
        simulation_end_day: NaiveDate,
    ) -> Self {
        Self {
            first_day,
            simulation_start_day,
            simulation_end_day,
        }
    }

    /// Check `first_day <= simulation_start_day <= simulation_end_day`
    pub fn validate(&self) -> Result<(), String> {
        if self.simulation_start_day < self.first_day {
            return Err(format!(
                "simulation start {} is before first day {}",
                self.simulation_start_day, self.first_day
            ));
        }
        if self.simulation_end_day < self.simulation_start_day {
            return Err(format!(
                "simulation end {} is before simulation start {}",
                self.simulation_end_day, self.simulation_start_day
            ));
        }
        Ok(())
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.simulation_start_day <= day && day <= self.simulation_end_day
    }

    fn to_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("first_day".into(), Value::String(self.first_day.to_string()));
        map.insert(
            "simulation_start_day".into(),
            Value::String(self.simulation_start_day.to_string()),
        );
        map.insert(
            "simulation_end_day".into(),
            Value::String(self.simulation_end_day.to_string()),
        );
        map
    }
}

/// Runtime record shared by all steps of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    run_id: String,
    day: NaiveDate,
    bounds: TimeBounds,
    model_initialized: bool,
    state: RunState,

    /// Run mode that bootstrapped the steps
    run_mode: Option<String>,

    /// Dynamic tree extended by steps
    status: Map<String, Value>,

    /// Caller-supplied driving variables
    driving: Map<String, Value>,

    /// Caller-supplied parameters
    parameters: Map<String, Value>,

    weather: WeatherSeries,

    /// Canonical weather name -> source column
    weather_columns: BTreeMap<String, String>,

    collect_daily_details: bool,
    daily_details: Option<DailyDetails>,
}

impl ExecutionContext {
    /// Create an empty context positioned on `bounds.first_day`
    pub fn new(bounds: TimeBounds) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            day: bounds.first_day,
            bounds,
            model_initialized: false,
            state: RunState::Ready,
            run_mode: None,
            status: Map::new(),
            driving: Map::new(),
            parameters: Map::new(),
            weather: WeatherSeries::default(),
            weather_columns: BTreeMap::new(),
            collect_daily_details: false,
            daily_details: None,
        }
    }

    pub fn with_driving(mut self, driving: Map<String, Value>) -> Self {
        self.driving = driving;
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_weather(
        mut self,
        weather: WeatherSeries,
        columns: BTreeMap<String, String>,
    ) -> Self {
        self.weather = weather;
        self.weather_columns = columns;
        self
    }

    pub fn with_daily_details(mut self, enabled: bool) -> Self {
        self.collect_daily_details = enabled;
        self
    }

    // ------------------------------------------------------------------
    // Run bookkeeping
    // ------------------------------------------------------------------

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Current simulated day
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn bounds(&self) -> TimeBounds {
        self.bounds
    }

    pub fn first_day(&self) -> NaiveDate {
        self.bounds.first_day
    }

    pub fn simulation_start_day(&self) -> NaiveDate {
        self.bounds.simulation_start_day
    }

    pub fn simulation_end_day(&self) -> NaiveDate {
        self.bounds.simulation_end_day
    }

    pub fn model_initialized(&self) -> bool {
        self.model_initialized
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_mode(&self) -> Option<&str> {
        self.run_mode.as_deref()
    }

    pub fn is_start_day(&self) -> bool {
        self.day == self.bounds.simulation_start_day
    }

    pub fn is_in_bounds(&self) -> bool {
        self.bounds.contains(self.day)
    }

    pub(crate) fn mark_initialized(&mut self, run_mode: &str) {
        self.model_initialized = true;
        self.run_mode = Some(run_mode.to_string());
        self.state = RunState::Running;
    }

    pub(crate) fn mark_completed(&mut self) {
        self.state = RunState::Completed;
    }

    /// Move to the next calendar day. `None` on calendar overflow.
    pub(crate) fn advance_day(&mut self) -> Option<NaiveDate> {
        self.day = self.day.succ_opt()?;
        Some(self.day)
    }

    // ------------------------------------------------------------------
    // Caller inputs
    // ------------------------------------------------------------------

    pub fn driving(&self) -> &Map<String, Value> {
        &self.driving
    }

    pub fn driving_variable(&self, name: &str) -> Option<&Value> {
        self.driving.get(name).filter(|v| !v.is_null())
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Look up a caller parameter, preferring `parameters.<namespace>.<name>`
    /// over the flat `parameters.<name>`
    pub fn parameter(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.parameters
            .get(namespace)
            .and_then(|scoped| scoped.as_object())
            .and_then(|scoped| scoped.get(name))
            .or_else(|| self.parameters.get(name))
            .filter(|v| !v.is_null())
    }

    pub fn weather(&self) -> &WeatherSeries {
        &self.weather
    }

    /// Today's weather record renamed through the run's column map
    pub fn current_weather(&self) -> Option<Map<String, Value>> {
        self.weather.mapped(self.day, &self.weather_columns)
    }

    // ------------------------------------------------------------------
    // Dynamic status tree
    // ------------------------------------------------------------------

    pub fn status(&self) -> &Map<String, Value> {
        &self.status
    }

    /// Read a dotted field path under `status`. Null reads as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let fields = path::parse_field_path(path).ok()?;
        self.lookup(&fields)
    }

    /// Read a numeric field
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    /// Borrowing lookup over pre-split field names
    pub fn lookup<S: AsRef<str>>(&self, fields: &[S]) -> Option<&Value> {
        let (first, rest) = fields.split_first()?;
        let mut current = self.status.get(first.as_ref())?;
        for name in rest {
            current = current.as_object()?.get(name.as_ref())?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Numeric `lookup`, for per-day reads that skip path parsing
    pub fn lookup_f64<S: AsRef<str>>(&self, fields: &[S]) -> Option<f64> {
        self.lookup(fields).and_then(Value::as_f64)
    }

    /// Write a value at a dotted field path under `status`, creating
    /// intermediate objects as needed. Null intermediates are replaced.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ContextError> {
        let fields = path::parse_field_path(path)?;
        self.set_fields(&fields, value.into())
    }

    pub fn set_fields<S: AsRef<str>>(
        &mut self,
        fields: &[S],
        value: Value,
    ) -> Result<(), ContextError> {
        let Some((last, parents)) = fields.split_last() else {
            return Err(ContextError::InvalidPath(PathError::Empty));
        };

        let head = fields[0].as_ref();
        if RESERVED_FIELDS.contains(&head) {
            return Err(ContextError::ReservedField(head.to_string()));
        }

        let mut node = &mut self.status;
        for name in parents {
            let name = name.as_ref();
            let entry = node
                .entry(name.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if entry.is_null() {
                *entry = Value::Object(Map::new());
            }
            node = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(ContextError::NotAnObject {
                        path: join(fields),
                        segment: name.to_string(),
                    })
                }
            };
        }

        node.insert(last.as_ref().to_string(), value);
        Ok(())
    }

    /// Remove a value, returning it
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let fields = path::parse_field_path(path).ok()?;
        let (last, parents) = fields.split_last()?;
        let mut node = &mut self.status;
        for name in parents {
            node = node.get_mut(name)?.as_object_mut()?;
        }
        node.remove(last)
    }

    /// Mutable access to a top-level namespace, created on first use
    pub fn namespace_mut(&mut self, name: &str) -> Result<&mut Map<String, Value>, ContextError> {
        if RESERVED_FIELDS.contains(&name) {
            return Err(ContextError::ReservedField(name.to_string()));
        }
        let entry = self
            .status
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => Ok(map),
            _ => Err(ContextError::NotAnObject {
                path: name.to_string(),
                segment: name.to_string(),
            }),
        }
    }

    /// Resolve a compiled path. Never fails: `None` means unavailable.
    pub fn resolve(&self, path: &ContextPath) -> Option<Value> {
        match path.root() {
            PathRoot::Status => self.resolve_status(path.segments()),
            PathRoot::Driving => walk_map(&self.driving, path.segments()),
            PathRoot::Parameters => walk_map(&self.parameters, path.segments()),
            PathRoot::Time => walk_map(&self.bounds.to_map(), path.segments()),
        }
    }

    fn resolve_status(&self, segments: &[Segment]) -> Option<Value> {
        if let Some((Segment::Field(name), rest)) = segments.split_first() {
            if let Some(value) = self.reserved_value(name) {
                return path::walk(&value, rest);
            }
        }
        walk_map(&self.status, segments)
    }

    fn reserved_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "day" => Value::String(self.day.to_string()),
            "first_day" => Value::String(self.bounds.first_day.to_string()),
            "simulation_start_day" => Value::String(self.bounds.simulation_start_day.to_string()),
            "simulation_end_day" => Value::String(self.bounds.simulation_end_day.to_string()),
            "model_initialized" => Value::Bool(self.model_initialized),
            "run_id" => Value::String(self.run_id.clone()),
            _ => return None,
        };
        Some(value)
    }

    // ------------------------------------------------------------------
    // Daily details
    // ------------------------------------------------------------------

    pub fn collects_daily_details(&self) -> bool {
        self.collect_daily_details
    }

    pub fn daily_details(&self) -> Option<&DailyDetails> {
        self.daily_details.as_ref()
    }

    pub fn take_daily_details(&mut self) -> Option<DailyDetails> {
        self.daily_details.take()
    }

    pub(crate) fn start_daily_details(&mut self, details: DailyDetails) {
        self.daily_details = Some(details);
    }

    pub(crate) fn daily_details_mut(&mut self) -> Option<&mut DailyDetails> {
        self.daily_details.as_mut()
    }
}

fn walk_map(map: &Map<String, Value>, segments: &[Segment]) -> Option<Value> {
    match segments.split_first() {
        None => Some(Value::Object(map.clone())),
        Some((Segment::Field(name), rest)) => path::walk(map.get(name)?, rest),
        Some((Segment::Call(accessor), rest)) => {
            let value = accessor.apply(&Value::Object(map.clone()))?;
            path::walk(&value, rest)
        }
        Some((Segment::Index(_), _)) => None,
    }
}

fn join<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}
