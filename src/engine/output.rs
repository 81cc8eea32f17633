//! Output extraction
//!
//! Declared output variables are resolved against the live context in two
//! places: every in-bounds day (daily details, when enabled) and once at the
//! end of a run (summary). Both go through [`OutputExtractor::resolve`], so a
//! value read on the last day and the summary always agree.
//!
//! Misses are never errors. A path that stops on an absent or null field
//! yields `None`; the summary reports it as `0.0`.

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::workflow::context::ExecutionContext;
use crate::workflow::definition::{OutputVariable, RunMode};

/// Calendar day column of the daily details
pub const DAY_COLUMN: &str = "DAY";

/// Day-of-year column of the daily details
pub const DOY_COLUMN: &str = "DOY";

/// Per-day time series of the declared outputs of one run mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyDetails {
    days: Vec<NaiveDate>,
    doy: Vec<u32>,
    columns: IndexMap<String, Vec<Option<f64>>>,
}

impl DailyDetails {
    /// Empty accumulator with one column per output name
    pub fn new<S: AsRef<str>>(outputs: &[S]) -> Self {
        Self {
            days: Vec::new(),
            doy: Vec::new(),
            columns: outputs
                .iter()
                .map(|name| (name.as_ref().to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Append one row. `values` follow the column order given to `new`;
    /// missing trailing values are recorded as `None`.
    pub fn push(&mut self, day: NaiveDate, values: Vec<Option<f64>>) {
        self.days.push(day);
        self.doy.push(day.ordinal());

        let mut values = values.into_iter();
        for column in self.columns.values_mut() {
            column.push(values.next().flatten());
        }
    }

    /// Number of recorded days
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn day_of_year(&self) -> &[u32] {
        &self.doy
    }

    /// Output column by name
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// `DAY`, `DOY`, then the outputs in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        [DAY_COLUMN, DOY_COLUMN]
            .into_iter()
            .chain(self.columns.keys().map(String::as_str))
            .collect()
    }

    /// Row-oriented view, one JSON object per day
    pub fn rows(&self) -> Vec<serde_json::Map<String, Value>> {
        (0..self.len())
            .map(|i| {
                let mut row = serde_json::Map::new();
                row.insert(DAY_COLUMN.into(), Value::String(self.days[i].to_string()));
                row.insert(DOY_COLUMN.into(), Value::from(self.doy[i]));
                for (name, column) in &self.columns {
                    let cell = column[i].map(Value::from).unwrap_or(Value::Null);
                    row.insert(name.clone(), cell);
                }
                row
            })
            .collect()
    }
}

/// Convert a resolved value to a number. Booleans count as 1/0; anything
/// else non-numeric is unavailable.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Resolves output variables against an execution context
pub struct OutputExtractor;

impl OutputExtractor {
    /// Resolve one output. Plain `status` field paths are read directly;
    /// everything else goes through expression evaluation.
    pub fn resolve(ctx: &ExecutionContext, output: &OutputVariable) -> Option<Value> {
        let value = match output.direct_fields() {
            Some(fields) => ctx.lookup(fields).cloned(),
            None => output.expression().evaluate(ctx),
        };
        if value.is_none() {
            debug!(
                output = %output.name(),
                source = %output.source_text(),
                day = %ctx.day(),
                "Output unavailable"
            );
        }
        value
    }

    pub fn resolve_number(ctx: &ExecutionContext, output: &OutputVariable) -> Option<f64> {
        Self::resolve(ctx, output).as_ref().and_then(to_number)
    }

    /// Resolve every output of `mode` in declaration order
    pub fn resolve_all(ctx: &ExecutionContext, mode: &RunMode) -> Vec<Option<f64>> {
        mode.outputs()
            .iter()
            .map(|output| Self::resolve_number(ctx, output))
            .collect()
    }

    /// Append today's row to the context's daily details, if collecting
    pub fn capture_day(ctx: &mut ExecutionContext, mode: &RunMode) {
        if !ctx.collects_daily_details() {
            return;
        }
        let day = ctx.day();
        let values = Self::resolve_all(ctx, mode);
        if ctx.daily_details().is_none() {
            ctx.start_daily_details(DailyDetails::new(&mode.output_names()));
        }
        if let Some(details) = ctx.daily_details_mut() {
            details.push(day, values);
        }
    }

    /// End-of-run values; unavailable outputs are `0.0`
    pub fn summary(ctx: &ExecutionContext, mode: &RunMode) -> Vec<f64> {
        Self::resolve_all(ctx, mode)
            .into_iter()
            .map(|value| value.unwrap_or_default())
            .collect()
    }

    /// Summary keyed by output name
    pub fn named_summary(ctx: &ExecutionContext, mode: &RunMode) -> IndexMap<String, f64> {
        mode.output_names()
            .into_iter()
            .map(str::to_string)
            .zip(Self::summary(ctx, mode))
            .collect()
    }
}
