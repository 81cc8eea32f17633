//! Reference steps
//!
//! Small, dependency-free components used by examples, tests and the CLI.
//! They follow the full step contract; their formulas are deliberately
//! simple and carry no agronomic guarantee.

use serde_json::Value;

use super::schema::{ParameterSchema, ParameterSpec, ValueType, VariableSchema, VariableSpec};
use super::{FailurePolicy, Step, StepError};
use crate::workflow::context::ExecutionContext;
use crate::workflow::path::ContextPath;

/// Daily thermal time above a base temperature, accumulated into a
/// temperature sum.
///
/// - rate: `DTT = max(0, (TMIN + TMAX) / 2 - TBASE)`
/// - state: `TSUM += DTT` on integrate
#[derive(Debug, Clone, Copy, Default)]
pub struct ThermalTime;

const TT_TBASE: [&str; 3] = ["thermaltime", "params", "TBASE"];
const TT_TSUM_INIT: [&str; 3] = ["thermaltime", "params", "TSUM_INIT"];
const TT_TSUM: [&str; 3] = ["thermaltime", "states", "TSUM"];
const TT_DTT: [&str; 3] = ["thermaltime", "rates", "DTT"];
const WEATHER_TMIN: [&str; 2] = ["weather", "TMIN"];
const WEATHER_TMAX: [&str; 2] = ["weather", "TMAX"];

impl ThermalTime {
    pub const NAME: &'static str = "crop.ThermalTime";
    const NS: &'static str = "thermaltime";
}

impl Step for ThermalTime {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn namespace(&self) -> &str {
        Self::NS
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::from([
            (
                "TBASE".to_string(),
                ParameterSpec::new("Base temperature for development", ValueType::Float)
                    .unit("C")
                    .with_default(0.0),
            ),
            (
                "TSUM_INIT".to_string(),
                ParameterSpec::new("Temperature sum at the start day", ValueType::Float)
                    .unit("C d")
                    .with_default(0.0),
            ),
        ])
    }

    fn input_schema(&self) -> VariableSchema {
        VariableSchema::from([
            (
                "TMIN".to_string(),
                VariableSpec::new("Daily minimum temperature", ValueType::Float, "status.weather.TMIN")
                    .unit("C"),
            ),
            (
                "TMAX".to_string(),
                VariableSpec::new("Daily maximum temperature", ValueType::Float, "status.weather.TMAX")
                    .unit("C"),
            ),
        ])
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema::from([
            (
                "DTT".to_string(),
                VariableSpec::new(
                    "Daily thermal time",
                    ValueType::Float,
                    "status.thermaltime.rates.DTT",
                )
                .unit("C"),
            ),
            (
                "TSUM".to_string(),
                VariableSpec::new(
                    "Temperature sum",
                    ValueType::Float,
                    "status.thermaltime.states.TSUM",
                )
                .unit("C d"),
            ),
        ])
    }

    fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let tsum = ctx.lookup_f64(&TT_TSUM_INIT).unwrap_or(0.0);
        ctx.set_fields(&TT_TSUM, tsum.into())?;
        ctx.set_fields(&TT_DTT, Value::from(0.0))?;
        Ok(())
    }

    fn integrate(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let tsum = ctx.lookup_f64(&TT_TSUM).unwrap_or(0.0);
        let dtt = ctx.lookup_f64(&TT_DTT).unwrap_or(0.0);
        ctx.set_fields(&TT_TSUM, (tsum + dtt).into())?;
        Ok(())
    }

    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let day = ctx.day();
        let weather = |ctx: &ExecutionContext, fields: &[&str; 2]| {
            ctx.lookup_f64(fields).ok_or_else(|| StepError::MissingInput {
                name: fields[1].to_string(),
                day,
            })
        };

        let tmin = weather(ctx, &WEATHER_TMIN)?;
        let tmax = weather(ctx, &WEATHER_TMAX)?;
        let tbase = ctx.lookup_f64(&TT_TBASE).unwrap_or(0.0);

        let dtt = ((tmin + tmax) / 2.0 - tbase).max(0.0);
        ctx.set_fields(&TT_DTT, dtt.into())?;
        Ok(())
    }
}

/// Integrates any numeric context value into a running total.
///
/// The value to follow is given by the mandatory `source` parameter, a
/// rooted path such as `status.thermaltime.rates.DTT`. When the source is
/// unavailable on a day the step fails softly and the total is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningTotal;

const RT_SOURCE: [&str; 3] = ["runningtotal", "params", "source"];
const RT_TOTAL: [&str; 3] = ["runningtotal", "states", "TOTAL"];
const RT_INCREMENT: [&str; 3] = ["runningtotal", "rates", "INCREMENT"];

impl RunningTotal {
    pub const NAME: &'static str = "util.RunningTotal";
    const NS: &'static str = "runningtotal";

    fn source(ctx: &ExecutionContext) -> Result<ContextPath, StepError> {
        let text = ctx
            .lookup(&RT_SOURCE)
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::MissingParameter("runningtotal.source".to_string()))?;

        ContextPath::parse(text).map_err(|e| StepError::InvalidParameter {
            name: "source".to_string(),
            reason: e.to_string(),
        })
    }
}

impl Step for RunningTotal {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn namespace(&self) -> &str {
        Self::NS
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::from([(
            "source".to_string(),
            ParameterSpec::new("Rooted path of the value to accumulate", ValueType::Text)
                .mandatory(),
        )])
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema::from([
            (
                "INCREMENT".to_string(),
                VariableSpec::new(
                    "Value captured today",
                    ValueType::Float,
                    "status.runningtotal.rates.INCREMENT",
                ),
            ),
            (
                "TOTAL".to_string(),
                VariableSpec::new(
                    "Accumulated total",
                    ValueType::Float,
                    "status.runningtotal.states.TOTAL",
                ),
            ),
        ])
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Soft
    }

    fn initialize(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        Self::source(ctx)?;
        ctx.set_fields(&RT_TOTAL, Value::from(0.0))?;
        ctx.set_fields(&RT_INCREMENT, Value::from(0.0))?;
        Ok(())
    }

    fn integrate(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let total = ctx.lookup_f64(&RT_TOTAL).unwrap_or(0.0);
        let increment = ctx.lookup_f64(&RT_INCREMENT).unwrap_or(0.0);
        ctx.set_fields(&RT_TOTAL, (total + increment).into())?;
        Ok(())
    }

    fn run_step(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let source = Self::source(ctx)?;

        // Reset first so a missing source never re-counts yesterday's value
        ctx.set_fields(&RT_INCREMENT, Value::from(0.0))?;

        let value = ctx
            .resolve(&source)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| StepError::MissingInput {
                name: source.to_string(),
                day: ctx.day(),
            })?;

        ctx.set_fields(&RT_INCREMENT, value.into())?;
        Ok(())
    }
}
