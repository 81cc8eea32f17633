//! Per-run inputs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::workflow::context::TimeBounds;
use crate::workflow::weather::WeatherSeries;

/// Everything a caller supplies to start one simulation run
///
/// ```yaml
/// first_day: 2024-03-30
/// simulation_start_day: 2024-04-01
/// simulation_end_day: 2024-08-31
/// driving:
///   latitude: 52.0
/// parameters:
///   thermaltime:
///     TBASE: 0.0
/// weather_columns:
///   TMIN: tn
///   TMAX: tx
/// weather:
///   - day: 2024-04-01
///     tn: 4.5
///     tx: 13.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    #[serde(default)]
    pub weather: WeatherSeries,

    /// Canonical weather name -> column in `weather`
    #[serde(default)]
    pub weather_columns: BTreeMap<String, String>,

    #[serde(default)]
    pub driving: Map<String, Value>,

    /// Flat (`TBASE`) or per-namespace (`thermaltime.TBASE`) parameters
    #[serde(default)]
    pub parameters: Map<String, Value>,

    pub first_day: NaiveDate,
    pub simulation_start_day: NaiveDate,
    pub simulation_end_day: NaiveDate,

    /// Overrides the workflow's `options.daily_details`
    #[serde(default)]
    pub daily_details: Option<bool>,
}

impl SimulationInputs {
    pub fn new(
        first_day: NaiveDate,
        simulation_start_day: NaiveDate,
        simulation_end_day: NaiveDate,
    ) -> Self {
        Self {
            weather: WeatherSeries::new(),
            weather_columns: BTreeMap::new(),
            driving: Map::new(),
            parameters: Map::new(),
            first_day,
            simulation_start_day,
            simulation_end_day,
            daily_details: None,
        }
    }

    pub fn bounds(&self) -> TimeBounds {
        TimeBounds::new(
            self.first_day,
            self.simulation_start_day,
            self.simulation_end_day,
        )
    }

    pub fn with_weather(mut self, weather: WeatherSeries) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_weather_column(
        mut self,
        canonical: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.weather_columns.insert(canonical.into(), source.into());
        self
    }

    pub fn with_driving(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.driving.insert(name.into(), value.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_daily_details(mut self, enabled: bool) -> Self {
        self.daily_details = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_deserialize() {
        let yaml = r#"
first_day: 2024-03-30
simulation_start_day: 2024-04-01
simulation_end_day: 2024-04-03
driving:
  latitude: 52.0
parameters:
  thermaltime:
    TBASE: 2.0
weather_columns:
  TMIN: tn
weather:
  - day: 2024-04-01
    tn: 4.5
    tx: 13.0
"#;
        let inputs: SimulationInputs = serde_yaml::from_str(yaml).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        assert_eq!(inputs.simulation_start_day, day);
        assert_eq!(inputs.driving["latitude"], Value::from(52.0));
        assert_eq!(inputs.weather.get(day).unwrap()["tx"], 13.0);
        assert_eq!(inputs.weather_columns["TMIN"], "tn");
        assert_eq!(inputs.daily_details, None);
        assert!(inputs.bounds().validate().is_ok());
    }
}
