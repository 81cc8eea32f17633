//! Daily weather driving data
//!
//! A run carries its own weather series. On every simulated day inside the
//! simulation bounds the engine copies that day's record into
//! `status.weather`, renamed through the run's column map.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One day of weather observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub day: NaiveDate,

    /// Column name -> value (e.g. TMIN, TMAX, RAIN, IRRAD)
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

/// Weather records keyed by calendar day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<WeatherRecord>", into = "Vec<WeatherRecord>")]
pub struct WeatherSeries {
    records: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl WeatherSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `day`
    pub fn insert(&mut self, day: NaiveDate, values: BTreeMap<String, f64>) {
        self.records.insert(day, values);
    }

    pub fn remove(&mut self, day: NaiveDate) -> Option<BTreeMap<String, f64>> {
        self.records.remove(&day)
    }

    pub fn get(&self, day: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.records.get(&day)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.records.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.records.keys().next_back().copied()
    }

    /// First day in `from..=to` with no record
    pub fn first_missing(&self, from: NaiveDate, to: NaiveDate) -> Option<NaiveDate> {
        from.iter_days()
            .take_while(|day| *day <= to)
            .find(|day| !self.records.contains_key(day))
    }

    /// The record for `day` as a JSON object, renamed through `columns`
    /// (canonical name -> source column). An empty column map keeps the
    /// source names. Source columns absent from the record are skipped.
    pub fn mapped(
        &self,
        day: NaiveDate,
        columns: &BTreeMap<String, String>,
    ) -> Option<Map<String, Value>> {
        let record = self.records.get(&day)?;

        let map = if columns.is_empty() {
            record
                .iter()
                .map(|(name, value)| (name.clone(), Value::from(*value)))
                .collect()
        } else {
            columns
                .iter()
                .filter_map(|(canonical, source)| {
                    record
                        .get(source)
                        .map(|value| (canonical.clone(), Value::from(*value)))
                })
                .collect()
        };

        Some(map)
    }
}

impl From<Vec<WeatherRecord>> for WeatherSeries {
    fn from(records: Vec<WeatherRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.day, r.values)).collect(),
        }
    }
}

impl From<WeatherSeries> for Vec<WeatherRecord> {
    fn from(series: WeatherSeries) -> Self {
        series
            .records
            .into_iter()
            .map(|(day, values)| WeatherRecord { day, values })
            .collect()
    }
}
