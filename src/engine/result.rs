//! Run result types

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::output::DailyDetails;

/// Outcome of a run driven to its end day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_mode: String,

    /// Last simulated day that was processed
    pub end_day: NaiveDate,

    /// Summary value per declared output, in declaration order
    pub outputs: IndexMap<String, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_details: Option<DailyDetails>,
}

impl RunSummary {
    pub fn output(&self, name: &str) -> Option<f64> {
        self.outputs.get(name).copied()
    }

    /// Values in declaration order, as returned by `finalize`
    pub fn values(&self) -> Vec<f64> {
        self.outputs.values().copied().collect()
    }
}
