//! Per-run step timings
//!
//! A `TimingCollector` is owned by the caller and handed to
//! [`SimulationEngine::execute_step_with_timings`] for the days it wants
//! measured. Nothing is recorded globally.
//!
//! [`SimulationEngine::execute_step_with_timings`]: super::SimulationEngine::execute_step_with_timings

use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;

use crate::step::LifecyclePhase;

/// Accumulated timing of one (step, phase) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub calls: u64,
    pub total: Duration,
}

impl PhaseTiming {
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total.div_f64(self.calls as f64)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingCollector {
    entries: IndexMap<(String, LifecyclePhase), PhaseTiming>,
}

impl TimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: &str, phase: LifecyclePhase, elapsed: Duration) {
        let entry = self.entries.entry((step.to_string(), phase)).or_default();
        entry.calls += 1;
        entry.total += elapsed;
    }

    pub fn get(&self, step: &str, phase: LifecyclePhase) -> Option<&PhaseTiming> {
        self.entries.get(&(step.to_string(), phase))
    }

    /// Entries in first-recorded order
    pub fn iter(&self) -> impl Iterator<Item = (&str, LifecyclePhase, &PhaseTiming)> {
        self.entries
            .iter()
            .map(|((step, phase), timing)| (step.as_str(), *phase, timing))
    }

    /// Total time across all steps and phases
    pub fn total(&self) -> Duration {
        self.entries.values().map(|t| t.total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut timings = TimingCollector::new();
        timings.record("crop.ThermalTime", LifecyclePhase::RunStep, Duration::from_millis(2));
        timings.record("crop.ThermalTime", LifecyclePhase::RunStep, Duration::from_millis(4));
        timings.record("crop.ThermalTime", LifecyclePhase::Integrate, Duration::from_millis(1));

        let run = timings.get("crop.ThermalTime", LifecyclePhase::RunStep).unwrap();
        assert_eq!(run.calls, 2);
        assert_eq!(run.total, Duration::from_millis(6));
        assert_eq!(run.mean(), Duration::from_millis(3));

        assert_eq!(timings.total(), Duration::from_millis(7));
        assert_eq!(timings.iter().count(), 2);
        assert!(timings.get("crop.ThermalTime", LifecyclePhase::Initialize).is_none());
    }

    #[test]
    fn test_mean_with_large_call_count() {
        let timing = PhaseTiming {
            calls: 1 << 32,
            total: Duration::from_nanos(1 << 33),
        };
        assert_eq!(timing.mean(), Duration::from_nanos(2));
        assert_eq!(PhaseTiming::default().mean(), Duration::ZERO);
    }
}
