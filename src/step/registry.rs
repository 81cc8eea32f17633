//! String-keyed step factory
//!
//! Workflow documents name their steps by identifier (`crop.ThermalTime`).
//! The registry maps those identifiers to factories that produce shared
//! instances behind the [`Step`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::{RunningTotal, ThermalTime};
use super::Step;

/// Produces one shared step instance
pub type StepFactory = Box<dyn Fn() -> Arc<dyn Step> + Send + Sync>;

/// Registry of step types available to workflow definitions
#[derive(Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the reference steps
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ThermalTime::NAME, || ThermalTime);
        registry.register(RunningTotal::NAME, || RunningTotal);
        registry
    }

    /// Register a factory under `name`, replacing any previous entry
    pub fn register<F, S>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Step + 'static,
    {
        self.factories.insert(
            name.into(),
            Box::new(move || Arc::new(factory()) as Arc<dyn Step>),
        );
        self
    }

    /// Register an existing instance; every lookup returns the same `Arc`
    pub fn register_instance(&mut self, name: impl Into<String>, step: Arc<dyn Step>) -> &mut Self {
        self.factories
            .insert(name.into(), Box::new(move || Arc::clone(&step)));
        self
    }

    /// Instantiate the step registered under `name`
    pub fn create(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}
