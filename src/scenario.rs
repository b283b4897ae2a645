//! Scenario runner for batches of independent models
//!
//! Every scenario builds and solves its own [`Model`], so scenarios run in
//! parallel with rayon while each solve stays single-threaded.

use rayon::prelude::*;

use crate::builtin_models::{build_sim, SimParameters};
use crate::error::SfcResult;
use crate::model::Model;
use crate::solver::TimeSeries;

type Builder<P> = Box<dyn Fn(&P) -> SfcResult<Model> + Send + Sync>;

/// Named parameter set
#[derive(Debug, Clone)]
pub struct Scenario<P> {
    pub name: String,
    pub params: P,
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: SfcResult<TimeSeries>,
}

impl ScenarioResult {
    /// Last solved value of `variable`, if the scenario succeeded
    pub fn final_value(&self, variable: &str) -> Option<f64> {
        self.outcome.as_ref().ok().and_then(|ts| ts.last(variable))
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Builds one model per scenario from a shared builder
///
/// # Example
/// ```ignore
/// let mut runner = ScenarioRunner::sim();
/// for g in [20.0, 25.0, 30.0] {
///     runner.add(format!("G={}", g), SimParameters { gov_demand: g, ..Default::default() });
/// }
/// let results = runner.run_all();
/// ```
pub struct ScenarioRunner<P> {
    build: Builder<P>,
    scenarios: Vec<Scenario<P>>,
}

impl<P: Sync> ScenarioRunner<P> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&P) -> SfcResult<Model> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            scenarios: Vec::new(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, params: P) -> &mut Self {
        self.scenarios.push(Scenario {
            name: name.into(),
            params,
        });
        self
    }

    pub fn scenarios(&self) -> &[Scenario<P>] {
        &self.scenarios
    }

    /// Build and solve a single parameter set
    pub fn run(&self, params: &P) -> SfcResult<TimeSeries> {
        let mut model = (self.build)(params)?;
        model.main()?;
        Ok(model.time_series().clone())
    }

    /// Solve every scenario in parallel; results keep registration order
    pub fn run_all(&self) -> Vec<ScenarioResult> {
        self.scenarios
            .par_iter()
            .map(|s| ScenarioResult {
                name: s.name.clone(),
                outcome: self.run(&s.params),
            })
            .collect()
    }
}

impl ScenarioRunner<SimParameters> {
    /// Runner over model SIM parameter sets
    pub fn sim() -> Self {
        Self::new(build_sim)
    }
}
