//! Solver tuning knobs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SfcError, SfcResult};

/// Configuration for an [`EquationSolver`](super::EquationSolver) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Fixed-point passes allowed per step
    pub max_iterations: usize,

    /// Overrides `Err_Tolerance` from the equation text
    pub tolerance: Option<f64>,

    /// Pass count after which each update moves halfway towards its new value
    pub damping_start: usize,

    /// Overrides `MaxTime` from the equation text
    pub max_time: Option<usize>,

    /// Search for a steady state before step 1 (one-shot, cleared after use)
    pub initial_equilibrium: bool,

    /// Pre-periods simulated by the steady-state search
    pub equilibrium_steps: usize,

    /// Relative change allowed between the last two pre-periods
    pub equilibrium_tolerance: f64,

    /// Iteration budget multiplier during the steady-state search
    pub equilibrium_iteration_multiplier: usize,

    /// Variables that are not required to settle (e.g. trending stocks)
    pub equilibrium_excluded: Vec<String>,

    /// Step whose fixed-point passes are logged on `sfc::trace`
    pub trace_step: Option<usize>,

    /// Flex price variable -> balance variable driven to zero
    pub flex_prices: BTreeMap<String, String>,

    /// Absolute tolerance on the balance variable
    pub flex_tolerance: f64,

    /// Number of bracket widenings tried before giving up
    pub flex_bracket_attempts: usize,

    pub flex_max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: None,
            damping_start: 10,
            max_time: None,
            initial_equilibrium: false,
            equilibrium_steps: 200,
            equilibrium_tolerance: 1e-4,
            equilibrium_iteration_multiplier: 5,
            equilibrium_excluded: Vec::new(),
            trace_step: None,
            flex_prices: BTreeMap::new(),
            flex_tolerance: 1e-9,
            flex_bracket_attempts: 8,
            flex_max_iterations: 200,
        }
    }
}

impl SolverConfig {
    /// Load from a JSON document; missing fields keep their defaults
    pub fn from_json(text: &str) -> SfcResult<Self> {
        let config: SolverConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SfcResult<()> {
        if self.max_iterations == 0 {
            return Err(SfcError::Logic("max_iterations must be positive".to_string()));
        }
        if let Some(tol) = self.tolerance {
            if !(tol > 0.0) {
                return Err(SfcError::Logic(format!("tolerance must be positive, got {}", tol)));
            }
        }
        if self.flex_prices.len() > 1 {
            return Err(SfcError::Logic(
                "only one flex price variable is supported".to_string(),
            ));
        }
        Ok(())
    }

    /// The single (price, balance) flex pair, if configured
    pub fn flex_pair(&self) -> Option<(&str, &str)> {
        self.flex_prices
            .iter()
            .next()
            .map(|(p, b)| (p.as_str(), b.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.max_iterations, 500);
        assert_eq!(config.damping_start, 10);
        assert!(!config.initial_equilibrium);
        assert!(config.flex_pair().is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SolverConfig::from_json(
            r#"{"max_iterations": 50, "flex_prices": {"p": "b"}, "initial_equilibrium": true}"#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.flex_pair(), Some(("p", "b")));
        assert!(config.initial_equilibrium);
        assert_eq!(config.equilibrium_steps, 200);
    }

    #[test]
    fn test_rejects_two_flex_prices() {
        let result = SolverConfig::from_json(r#"{"flex_prices": {"p": "b", "q": "c"}}"#);
        assert!(matches!(result, Err(SfcError::Logic(_))));
    }
}
