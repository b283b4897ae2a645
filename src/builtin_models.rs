//! Ready-made models
//!
//! Model SIM is the simplest stock-flow consistent economy: households,
//! a government that only spends and taxes, and businesses that pay out
//! everything they earn. In steady state output is `G / θ`.

use serde::{Deserialize, Serialize};

use crate::error::SfcResult;
use crate::model::Model;

/// Parameters of model SIM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParameters {
    pub tax_rate: f64,
    pub alpha_income: f64,
    pub alpha_fin: f64,
    pub gov_demand: f64,
    /// `(period, new level)`: government demand steps to the new level
    pub step_change: Option<(usize, f64)>,
    pub max_time: usize,
    /// Start from the steady state of the initial government demand
    pub initial_equilibrium: bool,
}

impl Default for SimParameters {
    fn default() -> Self {
        Self {
            tax_rate: 0.2,
            alpha_income: 0.6,
            alpha_fin: 0.4,
            gov_demand: 20.0,
            step_change: None,
            max_time: 100,
            initial_equilibrium: false,
        }
    }
}

impl SimParameters {
    /// Exogenous series literal for government demand
    pub fn gov_demand_series(&self) -> String {
        match self.step_change {
            Some((at, level)) if at <= self.max_time => format!(
                "[{}]*{} + [{}]*{}",
                self.gov_demand,
                at,
                level,
                self.max_time + 1 - at
            ),
            _ => self.gov_demand.to_string(),
        }
    }
}

/// Build (but do not solve) model SIM
pub fn build_sim(params: &SimParameters) -> SfcResult<Model> {
    let mut model = Model::new();
    let ca = model.add_country("CA", "Canada", "CAD")?;
    model.add_household(ca, "HH", "Household", params.alpha_income, params.alpha_fin)?;
    let gov = model.add_do_nothing_government(ca, "GOV", "Government")?;
    model.add_fixed_margin_business(ca, "BUS", "Business sector", 0.0, "GOOD", "LAB")?;
    model.add_tax_flow(ca, "TF", "Tax flow", params.tax_rate, None)?;
    model.add_market(ca, "GOOD", "Goods market")?;
    model.add_market(ca, "LAB", "Labour market")?;
    model.add_exogenous(gov, "DEM_GOOD", &params.gov_demand_series())?;
    model.set_max_time(params.max_time);

    let config = model.solver_config_mut();
    // The income loop needs a few hundred damped passes from a cold start
    config.max_iterations = 1000;
    config.initial_equilibrium = params.initial_equilibrium;
    Ok(model)
}

/// Two countries with their own currencies; the Canadian household sends
/// `amount` CAD to the US household every period
pub fn build_two_country_gift(amount: f64, cad_rate: f64) -> SfcResult<Model> {
    let mut model = Model::new();
    let ca = model.add_country("CA", "Canada", "CAD")?;
    let us = model.add_country("US", "United States", "USD")?;
    let sender = model.add_household(ca, "HH", "Canadian household", 0.6, 0.4)?;
    let receiver = model.add_household(us, "HH", "US household", 0.6, 0.4)?;
    model.add_external()?;
    model.set_exchange_rate("CAD", &cad_rate.to_string())?;
    model.set_exchange_rate("USD", "1.0")?;
    model.send_money(sender, receiver, &amount.to_string())?;
    model.set_max_time(10);
    Ok(model)
}
