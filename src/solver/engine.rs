//! Step-by-step fixed-point solver for a parsed equation block
//!
//! Every variable owns a slot in a dense value vector. Right-hand sides are
//! compiled once into [`Node`] trees over those slots, so each fixed-point
//! pass is a plain tree walk with no name lookups.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};

use super::bisection::{find_root, BisectionSettings};
use super::config::SolverConfig;
use super::functions::FunctionRegistry;
use super::parser::EquationParser;
use super::series::{evaluate_series, pad_series, MAX_SERIES_LEN};
use super::timeseries::TimeSeries;
use crate::equations::expr::{Expr, Node, UserFunction};
use crate::equations::names::{extract_tokens, TIME_INDEX, TIME_VARIABLE};
use crate::error::{EvalError, SfcError, SfcResult};

/// Tolerance used when neither the configuration nor the text sets one
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Below this magnitude changes are measured in absolute terms
const RELATIVE_FLOOR: f64 = 1e-3;

/// Slot of the time index `k`
const K_SLOT: usize = 0;

#[derive(Debug, Clone)]
struct Compiled {
    slot: usize,
    node: Node,
}

/// Equation solver over a discrete time axis
#[derive(Debug, Clone)]
pub struct EquationSolver {
    parser: EquationParser,
    config: SolverConfig,
    /// slot -> variable name
    names: Vec<String>,
    slots: HashMap<String, usize>,
    endogenous: Vec<Compiled>,
    /// (slot, base slot)
    lagged: Vec<(usize, usize)>,
    /// (slot, values per time index)
    exogenous: Vec<(usize, Vec<f64>)>,
    /// In dependency order
    decoration: Vec<Compiled>,
    initial_conditions: Vec<Compiled>,
    /// (price slot, balance slot)
    flex: Option<(usize, usize)>,
    tolerance: f64,
    max_iterations: usize,
    /// Value of `k` at each history index
    time_axis: Vec<f64>,
    /// Read every exogenous series at index 0 (steady-state search)
    pin_exogenous: bool,
    history: Vec<Vec<f64>>,
}

impl EquationSolver {
    /// Parse, validate and reduce `text`, then compile it
    pub fn new(text: &str, functions: FunctionRegistry, config: SolverConfig) -> SfcResult<Self> {
        let mut parser = EquationParser::parse(text)?;
        parser.validate(&functions)?;
        parser.equation_reduction()?;
        Self::from_parser(parser, functions, config)
    }

    /// Compile an already reduced parser
    pub fn from_parser(
        parser: EquationParser,
        functions: FunctionRegistry,
        config: SolverConfig,
    ) -> SfcResult<Self> {
        config.validate()?;

        let mut names = vec![TIME_INDEX.to_string()];
        names.extend(parser.endogenous.iter().map(|(n, _)| n.clone()));
        names.extend(parser.lagged.iter().map(|(n, _)| n.clone()));
        names.extend(parser.exogenous.iter().map(|(n, _)| n.clone()));
        names.extend(parser.decoration.iter().map(|(n, _)| n.clone()));
        let slots: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        let slot_of = |n: &str| slots.get(n).copied();
        let user_fn = |n: &str| -> Option<UserFunction> { functions.get(n) };
        let compile = |name: &str, rhs: &str| -> SfcResult<Compiled> {
            let node = Expr::parse(rhs)?.compile(&slot_of, &user_fn)?;
            let slot = slot_of(name)
                .ok_or_else(|| SfcError::Name(format!("unknown variable '{}'", name)))?;
            Ok(Compiled { slot, node })
        };

        let endogenous = parser
            .endogenous
            .iter()
            .map(|(n, rhs)| compile(n, rhs))
            .collect::<SfcResult<Vec<_>>>()?;
        let lagged = parser
            .lagged
            .iter()
            .map(|(n, base)| match (slot_of(n), slot_of(base)) {
                (Some(s), Some(b)) => Ok((s, b)),
                _ => Err(SfcError::Name(format!(
                    "lagged variable {} refers to undefined '{}'",
                    n, base
                ))),
            })
            .collect::<SfcResult<Vec<_>>>()?;

        let max_time = config.max_time.unwrap_or(parser.max_time);
        if max_time >= MAX_SERIES_LEN {
            return Err(SfcError::Logic(format!(
                "MaxTime {} must be below {}",
                max_time, MAX_SERIES_LEN
            )));
        }
        let exogenous = parser
            .exogenous
            .iter()
            .map(|(n, rhs)| {
                let values = evaluate_series(rhs, &user_fn)?;
                Ok((slots[n.as_str()], pad_series(n, values, max_time + 1)))
            })
            .collect::<SfcResult<Vec<_>>>()?;

        let decoration = decoration_order(&parser)?
            .into_iter()
            .map(|(n, rhs)| compile(n, rhs))
            .collect::<SfcResult<Vec<_>>>()?;
        let initial_conditions = parser
            .initial_conditions
            .iter()
            .map(|(n, rhs)| compile(n, rhs))
            .collect::<SfcResult<Vec<_>>>()?;

        let flex = match config.flex_pair() {
            Some((price, balance)) => Some(flex_slots(&parser, &slots, price, balance)?),
            None => None,
        };

        let tolerance = match (config.tolerance, &parser.err_tolerance) {
            (Some(tol), _) => tol,
            (None, Some(text)) => text.parse().map_err(|_| {
                SfcError::Syntax(format!("cannot parse tolerance '{}'", text))
            })?,
            (None, None) => DEFAULT_TOLERANCE,
        };

        info!(
            target: "sfc::solver",
            "compiled {} endogenous, {} lagged, {} exogenous, {} decoration variables",
            endogenous.len(),
            lagged.len(),
            exogenous.len(),
            decoration.len()
        );

        let max_iterations = config.max_iterations;
        Ok(Self {
            parser,
            config,
            names,
            slots,
            endogenous,
            lagged,
            exogenous,
            decoration,
            initial_conditions,
            flex,
            tolerance,
            max_iterations,
            time_axis: (0..=max_time).map(|k| k as f64).collect(),
            pin_exogenous: false,
            history: Vec::new(),
        })
    }

    pub fn parser(&self) -> &EquationParser {
        &self.parser
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Last time index simulated
    pub fn max_time(&self) -> usize {
        self.time_axis.len() - 1
    }

    /// Number of time indices solved so far (including index 0)
    pub fn steps_solved(&self) -> usize {
        self.history.len()
    }

    /// Solve index 0 (initial conditions or steady state) through `MaxTime`
    pub fn solve(&mut self) -> SfcResult<()> {
        self.history.clear();
        let initial = self.initial_values()?;
        self.history.push(initial);

        if self.config.initial_equilibrium {
            // One-shot: cleared whether or not the search succeeds
            self.config.initial_equilibrium = false;
            self.find_steady_state()?;
        }

        for i in 1..self.time_axis.len() {
            let values = self.step(i)?;
            self.history.push(values);
        }
        info!(
            target: "sfc::solver",
            "solved {} steps with {} variables",
            self.history.len(),
            self.names.len()
        );
        Ok(())
    }

    /// Solved values keyed by variable name
    pub fn time_series(&self) -> TimeSeries {
        let mut ts = TimeSeries::new();
        for (slot, name) in self.names.iter().enumerate() {
            ts.insert(name, self.history.iter().map(|v| v[slot]).collect());
        }
        ts
    }

    /// Largest relative gap between a stored endogenous value at history
    /// index `i` and its right-hand side evaluated on the stored values
    pub fn max_residual(&self, i: usize) -> SfcResult<f64> {
        let values = self
            .history
            .get(i)
            .ok_or_else(|| SfcError::Logic(format!("step {} has not been solved", i)))?;
        let mut worst: f64 = 0.0;
        for eq in &self.endogenous {
            if self.pinned_slot() == Some(eq.slot) {
                continue;
            }
            let fresh = eq.node.eval(values).map_err(|source| SfcError::Evaluation {
                step: i,
                variable: self.names[eq.slot].clone(),
                source,
            })?;
            worst = worst.max(change(fresh, values[eq.slot]));
        }
        Ok(worst)
    }

    fn pinned_slot(&self) -> Option<usize> {
        self.flex.map(|(p, _)| p)
    }

    fn exogenous_index(&self, i: usize) -> usize {
        if self.pin_exogenous {
            0
        } else {
            i
        }
    }

    fn initial_values(&self) -> SfcResult<Vec<f64>> {
        let mut values = vec![0.0; self.names.len()];
        values[K_SLOT] = self.time_axis[0];
        for (slot, series) in &self.exogenous {
            values[*slot] = series[0];
        }

        let mut fixed = BTreeSet::new();
        for ic in &self.initial_conditions {
            values[ic.slot] = ic.node.eval(&values).map_err(|source| SfcError::Evaluation {
                step: 0,
                variable: self.names[ic.slot].clone(),
                source,
            })?;
            fixed.insert(ic.slot);
        }

        // Parameters (constant right-hand sides) start at their value
        for eq in &self.endogenous {
            if fixed.contains(&eq.slot) {
                continue;
            }
            let mut reads = Vec::new();
            eq.node.slots(&mut reads);
            if reads.is_empty() {
                if let Ok(v) = eq.node.eval(&values) {
                    values[eq.slot] = v;
                }
            }
        }

        for (slot, base) in &self.lagged {
            if !fixed.contains(slot) {
                values[*slot] = values[*base];
            }
        }

        for dec in &self.decoration {
            if fixed.contains(&dec.slot) {
                continue;
            }
            values[dec.slot] = match dec.node.eval(&values) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        target: "sfc::solver",
                        "cannot evaluate {} at step 0 ({}), storing NaN",
                        self.names[dec.slot],
                        e
                    );
                    f64::NAN
                }
            };
        }
        Ok(values)
    }

    fn step(&self, i: usize) -> SfcResult<Vec<f64>> {
        match self.flex {
            Some(flex) => self.flex_step(i, flex),
            None => self.compute_step(i, None),
        }
    }

    /// Fixed-point iteration for history index `i`, then the decoration pass.
    ///
    /// `pinned` holds a slot whose value is imposed rather than computed.
    fn compute_step(&self, i: usize, pinned: Option<(usize, f64)>) -> SfcResult<Vec<f64>> {
        let prev = &self.history[i - 1];
        let mut current = prev.clone();
        current[K_SLOT] = self.time_axis[i];
        let index = self.exogenous_index(i);
        for (slot, series) in &self.exogenous {
            current[*slot] = series[index];
        }
        for (slot, base) in &self.lagged {
            current[*slot] = prev[*base];
        }
        let pinned_slot = pinned.map(|(slot, value)| {
            current[slot] = value;
            slot
        });

        let tracing = self.config.trace_step == Some(i) && !self.pin_exogenous;
        let mut iteration = 0;
        loop {
            iteration += 1;
            let mut next = current.clone();
            let mut tentative: Option<(usize, EvalError)> = None;

            for eq in &self.endogenous {
                if pinned_slot == Some(eq.slot) {
                    continue;
                }
                match eq.node.eval(&current) {
                    Ok(v) => next[eq.slot] = v,
                    Err(e) => tentative = Some((eq.slot, e)),
                }
            }

            let mut error = 0.0;
            for eq in &self.endogenous {
                if pinned_slot == Some(eq.slot) {
                    continue;
                }
                if iteration > self.config.damping_start {
                    next[eq.slot] = 0.5 * (next[eq.slot] + current[eq.slot]);
                }
                error += change(next[eq.slot], current[eq.slot]);
            }

            if tracing {
                info!(target: "sfc::trace", "step {} pass {}: error {:.3e}", i, iteration, error);
                for eq in &self.endogenous {
                    info!(
                        target: "sfc::trace",
                        "  {} = {} (was {})",
                        self.names[eq.slot],
                        next[eq.slot],
                        current[eq.slot]
                    );
                }
            }

            current = next;
            if error <= self.tolerance {
                if let Some((slot, source)) = tentative {
                    return Err(SfcError::Evaluation {
                        step: i,
                        variable: self.names[slot].clone(),
                        source,
                    });
                }
                break;
            }
            if iteration >= self.max_iterations {
                return Err(SfcError::Convergence {
                    step: i,
                    iterations: iteration,
                    error,
                });
            }
        }
        debug!(target: "sfc::solver", "step {} converged after {} passes", i, iteration);

        for dec in &self.decoration {
            if pinned_slot == Some(dec.slot) {
                continue;
            }
            current[dec.slot] = dec.node.eval(&current).map_err(|source| SfcError::Evaluation {
                step: i,
                variable: self.names[dec.slot].clone(),
                source,
            })?;
        }
        Ok(current)
    }

    /// Bisect on the price so that the balance variable solves to zero
    fn flex_step(&self, i: usize, (price, balance): (usize, usize)) -> SfcResult<Vec<f64>> {
        let prev = &self.history[i - 1];
        let guess = if prev[price].is_finite() && prev[price] > 0.0 {
            prev[price]
        } else {
            self.endogenous
                .iter()
                .chain(self.decoration.iter())
                .find(|c| c.slot == price)
                .and_then(|c| c.node.eval(prev).ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(1.0)
        };

        let settings = BisectionSettings {
            tolerance: self.config.flex_tolerance,
            bracket_attempts: self.config.flex_bracket_attempts,
            max_iterations: self.config.flex_max_iterations,
        };
        let root = find_root(
            |p| Ok(self.compute_step(i, Some((price, p)))?[balance]),
            guess,
            &settings,
        )?;
        match root {
            Some(root) => {
                debug!(
                    target: "sfc::solver",
                    "step {}: {} = {} after {} step solves",
                    i,
                    self.names[price],
                    root.x,
                    root.evaluations
                );
                self.compute_step(i, Some((price, root.x)))
            }
            None => Err(SfcError::BisectionNoBracket {
                step: i,
                price: self.names[price].clone(),
            }),
        }
    }

    /// Run the model on a negative time axis with frozen exogenous inputs and
    /// replace index 0 by the settled state.
    ///
    /// Variables that depend on `k` or `t` (directly, through other
    /// equations or through a lag) keep moving along the time axis and are
    /// left out of the settled check.
    fn find_steady_state(&mut self) -> SfcResult<()> {
        let steps = self.config.equilibrium_steps.max(2);
        let mut pre = self.clone();
        pre.time_axis = (0..=steps).map(|j| j as f64 - steps as f64).collect();
        pre.pin_exogenous = true;
        pre.max_iterations = self.max_iterations * self.config.equilibrium_iteration_multiplier.max(1);
        pre.tolerance = self.tolerance / 10.0;
        let mut start = self.history[0].clone();
        start[K_SLOT] = pre.time_axis[0];
        pre.history = vec![start];

        info!(target: "sfc::solver", "searching for a steady state over {} pre-periods", steps);
        for j in 1..pre.time_axis.len() {
            let values = pre.step(j)?;
            pre.history.push(values);
        }

        let last = &pre.history[steps];
        let before = &pre.history[steps - 1];
        let trending = time_dependent(&self.parser);
        let unsettled: Vec<&str> = self
            .names
            .iter()
            .enumerate()
            .filter(|(slot, name)| {
                *slot != K_SLOT
                    && !trending.contains(name.as_str())
                    && !self.config.equilibrium_excluded.contains(*name)
                    && !(change(last[*slot], before[*slot]) <= self.config.equilibrium_tolerance)
            })
            .map(|(_, name)| name.as_str())
            .collect();
        if !unsettled.is_empty() {
            return Err(SfcError::NoEquilibrium(format!(
                "variables still moving: {}",
                unsettled.join(", ")
            )));
        }

        let mut settled = last.clone();
        settled[K_SLOT] = self.time_axis[0];
        self.history[0] = settled;
        Ok(())
    }

    /// Slot of a variable, if defined
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }
}

/// Names whose value follows the time axis
fn time_dependent(parser: &EquationParser) -> HashSet<String> {
    let mut found: HashSet<String> = [TIME_INDEX, TIME_VARIABLE]
        .iter()
        .map(|s| s.to_string())
        .collect();
    loop {
        let mut grew = false;
        for (name, rhs) in parser.endogenous.iter().chain(&parser.decoration) {
            if !found.contains(name) && extract_tokens(rhs).iter().any(|tok| found.contains(tok)) {
                found.insert(name.clone());
                grew = true;
            }
        }
        for (name, base) in &parser.lagged {
            if !found.contains(name) && found.contains(base) {
                found.insert(name.clone());
                grew = true;
            }
        }
        if !grew {
            return found;
        }
    }
}

/// Relative change when the values are large enough, absolute otherwise
fn change(new: f64, old: f64) -> f64 {
    let diff = (new - old).abs();
    let scale = new.abs().max(old.abs());
    if scale > RELATIVE_FLOOR {
        diff / scale
    } else {
        diff
    }
}

/// Decoration equations sorted so that each comes after the decoration
/// variables it reads
fn decoration_order(parser: &EquationParser) -> SfcResult<Vec<(&str, &str)>> {
    let names: BTreeSet<&str> = parser.decoration.iter().map(|(n, _)| n.as_str()).collect();
    let mut pending: Vec<(&str, &str, BTreeSet<String>)> = parser
        .decoration
        .iter()
        .map(|(n, rhs)| {
            let deps = extract_tokens(rhs)
                .into_iter()
                .filter(|t| t != n && names.contains(t.as_str()))
                .collect();
            (n.as_str(), rhs.as_str(), deps)
        })
        .collect();

    let mut done: BTreeSet<String> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let (ready, waiting): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, _, deps)| deps.iter().all(|d| done.contains(d)));
        if ready.is_empty() {
            let stuck: Vec<&str> = waiting.iter().map(|(n, _, _)| *n).collect();
            return Err(SfcError::Logic(format!(
                "decoration variables depend on each other: {}",
                stuck.join(", ")
            )));
        }
        for (n, rhs, _) in ready {
            done.insert(n.to_string());
            ordered.push((n, rhs));
        }
        pending = waiting;
    }
    Ok(ordered)
}

fn flex_slots(
    parser: &EquationParser,
    slots: &HashMap<String, usize>,
    price: &str,
    balance: &str,
) -> SfcResult<(usize, usize)> {
    let price_ok = parser.endogenous.iter().chain(parser.decoration.iter()).any(|(n, _)| n == price);
    if !price_ok {
        return Err(SfcError::Logic(format!(
            "flex price '{}' must be defined by an ordinary equation",
            price
        )));
    }
    let balance_slot = slots
        .get(balance)
        .copied()
        .ok_or_else(|| SfcError::Name(format!("unknown balance variable '{}'", balance)))?;
    Ok((slots[price], balance_slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn solved(text: &str, config: SolverConfig) -> EquationSolver {
        let mut solver = EquationSolver::new(text, FunctionRegistry::new(), config).unwrap();
        solver.solve().unwrap();
        solver
    }

    #[test]
    fn test_decoration_with_initial_condition() {
        let solver = solved(
            "x = t\nz = x + 1\nz(0) = 2\nexogenous\nt = 10\nMaxTime = 3",
            SolverConfig::default(),
        );
        let ts = solver.time_series();
        assert_eq!(ts.get("x").unwrap(), &[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(ts.get("z").unwrap(), &[2.0, 11.0, 11.0, 11.0]);
        assert_eq!(ts.get("k").unwrap(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_simultaneous_block() {
        // y = c + g, c = 0.5*y  =>  y = 2g
        let mut config = SolverConfig::default();
        config.tolerance = Some(1e-10);
        let solver = solved(
            "y = c + g\nc = 0.5*y\nexogenous\ng = [10, 20]\nMaxTime = 3",
            config,
        );
        let ts = solver.time_series();
        assert_relative_eq!(ts.value("y", 1).unwrap(), 40.0, max_relative = 1e-6);
        assert_relative_eq!(ts.value("y", 3).unwrap(), 40.0, max_relative = 1e-6);
        for i in 1..=3 {
            let residual = solver.max_residual(i).unwrap();
            assert!(residual < 1e-6, "step {} residual {}", i, residual);
        }
    }

    #[test]
    fn test_lagged_accumulation() {
        let solver = solved(
            "F = LAG_F + x\nLAG_F = F(k-1)\nF(0) = 5\nexogenous\nx = 2\nMaxTime = 4",
            SolverConfig::default(),
        );
        let ts = solver.time_series();
        assert_eq!(ts.get("F").unwrap(), &[5.0, 7.0, 9.0, 11.0, 13.0]);
        assert_eq!(ts.get("LAG_F").unwrap(), &[5.0, 5.0, 7.0, 9.0, 11.0]);
    }

    #[test]
    fn test_embedded_lag() {
        let solver = solved("y = y(k-1) + 1\ny(0) = 1\nMaxTime = 2", SolverConfig::default());
        assert_eq!(solver.time_series().get("y").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_constant_parameters_start_at_value() {
        let solver = solved("alpha = 0.6\ny = alpha*y + 4\nMaxTime = 1", SolverConfig::default());
        let ts = solver.time_series();
        assert_eq!(ts.value("alpha", 0), Some(0.6));
        assert_relative_eq!(ts.value("y", 1).unwrap(), 10.0, max_relative = 1e-4);
    }

    #[test]
    fn test_flex_price() {
        let mut config = SolverConfig::default();
        config.flex_prices.insert("p".to_string(), "b".to_string());
        let solver = solved(
            "s = sqrt(p)\nd = 1/p\nb = s - d\np = 4\np(0) = 4\nMaxTime = 3",
            config,
        );
        let ts = solver.time_series();
        assert_eq!(ts.value("p", 0), Some(4.0));
        for k in 1..=3 {
            assert_abs_diff_eq!(ts.value("p", k).unwrap(), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(ts.value("s", k).unwrap(), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(ts.value("d", k).unwrap(), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(ts.value("b", k).unwrap(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_flex_price_without_bracket() {
        let mut config = SolverConfig::default();
        config.flex_prices.insert("p".to_string(), "b".to_string());
        let mut solver = EquationSolver::new(
            "b = p + 1\np = 2\nMaxTime = 2",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        assert!(matches!(
            solver.solve(),
            Err(SfcError::BisectionNoBracket { step: 1, .. })
        ));
    }

    #[test]
    fn test_flex_price_must_be_ordinary() {
        let mut config = SolverConfig::default();
        config.flex_prices.insert("p".to_string(), "b".to_string());
        let result = EquationSolver::new(
            "b = p - 1\nexogenous\np = 2",
            FunctionRegistry::new(),
            config,
        );
        assert!(matches!(result, Err(SfcError::Logic(_))));
    }

    #[test]
    fn test_convergence_error() {
        let mut config = SolverConfig::default();
        config.max_iterations = 50;
        let mut solver =
            EquationSolver::new("x = 2*x + 1\nMaxTime = 2", FunctionRegistry::new(), config)
                .unwrap();
        match solver.solve() {
            Err(SfcError::Convergence { step, iterations, .. }) => {
                assert_eq!(step, 1);
                assert_eq!(iterations, 50);
            }
            other => panic!("Expected convergence error, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluation_error_recovers() {
        // y starts at 0, so the first pass of step 1 divides by zero
        let solver = solved("x = 1/y + 0*x\ny = 0.5*y + 1\nMaxTime = 2", SolverConfig::default());
        let ts = solver.time_series();
        let x = ts.get("x").unwrap();
        assert_eq!(x[0], 0.0);
        assert_relative_eq!(x[1], 0.5, max_relative = 1e-4);
        assert_relative_eq!(x[2], 0.5, max_relative = 1e-4);
        assert_relative_eq!(solver.time_series().last("y").unwrap(), 2.0, max_relative = 1e-4);
    }

    #[test]
    fn test_persistent_evaluation_error() {
        let mut solver = EquationSolver::new(
            "x = 1/y + 0*x\ny = 0*x\nMaxTime = 1",
            FunctionRegistry::new(),
            SolverConfig::default(),
        )
        .unwrap();
        match solver.solve() {
            Err(SfcError::Evaluation { step, variable, source }) => {
                assert_eq!(step, 1);
                assert_eq!(variable, "x");
                assert_eq!(source, EvalError::DivisionByZero);
            }
            other => panic!("Expected evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_steady_state_search() {
        let mut config = SolverConfig::default();
        config.initial_equilibrium = true;
        let mut solver = EquationSolver::new(
            "y = 0.5*LAG_y + g\nLAG_y = y(k-1)\nexogenous\ng = 10\nMaxTime = 3",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        solver.solve().unwrap();
        assert!(!solver.config().initial_equilibrium);
        let ts = solver.time_series();
        assert_relative_eq!(ts.value("y", 0).unwrap(), 20.0, max_relative = 1e-4);
        assert_relative_eq!(ts.value("y", 3).unwrap(), 20.0, max_relative = 1e-4);
        assert_eq!(ts.value("k", 0), Some(0.0));
    }

    #[test]
    fn test_steady_state_ignores_calendar_variables() {
        let mut config = SolverConfig::default();
        config.initial_equilibrium = true;
        config.equilibrium_steps = 50;
        let mut solver = EquationSolver::new(
            "y = 0.5*LAG_y + g\nLAG_y = y(k-1)\nyear = 2000 + t\nexogenous\ng = 10\nMaxTime = 3",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        solver.solve().unwrap();
        let ts = solver.time_series();
        assert_relative_eq!(ts.value("y", 0).unwrap(), 20.0, max_relative = 1e-3);
        assert_eq!(ts.value("year", 3), Some(2003.0));
    }

    #[test]
    fn test_steady_state_not_found() {
        let mut config = SolverConfig::default();
        config.initial_equilibrium = true;
        config.equilibrium_steps = 20;
        let mut solver = EquationSolver::new(
            "y = LAG_y + 1\nLAG_y = y(k-1)\nMaxTime = 3",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        assert!(matches!(solver.solve(), Err(SfcError::NoEquilibrium(_))));

        // Excluding the trending stock lets the search pass
        let mut config = SolverConfig::default();
        config.initial_equilibrium = true;
        config.equilibrium_steps = 20;
        config.equilibrium_excluded = vec!["y".to_string(), "LAG_y".to_string()];
        let mut solver = EquationSolver::new(
            "y = LAG_y + 1\nLAG_y = y(k-1)\nMaxTime = 3",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        solver.solve().unwrap();
    }

    #[test]
    fn test_user_function() {
        let mut functions = FunctionRegistry::new();
        functions
            .register("halve", |args: &[f64]| Ok(args[0] / 2.0))
            .unwrap();
        let mut solver =
            EquationSolver::new("y = halve(g)\nexogenous\ng = 8\nMaxTime = 1", functions, SolverConfig::default())
                .unwrap();
        solver.solve().unwrap();
        assert_eq!(solver.time_series().value("y", 1), Some(4.0));
    }

    #[test]
    fn test_config_overrides() {
        let mut config = SolverConfig::default();
        config.max_time = Some(2);
        config.tolerance = Some(1e-9);
        let solver = EquationSolver::new(
            "x = 1\nMaxTime = 10\nErr_Tolerance = 1e-3",
            FunctionRegistry::new(),
            config,
        )
        .unwrap();
        assert_eq!(solver.max_time(), 2);
        assert_eq!(solver.tolerance(), 1e-9);
    }

    #[test]
    fn test_max_time_override_is_bounded() {
        let mut config = SolverConfig::default();
        config.max_time = Some(usize::MAX);
        let result = EquationSolver::new("x = 1", FunctionRegistry::new(), config);
        assert!(matches!(result, Err(SfcError::Logic(_))));
    }

    #[test]
    fn test_short_series_padded() {
        let solver = solved("y = 2*g + 0*y\nexogenous\ng = [1, 2]\nMaxTime = 3", SolverConfig::default());
        assert_eq!(solver.time_series().get("g").unwrap(), &[1.0, 2.0, 2.0, 2.0]);
    }
}
