//! Equation text parsing, classification and reduction
//!
//! The input is one assignment per line. Each assignment is classified as
//! endogenous, lagged, exogenous or an initial condition; `MaxTime` and
//! `Err_Tolerance` are consumed as solver controls. After validation,
//! [`EquationParser::equation_reduction`] removes exact aliases and moves
//! variables nothing else depends on to the decoration list.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use super::functions::FunctionRegistry;
use super::series::MAX_SERIES_LEN;
use crate::equations::names::{
    extract_tokens, is_builtin_function, is_identifier, is_reserved, replace_tokens_from_lookup,
    validate_variable_name, ERR_TOLERANCE, MAX_TIME, TIME_INDEX, TIME_VARIABLE,
};
use crate::error::{SfcError, SfcResult};

lazy_static! {
    static ref LAG_SPELLING_RE: Regex = Regex::new(r"\(\s*[tk]\s*-\s*1\s*\)").unwrap();
    static ref PURE_LAG_RE: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(k-1\)$").unwrap();
    static ref EMBEDDED_LAG_RE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(k-1\)").unwrap();
    static ref INITIAL_RE: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*0\s*\)$").unwrap();
}

/// Prefix of synthetic lagged variables created for lags inside expressions
pub const SYNTHETIC_LAG_PREFIX: &str = "_LAG_";

/// Default number of simulated steps when the text has no `MaxTime` line
pub const DEFAULT_MAX_TIME: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Endogenous,
    Lagged,
    Exogenous,
    Decoration,
}

/// Classified equation text
#[derive(Debug, Clone, PartialEq)]
pub struct EquationParser {
    /// `(name, rhs)` solved by fixed-point iteration
    pub endogenous: Vec<(String, String)>,
    /// `(name, base)`: `name[k] = base[k-1]`
    pub lagged: Vec<(String, String)>,
    /// `(name, rhs)` where rhs is a scalar or series literal
    pub exogenous: Vec<(String, String)>,
    /// `(name, rhs)` evaluated once per step after convergence
    pub decoration: Vec<(String, String)>,
    pub initial_conditions: BTreeMap<String, String>,
    pub max_time: usize,
    /// Kept as text; the solver converts it
    pub err_tolerance: Option<String>,
    /// Non-fatal problems found while reading the text
    pub warnings: Vec<String>,
}

impl Default for EquationParser {
    fn default() -> Self {
        Self {
            endogenous: Vec::new(),
            lagged: Vec::new(),
            exogenous: Vec::new(),
            decoration: Vec::new(),
            initial_conditions: BTreeMap::new(),
            max_time: DEFAULT_MAX_TIME,
            err_tolerance: None,
            warnings: Vec::new(),
        }
    }
}

impl EquationParser {
    /// Read and classify every line of `text`.
    ///
    /// Malformed lines are skipped and recorded in `warnings`; only bad
    /// solver controls are fatal here.
    pub fn parse(text: &str) -> SfcResult<Self> {
        let mut parser = Self::default();
        let mut exogenous_mode = false;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if extract_tokens(line)
                .iter()
                .any(|t| t.eq_ignore_ascii_case("exogenous"))
            {
                exogenous_mode = true;
                continue;
            }

            let parts: Vec<&str> = line.split('=').collect();
            if parts.len() != 2 {
                parser.warn(format!(
                    "line {}: expected exactly one '=', skipping '{}'",
                    line_no + 1,
                    line
                ));
                continue;
            }
            let lhs = parts[0].trim();
            let rhs = parts[1].trim();
            if rhs.is_empty() {
                parser.warn(format!("line {}: empty right-hand side for '{}'", line_no + 1, lhs));
                continue;
            }

            if lhs == MAX_TIME {
                parser.max_time = parse_max_time(rhs)?;
                continue;
            }
            if lhs == ERR_TOLERANCE {
                let tol: f64 = rhs.parse().map_err(|_| {
                    SfcError::Syntax(format!("cannot parse {} = '{}'", ERR_TOLERANCE, rhs))
                })?;
                if !(tol > 0.0) {
                    return Err(SfcError::Syntax(format!("{} must be positive", ERR_TOLERANCE)));
                }
                parser.err_tolerance = Some(rhs.to_string());
                continue;
            }
            if let Some(caps) = INITIAL_RE.captures(lhs) {
                parser
                    .initial_conditions
                    .insert(caps[1].to_string(), rhs.to_string());
                continue;
            }
            if !is_identifier(lhs) {
                parser.warn(format!(
                    "line {}: '{}' is not a valid left-hand side, skipping",
                    line_no + 1,
                    lhs
                ));
                continue;
            }

            let rhs = LAG_SPELLING_RE.replace_all(rhs, "(k-1)").into_owned();
            parser.remove_definition(lhs);

            if exogenous_mode {
                parser.exogenous.push((lhs.to_string(), rhs));
            } else if let Some(caps) = PURE_LAG_RE.captures(&rhs) {
                parser.lagged.push((lhs.to_string(), caps[1].to_string()));
            } else if rhs.contains("(k-1)") {
                let rewritten = parser.extract_embedded_lags(&rhs);
                parser.endogenous.push((lhs.to_string(), rewritten));
            } else {
                parser.endogenous.push((lhs.to_string(), rhs));
            }
        }

        if parser.kind_of(TIME_VARIABLE).is_none() {
            parser
                .endogenous
                .push((TIME_VARIABLE.to_string(), TIME_INDEX.to_string()));
        }

        info!(
            target: "sfc::parser",
            "parsed {} endogenous, {} lagged, {} exogenous variables, MaxTime = {}",
            parser.endogenous.len(),
            parser.lagged.len(),
            parser.exogenous.len(),
            parser.max_time
        );
        Ok(parser)
    }

    fn warn(&mut self, message: String) {
        warn!(target: "sfc::parser", "{}", message);
        self.warnings.push(message);
    }

    fn remove_definition(&mut self, name: &str) {
        let before = self.endogenous.len() + self.lagged.len() + self.exogenous.len();
        self.endogenous.retain(|(n, _)| n != name);
        self.lagged.retain(|(n, _)| n != name);
        self.exogenous.retain(|(n, _)| n != name);
        let after = self.endogenous.len() + self.lagged.len() + self.exogenous.len();
        if after < before {
            self.warn(format!("'{}' is defined more than once, keeping the last", name));
        }
    }

    /// Replace `name(k-1)` inside an expression by `_LAG_name`
    fn extract_embedded_lags(&mut self, rhs: &str) -> String {
        let mut bases = Vec::new();
        let rewritten = EMBEDDED_LAG_RE
            .replace_all(rhs, |caps: &regex::Captures| {
                bases.push(caps[1].to_string());
                format!("{}{}", SYNTHETIC_LAG_PREFIX, &caps[1])
            })
            .into_owned();
        for base in bases {
            let synthetic = format!("{}{}", SYNTHETIC_LAG_PREFIX, base);
            if !self.lagged.iter().any(|(n, _)| *n == synthetic) {
                self.lagged.push((synthetic, base));
            }
        }
        rewritten
    }

    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        if self.endogenous.iter().any(|(n, _)| n == name) {
            Some(VariableKind::Endogenous)
        } else if self.lagged.iter().any(|(n, _)| n == name) {
            Some(VariableKind::Lagged)
        } else if self.exogenous.iter().any(|(n, _)| n == name) {
            Some(VariableKind::Exogenous)
        } else if self.decoration.iter().any(|(n, _)| n == name) {
            Some(VariableKind::Decoration)
        } else {
            None
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Right-hand side of an endogenous or decoration variable
    pub fn rhs_of(&self, name: &str) -> Option<&str> {
        self.endogenous
            .iter()
            .chain(self.decoration.iter())
            .find(|(n, _)| n == name)
            .map(|(_, rhs)| rhs.as_str())
    }

    /// Every defined variable name
    pub fn variables(&self) -> Vec<&str> {
        self.endogenous
            .iter()
            .chain(self.lagged.iter())
            .chain(self.exogenous.iter())
            .chain(self.decoration.iter())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Check names on both sides of every assignment
    pub fn validate(&self, functions: &FunctionRegistry) -> SfcResult<()> {
        for name in self.variables() {
            validate_variable_name(name)?;
            if functions.contains(name) {
                return Err(SfcError::Name(format!(
                    "'{}' is both a variable and a function",
                    name
                )));
            }
        }

        let expressions = self
            .endogenous
            .iter()
            .chain(self.exogenous.iter())
            .chain(self.decoration.iter())
            .map(|(n, rhs)| (n.as_str(), rhs.as_str()))
            .chain(
                self.initial_conditions
                    .iter()
                    .map(|(n, rhs)| (n.as_str(), rhs.as_str())),
            );
        for (name, rhs) in expressions {
            for token in extract_tokens(rhs) {
                if token == TIME_INDEX
                    || is_builtin_function(&token)
                    || functions.contains(&token)
                    || self.is_defined(&token)
                {
                    continue;
                }
                if is_reserved(&token) {
                    return Err(SfcError::Name(format!(
                        "reserved word '{}' used in equation for {}",
                        token, name
                    )));
                }
                return Err(SfcError::Name(format!(
                    "undefined variable '{}' in equation for {}",
                    token, name
                )));
            }
        }

        for (name, base) in &self.lagged {
            if !self.is_defined(base) {
                return Err(SfcError::Name(format!(
                    "lagged variable {} refers to undefined '{}'",
                    name, base
                )));
            }
        }
        for name in self.initial_conditions.keys() {
            if !self.is_defined(name) {
                return Err(SfcError::Name(format!(
                    "initial condition for undefined variable '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Remove exact aliases and promote unreferenced variables to decoration,
    /// repeating until nothing changes.
    pub fn equation_reduction(&mut self) -> SfcResult<()> {
        loop {
            let aliased = self.alias_pass()?;
            let promoted = self.decoration_pass();
            if !aliased && !promoted {
                break;
            }
        }
        debug!(
            target: "sfc::parser",
            "reduction left {} endogenous and {} decoration variables",
            self.endogenous.len(),
            self.decoration.len()
        );
        Ok(())
    }

    /// Replace one alias `x = y` wherever `x` is still referenced
    fn alias_pass(&mut self) -> SfcResult<bool> {
        let aliases: Vec<(String, String)> = self
            .endogenous
            .iter()
            .filter(|(_, rhs)| is_identifier(rhs) && rhs != TIME_INDEX)
            .cloned()
            .collect();

        for (x, y) in aliases {
            if x == y {
                return Err(SfcError::Logic(format!("'{}' is defined as itself", x)));
            }
            if !self.is_defined(&y) {
                continue;
            }
            if self.rhs_of(&y) == Some(x.as_str()) {
                return Err(SfcError::Logic(format!(
                    "'{}' and '{}' are aliases of each other",
                    x, y
                )));
            }
            let referenced = self
                .endogenous
                .iter()
                .chain(self.decoration.iter())
                .any(|(n, rhs)| *n != x && extract_tokens(rhs).contains(&x));
            if !referenced {
                continue;
            }

            debug!(target: "sfc::parser", "replacing alias {} by {}", x, y);
            let mut lookup = HashMap::new();
            lookup.insert(x.clone(), y.clone());
            for (n, rhs) in self.endogenous.iter_mut().chain(self.decoration.iter_mut()) {
                if *n != x {
                    *rhs = replace_tokens_from_lookup(rhs, &lookup);
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Move endogenous variables that nothing else depends on to decoration
    fn decoration_pass(&mut self) -> bool {
        let mut moved = false;
        loop {
            let mut referenced: BTreeSet<String> = self
                .lagged
                .iter()
                .map(|(_, base)| base.clone())
                .collect();
            // A self-referencing variable still needs iterating
            for (_, rhs) in &self.endogenous {
                referenced.extend(extract_tokens(rhs));
            }
            let Some(pos) = self
                .endogenous
                .iter()
                .position(|(n, _)| !referenced.contains(n))
            else {
                return moved;
            };
            let entry = self.endogenous.remove(pos);
            debug!(target: "sfc::parser", "{} is a decoration variable", entry.0);
            self.decoration.push(entry);
            moved = true;
        }
    }
}

fn parse_max_time(rhs: &str) -> SfcResult<usize> {
    let value: f64 = rhs
        .parse()
        .map_err(|_| SfcError::Syntax(format!("cannot parse {} = '{}'", MAX_TIME, rhs)))?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(SfcError::Syntax(format!(
            "{} must be a non-negative integer, got '{}'",
            MAX_TIME, rhs
        )));
    }
    if value >= MAX_SERIES_LEN as f64 {
        return Err(SfcError::Syntax(format!(
            "{} must be below {}, got '{}'",
            MAX_TIME, MAX_SERIES_LEN, rhs
        )));
    }
    Ok(value as usize)
}
