//! The [`Model`]: countries, sectors and the build-then-solve lifecycle
//!
//! Sectors are created first and may reference each other through
//! temporary aliases (`_{id}__{local}`). [`Model::main`] then assigns full
//! codes, runs every sector's equation generator once, rewrites aliases
//! and local names to decorated names, emits the equation text and solves it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::country::{Country, CountryId, CurrencyZone};
use super::external::{External, Transfer};
use super::sector::{validate_code, GovernmentRole, Sector, SectorId, SectorKind};
use crate::equations::names::{
    create_equation_from_terms, decorated_name, replace_tokens_from_lookup, validate_local_name,
    validate_variable_name, DELIMITER, MAX_TIME,
};
use crate::equations::{Equation, Term};
use crate::error::{EvalError, SfcError, SfcResult};
use crate::solver::parser::DEFAULT_MAX_TIME;
use crate::solver::{EquationSolver, ExportFormat, FunctionRegistry, SolverConfig, TimeSeries};

/// A stock-flow consistent model under construction or solved
#[derive(Debug, Clone)]
pub struct Model {
    countries: Vec<Country>,
    /// Arena in registration order
    sectors: Vec<Sector>,
    index: HashMap<SectorId, usize>,
    /// (sector, local, rhs)
    exogenous: Vec<(SectorId, String, String)>,
    global_equations: Vec<Equation>,
    /// (sector, local, rhs)
    initial_conditions: Vec<(SectorId, String, String)>,
    /// Cash flows that do not count towards a sector's `INC`
    income_exclusions: BTreeSet<(SectorId, String)>,
    /// temporary alias -> (sector, local)
    aliases: BTreeMap<String, (SectorId, String)>,
    pub(super) transfers: Vec<Transfer>,
    pub(super) external: Option<External>,
    max_time: usize,
    solver_config: SolverConfig,
    functions: FunctionRegistry,
    final_equations: Option<String>,
    time_series: TimeSeries,
    skip_first_point: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            countries: Vec::new(),
            sectors: Vec::new(),
            index: HashMap::new(),
            exogenous: Vec::new(),
            global_equations: Vec::new(),
            initial_conditions: Vec::new(),
            income_exclusions: BTreeSet::new(),
            aliases: BTreeMap::new(),
            transfers: Vec::new(),
            external: None,
            max_time: DEFAULT_MAX_TIME,
            solver_config: SolverConfig::default(),
            functions: FunctionRegistry::new(),
            final_equations: None,
            time_series: TimeSeries::new(),
            skip_first_point: false,
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- countries ----

    pub fn add_country(&mut self, code: &str, description: &str, currency: &str) -> SfcResult<CountryId> {
        validate_code(code)?;
        if self.countries.iter().any(|c| c.code == code) {
            return Err(SfcError::Logic(format!("duplicate country code '{}'", code)));
        }
        let id = CountryId::from_index(self.countries.len());
        self.countries.push(Country::new(id, code, description, currency));
        Ok(id)
    }

    pub fn country(&self, id: CountryId) -> SfcResult<&Country> {
        self.countries
            .get(id.index())
            .ok_or_else(|| SfcError::Logic(format!("unknown country {}", id.index())))
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn find_country(&self, code: &str) -> Option<CountryId> {
        self.countries.iter().find(|c| c.code == code).map(|c| c.id)
    }

    /// The zone of every country sharing `country`'s currency
    pub fn currency_zone(&self, country: CountryId) -> SfcResult<CurrencyZone> {
        let currency = self.country(country)?.currency.clone();
        let countries = self
            .countries
            .iter()
            .filter(|c| c.currency == currency)
            .map(|c| c.id)
            .collect();
        Ok(CurrencyZone {
            currency,
            countries,
        })
    }

    /// One zone per distinct currency, in first-seen order
    pub fn currency_zones(&self) -> Vec<CurrencyZone> {
        let mut zones: Vec<CurrencyZone> = Vec::new();
        for c in &self.countries {
            match zones.iter_mut().find(|z| z.currency == c.currency) {
                Some(zone) => zone.countries.push(c.id),
                None => zones.push(CurrencyZone {
                    currency: c.currency.clone(),
                    countries: vec![c.id],
                }),
            }
        }
        zones
    }

    // ---- sectors ----

    /// Register a sector of any kind; the specialised `add_*` helpers build on this
    pub fn add_sector(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        kind: SectorKind,
        has_f: bool,
    ) -> SfcResult<SectorId> {
        self.ensure_building()?;
        self.country(country)?;
        let sector = Sector::new(country, code, description, kind, has_f)?;
        let id = sector.id();
        self.index.insert(id, self.sectors.len());
        self.sectors.push(sector);
        self.countries[country.index()].sectors.push(id);
        debug!(target: "sfc::model", "registered sector {} ({}) as #{}", code, description, id);
        Ok(id)
    }

    pub fn sector(&self, id: SectorId) -> SfcResult<&Sector> {
        self.index
            .get(&id)
            .map(|&i| &self.sectors[i])
            .ok_or_else(|| SfcError::Logic(format!("unknown sector #{}", id)))
    }

    pub(crate) fn sector_mut(&mut self, id: SectorId) -> SfcResult<&mut Sector> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.sectors[i]),
            None => Err(SfcError::Logic(format!("unknown sector #{}", id))),
        }
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn find_sector(&self, country: CountryId, code: &str) -> Option<SectorId> {
        self.sectors
            .iter()
            .find(|s| s.country() == country && s.code() == code)
            .map(|s| s.id())
    }

    /// Sectors of one country, in registration order
    pub(crate) fn sectors_in_country(&self, country: CountryId) -> Vec<SectorId> {
        self.countries
            .get(country.index())
            .map(|c| c.sectors.clone())
            .unwrap_or_default()
    }

    /// Sectors of every country sharing `country`'s currency
    pub(crate) fn sectors_in_zone(&self, country: CountryId) -> SfcResult<Vec<SectorId>> {
        let zone = self.currency_zone(country)?;
        Ok(zone
            .countries
            .iter()
            .flat_map(|c| self.sectors_in_country(*c))
            .collect())
    }

    /// First government-type sector of a country
    pub(crate) fn find_government(&self, country: CountryId) -> Option<SectorId> {
        self.sectors_in_country(country).into_iter().find(|id| {
            self.sector(*id)
                .map(|s| s.kind.is_government())
                .unwrap_or(false)
        })
    }

    fn ensure_building(&self) -> SfcResult<()> {
        if self.final_equations.is_some() {
            return Err(SfcError::Logic(
                "the model has already been finalised".to_string(),
            ));
        }
        Ok(())
    }

    // ---- sector-level operations ----

    pub fn add_variable(&mut self, id: SectorId, name: &str, description: &str, rhs: &str) -> SfcResult<()> {
        self.sector_mut(id)?.add_variable(name, description, rhs)
    }

    pub fn set_equation_rhs(&mut self, id: SectorId, name: &str, rhs: &str) -> SfcResult<()> {
        self.sector_mut(id)?.set_equation_rhs(name, rhs)
    }

    pub fn add_term_to_equation(&mut self, id: SectorId, name: &str, term: &str) -> SfcResult<()> {
        self.sector_mut(id)?.add_term_to_equation(name, term)
    }

    /// `name = base(k-1)`, kept verbatim so the lag survives term merging
    pub(crate) fn add_lagged_variable(
        &mut self,
        id: SectorId,
        name: &str,
        base: &str,
        description: &str,
    ) -> SfcResult<()> {
        let mut eq = Equation::new(name, description);
        eq.add_term(Term::blob(&format!("{}(k-1)", base)))?;
        self.sector_mut(id)?.add_equation(eq)
    }

    /// Add a signed cash flow to a sector's `F` and, unless excluded, `INC`.
    ///
    /// Exclusions are looked up now: one registered later does not remove
    /// this flow from `INC`. With `rhs`, the flow's variable is defined if
    /// the sector does not define it yet.
    pub fn add_cash_flow(
        &mut self,
        id: SectorId,
        term: &str,
        rhs: Option<&str>,
        description: Option<&str>,
        is_income: bool,
    ) -> SfcResult<()> {
        let parsed = Term::parse(term)?;
        let excluded = self
            .income_exclusions
            .contains(&(id, parsed.symbol.clone()));
        let sector = self.sector_mut(id)?;
        if !sector.has_f() {
            return Err(SfcError::Logic(format!(
                "{} has no financial assets to receive cash flow '{}'",
                sector.code(),
                term
            )));
        }
        if let Some(rhs) = rhs {
            if parsed.is_simple && !parsed.symbol.is_empty() && !sector.defines(&parsed.symbol) {
                sector.add_variable(&parsed.symbol, description.unwrap_or(""), rhs)?;
            }
        }
        sector.add_term_to_equation("F", term)?;
        if is_income && !excluded {
            sector.add_term_to_equation("INC", term)?;
        }
        Ok(())
    }

    /// Stop a local cash-flow variable from counting as income
    pub fn add_income_exclusion(&mut self, id: SectorId, local: &str) -> SfcResult<()> {
        self.sector(id)?;
        self.income_exclusions.insert((id, local.to_string()));
        Ok(())
    }

    /// Decorated name of a sector variable, or a temporary alias if the
    /// sector's full code is not known yet
    pub fn get_variable_name(&mut self, id: SectorId, local: &str) -> SfcResult<String> {
        validate_local_name(local)?;
        if let Some(name) = self.sector(id)?.decorated(local) {
            return Ok(name);
        }
        let alias = format!("_{}{}{}", id, DELIMITER, local);
        self.aliases.insert(alias.clone(), (id, local.to_string()));
        Ok(alias)
    }

    /// `WGT_{code} = eqn` and `DEM_{code} = F*WGT_{code}` per entry; the
    /// residual asset's weight is one minus the others
    pub fn generate_asset_weighting(
        &mut self,
        id: SectorId,
        weights: &[(&str, &str)],
        residual: &str,
    ) -> SfcResult<()> {
        let mut residual_terms = vec!["1.0".to_string()];
        for (code, eqn) in weights {
            let wgt = format!("WGT_{}", code);
            self.add_variable(id, &wgt, &format!("Asset weight for {}", code), eqn)?;
            self.add_variable(
                id,
                &format!("DEM_{}", code),
                &format!("Demand for {}", code),
                &format!("F*{}", wgt),
            )?;
            residual_terms.push(format!("-{}", wgt));
        }
        let wgt = format!("WGT_{}", residual);
        self.add_variable(
            id,
            &wgt,
            &format!("Asset weight for {} (residual)", residual),
            &create_equation_from_terms(&residual_terms),
        )?;
        self.add_variable(
            id,
            &format!("DEM_{}", residual),
            &format!("Demand for {}", residual),
            &format!("F*{}", wgt),
        )
    }

    // ---- model-level registrations ----

    /// Replace a sector variable by an exogenous series (`20`, `[20]*5 + [25]*10`).
    /// The sector must already define `local`.
    pub fn add_exogenous(&mut self, id: SectorId, local: &str, rhs: &str) -> SfcResult<()> {
        validate_local_name(local)?;
        let sector = self.sector(id)?;
        if !sector.defines(local) {
            return Err(SfcError::Name(format!(
                "{} has no variable '{}' to make exogenous",
                sector.code(),
                local
            )));
        }
        self.exogenous.retain(|(s, l, _)| !(*s == id && l == local));
        self.exogenous.push((id, local.to_string(), rhs.to_string()));
        Ok(())
    }

    pub fn add_initial_condition(&mut self, id: SectorId, local: &str, rhs: &str) -> SfcResult<()> {
        validate_local_name(local)?;
        self.sector(id)?;
        self.initial_conditions
            .push((id, local.to_string(), rhs.to_string()));
        Ok(())
    }

    /// An equation outside every sector; its name is used undecorated
    pub fn add_global_equation(&mut self, name: &str, description: &str, rhs: &str) -> SfcResult<()> {
        validate_variable_name(name)?;
        if name.contains(DELIMITER) {
            return Err(SfcError::Logic(format!(
                "global variable '{}' may not contain '{}'",
                name, DELIMITER
            )));
        }
        self.global_equations
            .push(Equation::with_rhs(name, description, rhs));
        Ok(())
    }

    pub fn register_function<F>(&mut self, name: &str, func: F) -> SfcResult<()>
    where
        F: Fn(&[f64]) -> Result<f64, EvalError> + Send + Sync + 'static,
    {
        self.functions.register(name, func)
    }

    pub fn set_max_time(&mut self, max_time: usize) {
        self.max_time = max_time;
    }

    pub fn max_time(&self) -> usize {
        self.max_time
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver_config
    }

    pub fn solver_config_mut(&mut self) -> &mut SolverConfig {
        &mut self.solver_config
    }

    /// Drop index 0 from [`get_time_series`](Self::get_time_series) output
    pub fn set_skip_first_point(&mut self, skip: bool) {
        self.skip_first_point = skip;
    }

    // ---- lifecycle ----

    /// Finalise the model (first call only) and solve it
    pub fn main(&mut self) -> SfcResult<()> {
        if self.final_equations.is_none() {
            self.assign_full_codes()?;
            let ids: Vec<SectorId> = self.sectors.iter().map(|s| s.id()).collect();
            for id in ids {
                self.generate_sector(id)?;
            }
            self.process_transfers()?;
            let text = self.emit_equations()?;
            info!(
                target: "sfc::model",
                "finalised {} sectors in {} countries",
                self.sectors.len(),
                self.countries.len()
            );
            self.final_equations = Some(text);
        }

        let text = self.final_equations.clone().unwrap_or_default();
        self.time_series = TimeSeries::new();
        let mut solver =
            EquationSolver::new(&text, self.functions.clone(), self.solver_config.clone())?;
        let result = solver.solve();
        self.solver_config.initial_equilibrium = solver.config().initial_equilibrium;
        result?;
        self.time_series = solver.time_series();
        Ok(())
    }

    fn assign_full_codes(&mut self) -> SfcResult<()> {
        let prefixed = self.countries.len() > 1 || self.external.is_some();
        let mut seen = HashSet::new();
        for i in 0..self.sectors.len() {
            let country = &self.countries[self.sectors[i].country().index()];
            let code = self.sectors[i].code();
            let full = if prefixed {
                format!("{}_{}", country.code, code)
            } else {
                code.to_string()
            };
            if !seen.insert(full.clone()) {
                return Err(SfcError::Logic(format!("duplicate sector full code '{}'", full)));
            }
            self.sectors[i].set_full_code(full);
        }
        Ok(())
    }

    fn generate_sector(&mut self, id: SectorId) -> SfcResult<()> {
        let kind = self.sector(id)?.kind.clone();
        match kind {
            SectorKind::Generic | SectorKind::Household { .. } => Ok(()),
            SectorKind::Business { .. } => self.generate_business(id),
            SectorKind::Government(GovernmentRole::GoldStandard) => self.generate_gold_government(id),
            SectorKind::Government(_) => Ok(()),
            SectorKind::CentralBank { treasury, gold } => {
                self.generate_central_bank(id, treasury)?;
                if gold {
                    self.generate_gold_central_bank(id)?;
                }
                Ok(())
            }
            SectorKind::TaxFlow { receiver } => self.generate_tax_flow(id, receiver),
            SectorKind::Market(spec) => self.generate_market(id, &spec),
            SectorKind::ExchangeRates => self.generate_exchange_rates(id),
            SectorKind::ForexTransactions => self.generate_forex(id),
        }
    }

    fn decorated(&self, id: SectorId, local: &str) -> SfcResult<String> {
        self.sector(id)?.decorated(local).ok_or_else(|| {
            SfcError::Logic(format!("sector #{} has no full code yet", id))
        })
    }

    /// Render the full equation block as solver input
    fn emit_equations(&self) -> SfcResult<String> {
        let mut alias_lookup = HashMap::new();
        for (alias, (id, local)) in &self.aliases {
            alias_lookup.insert(alias.clone(), self.decorated(*id, local)?);
        }
        let exogenous: HashSet<(SectorId, &str)> = self
            .exogenous
            .iter()
            .map(|(id, local, _)| (*id, local.as_str()))
            .collect();

        let mut out = String::new();
        let mut sector_lookups = HashMap::new();
        for sector in &self.sectors {
            let full = sector.full_code().unwrap_or_else(|| sector.code());
            let mut lookup = alias_lookup.clone();
            for local in sector.equations().names() {
                lookup.insert(local.to_string(), decorated_name(full, local));
            }
            let _ = writeln!(out, "# {}: {}", full, sector.description());
            for eq in sector.equations().iter() {
                if exogenous.contains(&(sector.id(), eq.lhs.as_str())) {
                    continue;
                }
                let rhs = replace_tokens_from_lookup(&eq.rhs(), &lookup);
                push_line(&mut out, &decorated_name(full, &eq.lhs), &rhs, &eq.description);
            }
            sector_lookups.insert(sector.id(), lookup);
        }

        if !self.global_equations.is_empty() {
            let _ = writeln!(out, "# Global equations");
            for eq in &self.global_equations {
                let rhs = replace_tokens_from_lookup(&eq.rhs(), &alias_lookup);
                push_line(&mut out, &eq.lhs, &rhs, &eq.description);
            }
        }

        if !self.initial_conditions.is_empty() {
            let _ = writeln!(out, "# Initial conditions");
            for (id, local, rhs) in &self.initial_conditions {
                let rhs = replace_tokens_from_lookup(rhs, &sector_lookups[id]);
                let _ = writeln!(out, "{}(0) = {}", self.decorated(*id, local)?, rhs);
            }
        }

        let _ = writeln!(out, "exogenous");
        for (id, local, rhs) in &self.exogenous {
            let rhs = replace_tokens_from_lookup(rhs, &sector_lookups[id]);
            let _ = writeln!(out, "{} = {}", self.decorated(*id, local)?, rhs);
        }
        let _ = writeln!(out, "{} = {}", MAX_TIME, self.max_time);
        Ok(out)
    }

    // ---- results ----

    /// Equation text produced by the first [`main`](Self::main) call
    pub fn final_equations(&self) -> Option<&str> {
        self.final_equations.as_deref()
    }

    pub fn time_series(&self) -> &TimeSeries {
        &self.time_series
    }

    /// One solved series, optionally truncated after index `cutoff`
    pub fn get_time_series(&self, name: &str, cutoff: Option<usize>) -> SfcResult<Vec<f64>> {
        let series = self
            .time_series
            .get(name)
            .ok_or_else(|| SfcError::Name(format!("no time series for '{}'", name)))?;
        let end = match cutoff {
            Some(c) => (c + 1).min(series.len()),
            None => series.len(),
        };
        let start = if self.skip_first_point { 1.min(end) } else { 0 };
        Ok(series[start..end].to_vec())
    }

    /// Decorated series of a sector variable
    pub fn sector_series(&self, id: SectorId, local: &str) -> SfcResult<Vec<f64>> {
        let name = self.decorated(id, local)?;
        self.get_time_series(&name, None)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P, format: &ExportFormat) -> SfcResult<()> {
        self.time_series.write_csv(path, format)
    }

    /// Write the final equation text to a plain-text log
    pub fn write_equation_log<P: AsRef<Path>>(&self, path: P) -> SfcResult<()> {
        let text = self.final_equations.as_deref().ok_or_else(|| {
            SfcError::Logic("equations are only available after main()".to_string())
        })?;
        fs::write(path.as_ref(), text)?;
        info!(target: "sfc::model", "equation log written to {}", path.as_ref().display());
        Ok(())
    }
}

fn push_line(out: &mut String, lhs: &str, rhs: &str, description: &str) {
    if description.is_empty() {
        let _ = writeln!(out, "{} = {}", lhs, rhs);
    } else {
        let _ = writeln!(out, "{} = {}  # {}", lhs, rhs, description.replace('\n', " "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn one_country() -> (Model, CountryId) {
        let mut model = Model::new();
        let country = model.add_country("CA", "Canada", "CAD").unwrap();
        (model, country)
    }

    #[test]
    fn test_full_codes() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "a", SectorKind::Generic, false).unwrap();
        model.assign_full_codes().unwrap();
        assert_eq!(model.sector(a).unwrap().full_code(), Some("A"));

        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let us = model.add_country("US", "United States", "USD").unwrap();
        let a = model.add_sector(ca, "HH", "", SectorKind::Generic, false).unwrap();
        let b = model.add_sector(us, "HH", "", SectorKind::Generic, false).unwrap();
        model.assign_full_codes().unwrap();
        assert_eq!(model.sector(a).unwrap().full_code(), Some("CA_HH"));
        assert_eq!(model.sector(b).unwrap().full_code(), Some("US_HH"));
    }

    #[test]
    fn test_duplicate_full_codes() {
        let (mut model, ca) = one_country();
        model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        assert!(matches!(model.main(), Err(SfcError::Logic(_))));
    }

    #[test]
    fn test_alias_resolution() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        let b = model.add_sector(ca, "B", "", SectorKind::Generic, false).unwrap();
        model.add_variable(a, "x", "", "2").unwrap();
        let alias = model.get_variable_name(a, "x").unwrap();
        assert_eq!(alias, format!("_{}__x", a));
        model.add_variable(b, "y", "", &format!("3*{}", alias)).unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let text = model.final_equations().unwrap();
        assert!(text.contains("B__y = 3*A__x"), "{}", text);
        assert_eq!(model.get_time_series("B__y", None).unwrap(), vec![6.0, 6.0, 6.0]);
        // Known full codes give the decorated name directly
        assert_eq!(model.get_variable_name(b, "y").unwrap(), "B__y");
    }

    #[test]
    fn test_cash_flows_and_income_exclusions() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, true).unwrap();
        model.add_cash_flow(a, "+WAGE", Some("10"), Some("Wages"), true).unwrap();
        model.add_income_exclusion(a, "GIFT").unwrap();
        model.add_cash_flow(a, "-GIFT", Some("4"), None, true).unwrap();
        // Registered after the flow: does not apply retroactively
        model.add_income_exclusion(a, "WAGE").unwrap();
        let sector = model.sector(a).unwrap();
        assert_eq!(sector.equation("F").unwrap().rhs(), "LAG_F+WAGE-GIFT");
        assert_eq!(sector.equation("INC").unwrap().rhs(), "WAGE");
        assert_eq!(sector.equation("WAGE").unwrap().description, "Wages");

        model.set_max_time(3);
        model.main().unwrap();
        assert_eq!(model.get_time_series("A__F", None).unwrap(), vec![0.0, 6.0, 12.0, 18.0]);
    }

    #[test]
    fn test_cash_flow_requires_financial_assets() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        assert!(matches!(
            model.add_cash_flow(a, "x", Some("1"), None, true),
            Err(SfcError::Logic(_))
        ));
    }

    #[test]
    fn test_exogenous_overrides_equation() {
        let (mut model, ca) = one_country();
        let g = model.add_sector(ca, "GOV", "", SectorKind::Generic, false).unwrap();
        model.add_variable(g, "DEM", "", "0.0").unwrap();
        model.add_variable(g, "TWICE", "", "2*DEM").unwrap();
        model.add_exogenous(g, "DEM", "[1, 2, 3]").unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let text = model.final_equations().unwrap();
        assert!(!text.contains("GOV__DEM = 0.0"));
        assert!(text.contains("exogenous\nGOV__DEM = [1, 2, 3]\n"), "{}", text);
        assert!(text.ends_with("MaxTime = 2\n"));
        assert_eq!(model.get_time_series("GOV__TWICE", None).unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_exogenous_needs_defined_variable() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        model.add_variable(a, "y", "", "2*G").unwrap();
        match model.add_exogenous(a, "G", "10") {
            Err(SfcError::Name(msg)) => assert!(msg.contains("'G'") && msg.contains('A'), "{}", msg),
            other => panic!("Expected name error, got {:?}", other),
        }
        model.add_variable(a, "G", "", "0.0").unwrap();
        model.add_exogenous(a, "G", "10").unwrap();
    }

    #[test]
    fn test_initial_conditions_and_series_access() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, true).unwrap();
        model.add_cash_flow(a, "FLOW", Some("1"), None, true).unwrap();
        model.add_initial_condition(a, "F", "10").unwrap();
        model.set_max_time(3);
        model.main().unwrap();
        assert_eq!(model.get_time_series("A__F", None).unwrap(), vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(model.get_time_series("A__F", Some(1)).unwrap(), vec![10.0, 11.0]);
        model.set_skip_first_point(true);
        assert_eq!(model.get_time_series("A__F", Some(2)).unwrap(), vec![11.0, 12.0]);
        assert_eq!(model.sector_series(a, "F").unwrap(), vec![11.0, 12.0, 13.0]);
        assert!(matches!(model.get_time_series("nope", None), Err(SfcError::Name(_))));
    }

    #[test]
    fn test_global_equation() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        model.add_variable(a, "x", "", "k").unwrap();
        let x = model.get_variable_name(a, "x").unwrap();
        model
            .add_global_equation("year", "Calendar year", &format!("2000 + {}", x))
            .unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        assert_eq!(model.get_time_series("year", None).unwrap(), vec![2000.0, 2001.0, 2002.0]);
        assert!(model.add_global_equation("A__z", "", "1").is_err());
    }

    #[test]
    fn test_rerun_only_resolves() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        model.add_variable(a, "x", "", "0.5*x + 1").unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let first = model.final_equations().unwrap().to_string();
        model.main().unwrap();
        assert_eq!(model.final_equations().unwrap(), first);
        assert_relative_eq!(model.time_series().last("A__x").unwrap(), 2.0, max_relative = 1e-4);
        assert!(model.add_sector(ca, "B", "", SectorKind::Generic, false).is_err());
    }

    #[test]
    fn test_asset_weighting() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "HH", "", SectorKind::Generic, true).unwrap();
        model
            .generate_asset_weighting(a, &[("DEP", "0.3")], "MON")
            .unwrap();
        let s = model.sector(a).unwrap();
        assert_eq!(s.equation("WGT_MON").unwrap().rhs(), "1-WGT_DEP");
        assert_eq!(s.equation("DEM_DEP").unwrap().rhs(), "F*WGT_DEP");
        assert_eq!(s.equation("DEM_MON").unwrap().rhs(), "F*WGT_MON");
    }

    #[test]
    fn test_equation_log() {
        let (mut model, ca) = one_country();
        let a = model.add_sector(ca, "A", "", SectorKind::Generic, false).unwrap();
        model.add_variable(a, "x", "", "1").unwrap();
        assert!(model.write_equation_log("unused.txt").is_err());
        model.set_max_time(1);
        model.main().unwrap();
        let path = std::env::temp_dir().join(format!("sfc_equation_log_{}.txt", a));
        model.write_equation_log(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("A__x = 1"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_currency_zones() {
        let mut model = Model::new();
        let a = model.add_country("DE", "", "EUR").unwrap();
        let b = model.add_country("US", "", "USD").unwrap();
        let c = model.add_country("FR", "", "EUR").unwrap();
        let zone = model.currency_zone(a).unwrap();
        assert_eq!(zone.countries, vec![a, c]);
        assert!(!zone.contains(b));
        assert_eq!(model.currency_zones().len(), 2);
    }
}
