//! Household sectors: consumption out of disposable income and wealth

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{SectorId, SectorKind};
use crate::error::SfcResult;

impl Model {
    /// Household consuming `alpha_income` of after-tax income and
    /// `alpha_fin` of last period's wealth, supplying labour
    pub fn add_household(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        alpha_income: f64,
        alpha_fin: f64,
    ) -> SfcResult<SectorId> {
        let id = self.household_base(country, code, description, alpha_income, alpha_fin, false)?;
        self.add_variable(
            id,
            "DEM_GOOD",
            "Expenditure on goods consumption",
            "AlphaIncome*AfterTax + AlphaFin*LAG_F",
        )?;
        Ok(id)
    }

    /// Household whose consumption follows expected after-tax income,
    /// taken as last period's realised value
    pub fn add_household_with_expectations(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        alpha_income: f64,
        alpha_fin: f64,
    ) -> SfcResult<SectorId> {
        let id = self.household_base(country, code, description, alpha_income, alpha_fin, false)?;
        self.add_lagged_variable(id, "LAG_AfterTax", "AfterTax", "Previous after-tax income")?;
        self.add_variable(
            id,
            "EXP_AfterTax",
            "Expected after-tax income",
            "LAG_AfterTax",
        )?;
        self.add_variable(
            id,
            "DEM_GOOD",
            "Expenditure on goods consumption",
            "AlphaIncome*EXP_AfterTax + AlphaFin*LAG_F",
        )?;
        Ok(id)
    }

    /// Household that also receives business dividends
    pub fn add_capitalists(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        alpha_income: f64,
        alpha_fin: f64,
    ) -> SfcResult<SectorId> {
        let id = self.household_base(country, code, description, alpha_income, alpha_fin, true)?;
        self.add_variable(
            id,
            "DEM_GOOD",
            "Expenditure on goods consumption",
            "AlphaIncome*AfterTax + AlphaFin*LAG_F",
        )?;
        Ok(id)
    }

    fn household_base(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        alpha_income: f64,
        alpha_fin: f64,
        receives_dividends: bool,
    ) -> SfcResult<SectorId> {
        let kind = SectorKind::Household { receives_dividends };
        let id = self.add_sector(country, code, description, kind, true)?;
        self.add_variable(
            id,
            "AlphaIncome",
            "Parameter for consumption out of income",
            &alpha_income.to_string(),
        )?;
        self.add_variable(
            id,
            "AlphaFin",
            "Parameter for consumption out of financial assets",
            &alpha_fin.to_string(),
        )?;
        self.add_income_exclusion(id, "T")?;
        self.add_income_exclusion(id, "DEM_GOOD")?;
        self.add_cash_flow(id, "-T", Some("0.0"), Some("Taxes paid"), true)?;
        self.add_variable(id, "AfterTax", "Income after taxes", "INC - T")?;
        self.add_variable(id, "SUP_LAB", "Supply of labour", "0.0")?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> (Model, CountryId) {
        let mut model = Model::new();
        let country = model.add_country("CA", "Canada", "CAD").unwrap();
        (model, country)
    }

    #[test]
    fn test_household_equations() {
        let (mut model, ca) = model();
        let hh = model.add_household(ca, "HH", "Household", 0.6, 0.4).unwrap();
        let s = model.sector(hh).unwrap();
        assert_eq!(s.equation("AlphaIncome").unwrap().rhs(), "0.6");
        assert_eq!(s.equation("AfterTax").unwrap().rhs(), "INC-T");
        assert_eq!(s.equation("DEM_GOOD").unwrap().rhs(), "AlphaIncome*AfterTax+AlphaFin*LAG_F");
        assert_eq!(s.equation("F").unwrap().rhs(), "LAG_F-T");
        assert_eq!(s.equation("INC").unwrap().rhs(), "0.0");
        assert!(!s.kind.is_business());
        assert!(s.kind.is_household());
    }

    #[test]
    fn test_household_with_expectations() {
        let (mut model, ca) = model();
        let hh = model
            .add_household_with_expectations(ca, "HH", "Household", 0.6, 0.4)
            .unwrap();
        let s = model.sector(hh).unwrap();
        assert_eq!(s.equation("LAG_AfterTax").unwrap().rhs(), "AfterTax(k-1)");
        assert_eq!(
            s.equation("DEM_GOOD").unwrap().rhs(),
            "AlphaIncome*EXP_AfterTax+AlphaFin*LAG_F"
        );
    }

    #[test]
    fn test_wealth_accumulates_saving() {
        let (mut model, ca) = model();
        let hh = model.add_household(ca, "HH", "Household", 0.5, 0.0).unwrap();
        // A goods market would register the consumption outflow
        model.add_cash_flow(hh, "-DEM_GOOD", None, None, true).unwrap();
        model.add_cash_flow(hh, "+GIFT", Some("10"), None, true).unwrap();
        model.set_max_time(3);
        model.main().unwrap();
        // Income 10, consumption 5 per period
        let f = model.sector_series(hh, "F").unwrap();
        assert_eq!(f, vec![0.0, 5.0, 10.0, 15.0]);
        let c = model.sector_series(hh, "DEM_GOOD").unwrap();
        assert_eq!(&c[1..], &[5.0, 5.0, 5.0]);
    }
}
