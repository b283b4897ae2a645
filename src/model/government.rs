//! Government sectors and the treasury/central bank pairing

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{GovernmentRole, SectorId, SectorKind};
use crate::error::{SfcError, SfcResult};

impl Model {
    /// Government that buys goods and collects taxes; `FISCBAL = INC`
    pub fn add_do_nothing_government(&mut self, country: CountryId, code: &str, description: &str) -> SfcResult<SectorId> {
        self.government_base(country, code, description, GovernmentRole::DoNothing)
    }

    /// Government and central bank in one sector
    pub fn add_consolidated_government(&mut self, country: CountryId, code: &str, description: &str) -> SfcResult<SectorId> {
        let id = self.government_base(country, code, description, GovernmentRole::Consolidated)?;
        self.add_variable(id, "DEBT", "Government debt", "-F")?;
        Ok(id)
    }

    /// Fiscal arm; debt held by the central bank is filled in by the
    /// paired [`add_central_bank`](Self::add_central_bank)
    pub fn add_treasury(&mut self, country: CountryId, code: &str, description: &str) -> SfcResult<SectorId> {
        let id = self.government_base(country, code, description, GovernmentRole::Treasury)?;
        self.add_variable(id, "DEBT", "Government debt", "-F")?;
        self.add_variable(id, "DEBT_CB", "Government debt held by the central bank", "0.0")?;
        Ok(id)
    }

    /// Central bank issuing money; with a treasury it holds government debt
    /// matching the money supply
    pub fn add_central_bank(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        treasury: Option<SectorId>,
    ) -> SfcResult<SectorId> {
        self.central_bank_base(country, code, description, treasury, false)
    }

    pub(super) fn central_bank_base(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        treasury: Option<SectorId>,
        gold: bool,
    ) -> SfcResult<SectorId> {
        if let Some(t) = treasury {
            let sector = self.sector(t)?;
            if !matches!(sector.kind, SectorKind::Government(GovernmentRole::Treasury)) {
                return Err(SfcError::Logic(format!(
                    "{} is not a treasury",
                    sector.code()
                )));
            }
        }
        let kind = SectorKind::CentralBank { treasury, gold };
        let id = self.add_sector(country, code, description, kind, true)?;
        self.add_variable(id, "SUP_MON", "Money supply", "0.0")?;
        Ok(id)
    }

    pub(super) fn government_base(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        role: GovernmentRole,
    ) -> SfcResult<SectorId> {
        let id = self.add_sector(country, code, description, SectorKind::Government(role), true)?;
        self.add_variable(id, "DEM_GOOD", "Government consumption", "0.0")?;
        self.add_variable(id, "FISCBAL", "Fiscal balance", "INC")?;
        Ok(id)
    }

    pub(super) fn generate_central_bank(&mut self, id: SectorId, treasury: Option<SectorId>) -> SfcResult<()> {
        let Some(treasury) = treasury else {
            return Ok(());
        };
        self.add_variable(id, "GOVDEBT", "Government debt held", "SUP_MON")?;
        let held = self.get_variable_name(id, "GOVDEBT")?;
        self.set_equation_rhs(treasury, "DEBT_CB", &held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_government_equations() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let gov = model.add_do_nothing_government(ca, "GOV", "Government").unwrap();
        let s = model.sector(gov).unwrap();
        assert_eq!(s.equation("DEM_GOOD").unwrap().rhs(), "0.0");
        assert_eq!(s.equation("FISCBAL").unwrap().rhs(), "INC");
        assert!(!s.defines("DEBT"));
        assert!(s.kind.is_government());

        let cons = model.add_consolidated_government(ca, "CG", "").unwrap();
        assert_eq!(model.sector(cons).unwrap().equation("DEBT").unwrap().rhs(), "-F");
    }

    #[test]
    fn test_central_bank_needs_treasury() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let gov = model.add_do_nothing_government(ca, "GOV", "").unwrap();
        assert!(matches!(
            model.add_central_bank(ca, "CB", "", Some(gov)),
            Err(SfcError::Logic(_))
        ));
    }

    #[test]
    fn test_treasury_debt_follows_money() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let tre = model.add_treasury(ca, "TRE", "Treasury").unwrap();
        let cb = model.add_central_bank(ca, "CB", "Central bank", Some(tre)).unwrap();
        let hh = model.add_household(ca, "HH", "", 0.0, 0.0).unwrap();
        model.add_cash_flow(hh, "+GIFT", Some("3"), None, true).unwrap();
        model.add_money_market(ca, cb).unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let text = model.final_equations().unwrap();
        assert!(text.contains("TRE__DEBT_CB = CB__GOVDEBT"), "{}", text);
        assert_relative_eq!(model.time_series().last("TRE__DEBT_CB").unwrap(), 6.0);
        assert_relative_eq!(model.time_series().last("CB__SUP_MON").unwrap(), 6.0);
    }
}
