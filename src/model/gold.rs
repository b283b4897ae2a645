//! Gold standard: a central bank gold stock and a government whose
//! spending responds to gold cover

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{GovernmentRole, SectorId, SectorKind};
use crate::error::SfcResult;

impl Model {
    /// Government spending `base_spending`, raised by `response` per unit of
    /// last period's gold cover above `target_cover`
    pub fn add_gold_standard_government(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        base_spending: f64,
        response: f64,
        target_cover: f64,
    ) -> SfcResult<SectorId> {
        let id = self.government_base(country, code, description, GovernmentRole::GoldStandard)?;
        self.add_variable(id, "BaseSpending", "Spending at target cover", &base_spending.to_string())?;
        self.add_variable(id, "SpendingResponse", "Spending response to cover", &response.to_string())?;
        self.add_variable(id, "TargetCover", "Desired gold cover ratio", &target_cover.to_string())?;
        self.add_variable(id, "COVER", "Gold cover ratio", "TargetCover")?;
        self.add_lagged_variable(id, "LAG_COVER", "COVER", "Previous gold cover ratio")?;
        self.set_equation_rhs(
            id,
            "DEM_GOOD",
            "BaseSpending*(1+SpendingResponse*(LAG_COVER-TargetCover))",
        )?;
        Ok(id)
    }

    /// Central bank holding `initial_gold` against the money it issues
    pub fn add_gold_standard_central_bank(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        treasury: Option<SectorId>,
        initial_gold: f64,
        min_money: f64,
    ) -> SfcResult<SectorId> {
        let id = self.central_bank_base(country, code, description, treasury, true)?;
        self.add_lagged_variable(id, "LAG_GOLD", "GOLD", "Previous gold stock")?;
        self.add_variable(id, "GOLD_INFLOW", "Gold received in settlement", "0.0")?;
        self.add_variable(id, "GOLD", "Gold stock", "LAG_GOLD + GOLD_INFLOW")?;
        self.add_variable(id, "MinMoney", "Floor on money supply for the cover ratio", &min_money.to_string())?;
        self.add_variable(id, "COVER", "Gold cover ratio", "GOLD/max(SUP_MON, MinMoney)")?;
        self.add_initial_condition(id, "GOLD", &initial_gold.to_string())?;
        Ok(id)
    }

    /// Read the cover ratio from the country's gold standard central bank
    pub(super) fn generate_gold_government(&mut self, id: SectorId) -> SfcResult<()> {
        let country = self.sector(id)?.country();
        let bank = self.sectors_in_country(country).into_iter().find(|s| {
            matches!(
                self.sector(*s).map(|s| &s.kind),
                Ok(SectorKind::CentralBank { gold: true, .. })
            )
        });
        if let Some(bank) = bank {
            let cover = self.get_variable_name(bank, "COVER")?;
            self.set_equation_rhs(id, "COVER", &cover)?;
        }
        Ok(())
    }

    /// Settle the currency's net external position in gold
    pub(super) fn generate_gold_central_bank(&mut self, id: SectorId) -> SfcResult<()> {
        let Some(fx) = self.external.as_ref().map(|e| e.fx) else {
            return Ok(());
        };
        let country = self.sector(id)?.country();
        let currency = self.country(country)?.currency.clone();
        let net = self.get_variable_name(fx, &format!("NET_{}", currency))?;
        self.set_equation_rhs(id, "GOLD_INFLOW", &format!("-{}", net))
    }
}
