//! Fixed-margin businesses: hire labour to produce, pay out all profit

use log::warn;

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{SectorId, SectorKind};
use crate::equations::names::create_equation_from_terms;
use crate::error::SfcResult;

impl Model {
    /// Business selling `output` and buying `labour` at a fixed profit margin
    pub fn add_fixed_margin_business(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        profit_margin: f64,
        output: &str,
        labour: &str,
    ) -> SfcResult<SectorId> {
        let kind = SectorKind::Business {
            outputs: vec![output.to_string()],
            labour: labour.to_string(),
        };
        let id = self.add_sector(country, code, description, kind, true)?;
        let supply = format!("SUP_{}", output);
        self.add_variable(id, &supply, &format!("Supply of {}", output), "0.0")?;
        self.business_base(id, profit_margin, labour, &supply)?;
        Ok(id)
    }

    /// Fixed-margin business producing for several markets; labour demand
    /// follows total supply
    pub fn add_fixed_margin_business_multi_output(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        profit_margin: f64,
        outputs: &[&str],
        labour: &str,
    ) -> SfcResult<SectorId> {
        let kind = SectorKind::Business {
            outputs: outputs.iter().map(|o| o.to_string()).collect(),
            labour: labour.to_string(),
        };
        let id = self.add_sector(country, code, description, kind, true)?;
        let mut terms = Vec::new();
        for output in outputs {
            let supply = format!("SUP_{}", output);
            self.add_variable(id, &supply, &format!("Supply of {}", output), "0.0")?;
            terms.push(supply);
        }
        self.add_variable(
            id,
            "TOTAL_SUP",
            "Total supply across markets",
            &create_equation_from_terms(&terms),
        )?;
        self.business_base(id, profit_margin, labour, "TOTAL_SUP")?;
        Ok(id)
    }

    fn business_base(&mut self, id: SectorId, profit_margin: f64, labour: &str, supply: &str) -> SfcResult<()> {
        self.add_variable(id, "ProfitMargin", "Profit margin", &profit_margin.to_string())?;
        self.add_variable(
            id,
            &format!("DEM_{}", labour),
            "Demand for labour",
            &format!("(1-ProfitMargin)*{}", supply),
        )?;
        self.add_variable(id, "PROF", "Profits", "INC")?;
        self.add_income_exclusion(id, "DIV")?;
        self.add_cash_flow(id, "-DIV", Some("PROF"), Some("Dividends paid"), true)
    }

    /// Route dividends to the country's capitalists, or its first household
    pub(super) fn generate_business(&mut self, id: SectorId) -> SfcResult<()> {
        let country = self.sector(id)?.country();
        let candidates = self.sectors_in_country(country);
        let mut recipient = None;
        for want_capitalists in [true, false] {
            recipient = candidates.iter().copied().find(|c| {
                matches!(
                    self.sector(*c).map(|s| &s.kind),
                    Ok(SectorKind::Household { receives_dividends }) if *receives_dividends || !want_capitalists
                )
            });
            if recipient.is_some() {
                break;
            }
        }

        let Some(recipient) = recipient else {
            warn!(
                target: "sfc::model",
                "{}: no household to receive dividends, profits are retained",
                self.sector(id)?.code()
            );
            return self.set_equation_rhs(id, "DIV", "0.0");
        };

        let div = self.get_variable_name(id, "DIV")?;
        if self.sector(recipient)?.defines("DIV") {
            self.add_term_to_equation(recipient, "DIV", &div)
        } else {
            self.add_cash_flow(recipient, "+DIV", Some(&div), Some("Dividends received"), true)
        }
    }
}
