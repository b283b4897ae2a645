//! Income tax flows from households to a government

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{SectorId, SectorKind};
use crate::equations::names::create_equation_from_terms;
use crate::error::{SfcError, SfcResult};

impl Model {
    /// Tax of `rate` on household income, paid to `receiver` or the
    /// country's first government
    pub fn add_tax_flow(
        &mut self,
        country: CountryId,
        code: &str,
        description: &str,
        rate: f64,
        receiver: Option<SectorId>,
    ) -> SfcResult<SectorId> {
        if let Some(r) = receiver {
            self.sector(r)?;
        }
        let kind = SectorKind::TaxFlow { receiver };
        let id = self.add_sector(country, code, description, kind, false)?;
        self.add_variable(id, "TaxRate", "Tax rate", &rate.to_string())?;
        Ok(id)
    }

    pub(super) fn generate_tax_flow(&mut self, id: SectorId, receiver: Option<SectorId>) -> SfcResult<()> {
        let country = self.sector(id)?.country();
        let taxpayers: Vec<SectorId> = self
            .sectors_in_country(country)
            .into_iter()
            .filter(|s| self.sector(*s).map(|s| s.kind.is_household()).unwrap_or(false))
            .collect();

        let rate = self.get_variable_name(id, "TaxRate")?;
        let mut paid = Vec::with_capacity(taxpayers.len());
        for payer in &taxpayers {
            self.set_equation_rhs(*payer, "T", &format!("{}*INC", rate))?;
            paid.push(self.get_variable_name(*payer, "T")?);
        }
        self.add_variable(id, "T", "Taxes collected", &create_equation_from_terms(&paid))?;

        let receiver = match receiver.or_else(|| self.find_government(country)) {
            Some(r) => r,
            None => {
                return Err(SfcError::Logic(format!(
                    "tax flow {} has no government to receive taxes",
                    self.sector(id)?.code()
                )))
            }
        };
        let collected = self.get_variable_name(id, "T")?;
        if self.sector(receiver)?.defines("T") {
            self.add_term_to_equation(receiver, "T", &collected)
        } else {
            self.add_cash_flow(receiver, "+T", Some(&collected), Some("Tax revenue"), true)
        }
    }
}
