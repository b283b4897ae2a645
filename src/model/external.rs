//! The external sector: exchange rates, forex settlement and transfers
//!
//! Exchange rates are quoted against a synthetic numeraire. Every
//! cross-currency flow is booked in the forex sector as `NET_{currency}`
//! (positive when the currency is sold), so that
//! `NUMERAIRE = Σ NET_c * XR_c` stays at zero.

use log::debug;

use super::orchestrator::Model;
use super::sector::{SectorId, SectorKind};
use crate::equations::names::create_equation_from_terms;
use crate::error::{SfcError, SfcResult};

/// Currency of the external country
pub const NUMERAIRE: &str = "NUMERAIRE";

#[derive(Debug, Clone, Copy)]
pub(crate) struct External {
    pub xr: SectorId,
    pub fx: SectorId,
}

/// A per-period payment from one sector to another
#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub source: SectorId,
    pub target: SectorId,
    pub amount: String,
}

impl Model {
    /// Create the `EXT` country with its `XR` and `FX` sectors
    pub fn add_external(&mut self) -> SfcResult<(SectorId, SectorId)> {
        if self.external.is_some() {
            return Err(SfcError::Logic("the external sector already exists".to_string()));
        }
        let country = self.add_country("EXT", "External sector", NUMERAIRE)?;
        let xr = self.add_sector(country, "XR", "Exchange rates", SectorKind::ExchangeRates, false)?;
        let fx = self.add_sector(
            country,
            "FX",
            "Foreign exchange transactions",
            SectorKind::ForexTransactions,
            false,
        )?;
        self.external = Some(External { xr, fx });
        Ok((xr, fx))
    }

    /// Value of one unit of `currency` in numeraire units
    pub fn set_exchange_rate(&mut self, currency: &str, rhs: &str) -> SfcResult<()> {
        let xr = self.external_sector()?.xr;
        self.add_variable(xr, currency, &format!("Value of {} in {}", currency, NUMERAIRE), rhs)
    }

    /// Pay `amount` (in the source's currency) from `source` to `target`
    /// every period
    pub fn send_money(&mut self, source: SectorId, target: SectorId, amount: &str) -> SfcResult<()> {
        for id in [source, target] {
            let sector = self.sector(id)?;
            if !sector.has_f() {
                return Err(SfcError::Logic(format!(
                    "{} cannot make or receive transfers without financial assets",
                    sector.code()
                )));
            }
        }
        self.transfers.push(Transfer {
            source,
            target,
            amount: amount.to_string(),
        });
        Ok(())
    }

    fn external_sector(&self) -> SfcResult<External> {
        self.external
            .ok_or_else(|| SfcError::Logic("no external sector; call add_external first".to_string()))
    }

    fn real_currencies(&self) -> Vec<String> {
        self.currency_zones()
            .into_iter()
            .map(|z| z.currency)
            .filter(|c| c != NUMERAIRE)
            .collect()
    }

    fn currency_of(&self, id: SectorId) -> SfcResult<String> {
        let country = self.sector(id)?.country();
        Ok(self.country(country)?.currency.clone())
    }

    /// Default every unset exchange rate to one
    pub(super) fn generate_exchange_rates(&mut self, id: SectorId) -> SfcResult<()> {
        for currency in self.real_currencies() {
            if !self.sector(id)?.defines(&currency) {
                self.add_variable(id, &currency, &format!("Value of {} in {}", currency, NUMERAIRE), "1.0")?;
            }
        }
        Ok(())
    }

    pub(super) fn generate_forex(&mut self, id: SectorId) -> SfcResult<()> {
        let xr = self.external_sector()?.xr;
        let mut terms = Vec::new();
        for currency in self.real_currencies() {
            let net = format!("NET_{}", currency);
            self.add_variable(id, &net, &format!("Net sales of {}", currency), "0.0")?;
            let rate = self.get_variable_name(xr, &currency)?;
            terms.push(format!("{}*{}", net, rate));
        }
        self.add_variable(
            id,
            "NUMERAIRE",
            "Net position in numeraire units",
            &create_equation_from_terms(&terms),
        )
    }

    /// Book every registered transfer; cross-currency payments are
    /// converted through the forex sector
    pub(super) fn process_transfers(&mut self) -> SfcResult<()> {
        let transfers = self.transfers.clone();
        for (n, transfer) in transfers.iter().enumerate() {
            let send = format!("SEND_{}", n);
            let recv = format!("RECV_{}", n);
            self.add_cash_flow(transfer.source, &format!("-{}", send), Some(&transfer.amount), Some("Transfer sent"), true)?;
            let sent = self.get_variable_name(transfer.source, &send)?;

            let from = self.currency_of(transfer.source)?;
            let to = self.currency_of(transfer.target)?;
            let received = if from == to {
                sent
            } else {
                let ext = self.external_sector().map_err(|_| {
                    SfcError::Logic(format!(
                        "transfer from {} to {} needs an external sector",
                        from, to
                    ))
                })?;
                let conv = format!("CONV_{}", n);
                let rate_from = self.get_variable_name(ext.xr, &from)?;
                let rate_to = self.get_variable_name(ext.xr, &to)?;
                self.add_variable(
                    ext.fx,
                    &conv,
                    &format!("Transfer {} converted to {}", n, to),
                    &format!("{}*{}/{}", sent, rate_from, rate_to),
                )?;
                self.add_term_to_equation(ext.fx, &format!("NET_{}", from), &format!("+{}", sent))?;
                self.add_term_to_equation(ext.fx, &format!("NET_{}", to), &format!("-{}", conv))?;
                debug!(target: "sfc::model", "transfer {} converted from {} to {}", n, from, to);
                self.get_variable_name(ext.fx, &conv)?
            };
            self.add_cash_flow(transfer.target, &format!("+{}", recv), Some(&received), Some("Transfer received"), true)?;
        }
        Ok(())
    }
}
