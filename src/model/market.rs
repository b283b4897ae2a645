//! Markets: aggregate demand in scope and allocate supply
//!
//! A market with code `X` looks for sectors defining `DEM_X` and `SUP_X`.
//! Goods and labour markets move cash between buyers and sellers; money
//! and deposit markets only sum holdings, with interest on deposits.

use log::debug;

use super::country::CountryId;
use super::orchestrator::Model;
use super::sector::{MarketAsset, MarketScope, MarketSpec, SectorId, SectorKind, SupplyRule};
use crate::equations::names::create_equation_from_terms;
use crate::error::{SfcError, SfcResult};

impl Model {
    /// Goods or labour market within one country with an auto-discovered supplier
    pub fn add_market(&mut self, country: CountryId, code: &str, description: &str) -> SfcResult<SectorId> {
        let spec = MarketSpec {
            scope: MarketScope::Country,
            asset: MarketAsset::Goods,
            supply: SupplyRule::Auto,
        };
        self.add_sector(country, code, description, SectorKind::Market(spec), false)
    }

    /// Money market (`MON`) across the currency zone, supplied by `issuer`
    pub fn add_money_market(&mut self, country: CountryId, issuer: SectorId) -> SfcResult<SectorId> {
        self.sector(issuer)?;
        let spec = MarketSpec {
            scope: MarketScope::CurrencyZone,
            asset: MarketAsset::Money,
            supply: SupplyRule::Issuer(issuer),
        };
        self.add_sector(country, "MON", "Money market", SectorKind::Market(spec), false)
    }

    /// Deposit market (`DEP`) across the currency zone paying `rate` per period
    pub fn add_deposit_market(&mut self, country: CountryId, issuer: SectorId, rate: f64) -> SfcResult<SectorId> {
        if !self.sector(issuer)?.has_f() {
            return Err(SfcError::Logic(format!(
                "deposit issuer {} must hold financial assets to pay interest",
                self.sector(issuer)?.code()
            )));
        }
        let spec = MarketSpec {
            scope: MarketScope::CurrencyZone,
            asset: MarketAsset::Deposits,
            supply: SupplyRule::Issuer(issuer),
        };
        let id = self.add_sector(country, "DEP", "Deposit market", SectorKind::Market(spec), false)?;
        self.add_variable(id, "INT", "Interest rate on deposits", &rate.to_string())?;
        Ok(id)
    }

    /// Split supply: each `(supplier, eqn)` supplies `eqn`, `residual` the rest.
    ///
    /// The equations are written in the market's own names, e.g. `0.3*SUP_GOOD`.
    pub fn set_supply_allocation(
        &mut self,
        market: SectorId,
        shares: &[(SectorId, &str)],
        residual: SectorId,
    ) -> SfcResult<()> {
        for (supplier, _) in shares {
            self.sector(*supplier)?;
        }
        self.sector(residual)?;
        let code = self.sector(market)?.code().to_string();
        match &mut self.sector_mut(market)?.kind {
            SectorKind::Market(spec) if spec.asset == MarketAsset::Goods => {
                spec.supply = SupplyRule::Allocated {
                    shares: shares.iter().map(|(s, e)| (*s, e.to_string())).collect(),
                    residual,
                };
                Ok(())
            }
            _ => Err(SfcError::Logic(format!(
                "{} is not a goods market; supply cannot be allocated",
                code
            ))),
        }
    }

    pub(super) fn generate_market(&mut self, id: SectorId, spec: &MarketSpec) -> SfcResult<()> {
        let country = self.sector(id)?.country();
        let scope: Vec<SectorId> = match spec.scope {
            MarketScope::Country => self.sectors_in_country(country),
            MarketScope::CurrencyZone => self.sectors_in_zone(country)?,
        }
        .into_iter()
        .filter(|s| {
            self.sector(*s)
                .map(|s| !matches!(s.kind, SectorKind::Market(_)))
                .unwrap_or(false)
        })
        .collect();

        match spec.asset {
            MarketAsset::Goods => self.generate_goods_market(id, &scope, &spec.supply),
            MarketAsset::Money => self.generate_money_market(id, &scope, &spec.supply),
            MarketAsset::Deposits => self.generate_deposit_market(id, &scope, &spec.supply),
        }
    }

    fn sum_of(&mut self, sectors: &[SectorId], local: &str) -> SfcResult<String> {
        let mut terms = Vec::with_capacity(sectors.len());
        for s in sectors {
            terms.push(self.get_variable_name(*s, local)?);
        }
        Ok(create_equation_from_terms(&terms))
    }

    fn defining(&self, scope: &[SectorId], local: &str) -> Vec<SectorId> {
        scope
            .iter()
            .copied()
            .filter(|s| self.sector(*s).map(|s| s.defines(local)).unwrap_or(false))
            .collect()
    }

    fn single_supplier(&self, market: SectorId, scope: &[SectorId], rule: &SupplyRule) -> SfcResult<SectorId> {
        let code = self.sector(market)?.code();
        let supply = format!("SUP_{}", code);
        match rule {
            SupplyRule::Issuer(issuer) => Ok(*issuer),
            SupplyRule::Auto => {
                let suppliers = self.defining(scope, &supply);
                match suppliers.as_slice() {
                    [one] => Ok(*one),
                    [] => Err(SfcError::Logic(format!("market {} has no supplier", code))),
                    _ => Err(SfcError::Logic(format!(
                        "market {} has {} suppliers and no allocation list",
                        code,
                        suppliers.len()
                    ))),
                }
            }
            SupplyRule::Allocated { .. } => Err(SfcError::Logic(format!(
                "market {} does not have a single supplier",
                code
            ))),
        }
    }

    /// Point `supplier`'s `local` at the market's `market_local`
    fn link_supplier(&mut self, market: SectorId, supplier: SectorId, local: &str, market_local: &str) -> SfcResult<()> {
        let target = self.get_variable_name(market, market_local)?;
        if self.sector(supplier)?.defines(local) {
            self.set_equation_rhs(supplier, local, &target)
        } else {
            self.add_variable(supplier, local, "Supply to market", &target)
        }
    }

    fn generate_goods_market(&mut self, id: SectorId, scope: &[SectorId], rule: &SupplyRule) -> SfcResult<()> {
        let code = self.sector(id)?.code().to_string();
        let demand = format!("DEM_{}", code);
        let supply = format!("SUP_{}", code);

        let demanders = self.defining(scope, &demand);
        let total = self.sum_of(&demanders, &demand)?;
        self.add_variable(id, &demand, &format!("Total demand for {}", code), &total)?;
        for d in &demanders {
            if self.sector(*d)?.has_f() {
                self.add_cash_flow(*d, &format!("-{}", demand), None, None, true)?;
            }
        }
        self.add_variable(id, &supply, &format!("Total supply of {}", code), &demand)?;
        debug!(target: "sfc::model", "market {} has {} demanders", code, demanders.len());

        match rule {
            SupplyRule::Allocated { shares, residual } => {
                self.allocate_supply(id, &supply, shares, *residual)
            }
            _ => {
                let supplier = self.single_supplier(id, scope, rule)?;
                self.link_supplier(id, supplier, &supply, &supply)?;
                if self.sector(supplier)?.has_f() {
                    self.add_cash_flow(supplier, &format!("+{}", supply), None, None, true)?;
                }
                Ok(())
            }
        }
    }

    fn allocate_supply(
        &mut self,
        id: SectorId,
        supply: &str,
        shares: &[(SectorId, String)],
        residual: SectorId,
    ) -> SfcResult<()> {
        let (market_country, market_full) = {
            let m = self.sector(id)?;
            (m.country(), m.full_code().unwrap_or(m.code()).to_string())
        };
        let full_of = |model: &Model, s: SectorId| -> SfcResult<String> {
            let sector = model.sector(s)?;
            Ok(sector.full_code().unwrap_or(sector.code()).to_string())
        };

        let mut allocated = vec![supply.to_string()];
        let mut entries = Vec::new();
        for (supplier, eqn) in shares {
            let local = format!("SUP_{}", full_of(self, *supplier)?);
            self.add_variable(id, &local, "Allocated supply", eqn)?;
            allocated.push(format!("-{}", local));
            entries.push((*supplier, local));
        }
        let local = format!("SUP_{}", full_of(self, residual)?);
        self.add_variable(
            id,
            &local,
            "Residual supply",
            &create_equation_from_terms(&allocated),
        )?;
        entries.push((residual, local));

        for (supplier, market_local) in entries {
            let variable = if self.sector(supplier)?.country() == market_country {
                supply.to_string()
            } else {
                format!("SUP_{}", market_full)
            };
            self.link_supplier(id, supplier, &variable, &market_local)?;
            if self.sector(supplier)?.has_f() {
                self.add_cash_flow(supplier, &format!("+{}", variable), None, None, true)?;
            }
        }
        Ok(())
    }

    /// Households and businesses hold money; `DEM_MON = F` unless weighted
    fn generate_money_market(&mut self, id: SectorId, scope: &[SectorId], rule: &SupplyRule) -> SfcResult<()> {
        let holders: Vec<SectorId> = scope
            .iter()
            .copied()
            .filter(|s| {
                self.sector(*s)
                    .map(|s| (s.kind.is_household() || s.kind.is_business()) && s.has_f())
                    .unwrap_or(false)
            })
            .collect();
        for h in &holders {
            if !self.sector(*h)?.defines("DEM_MON") {
                self.add_variable(*h, "DEM_MON", "Demand for money", "F")?;
            }
        }
        let total = self.sum_of(&holders, "DEM_MON")?;
        self.add_variable(id, "DEM_MON", "Total money holdings", &total)?;
        self.add_variable(id, "SUP_MON", "Money supply", "DEM_MON")?;
        let issuer = self.single_supplier(id, scope, rule)?;
        self.link_supplier(id, issuer, "SUP_MON", "SUP_MON")
    }

    /// Holders earn `INT` on last period's deposits; the issuer pays the sum
    fn generate_deposit_market(&mut self, id: SectorId, scope: &[SectorId], rule: &SupplyRule) -> SfcResult<()> {
        let issuer = self.single_supplier(id, scope, rule)?;
        let holders: Vec<SectorId> = self
            .defining(scope, "DEM_DEP")
            .into_iter()
            .filter(|h| *h != issuer)
            .collect();
        let rate = self.get_variable_name(id, "INT")?;
        for h in &holders {
            self.add_lagged_variable(*h, "LAG_DEM_DEP", "DEM_DEP", "Previous deposit holdings")?;
            self.add_variable(
                *h,
                "INT_DEP",
                "Interest received on deposits",
                &format!("{}*LAG_DEM_DEP", rate),
            )?;
            self.add_cash_flow(*h, "+INT_DEP", None, None, true)?;
        }
        let total = self.sum_of(&holders, "DEM_DEP")?;
        self.add_variable(id, "DEM_DEP", "Total deposits", &total)?;
        self.add_variable(id, "SUP_DEP", "Deposits issued", "DEM_DEP")?;
        self.link_supplier(id, issuer, "SUP_DEP", "SUP_DEP")?;

        let paid = self.sum_of(&holders, "INT_DEP")?;
        self.add_variable(issuer, "INTPAID", "Interest paid on deposits", &paid)?;
        self.add_cash_flow(issuer, "-INTPAID", None, None, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trading_pair() -> (Model, CountryId, SectorId, SectorId) {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let buyer = model.add_sector(ca, "B", "Buyer", SectorKind::Generic, true).unwrap();
        model.add_variable(buyer, "DEM_X", "", "10").unwrap();
        let seller = model.add_sector(ca, "S", "Seller", SectorKind::Generic, true).unwrap();
        model.add_variable(seller, "SUP_X", "", "0.0").unwrap();
        (model, ca, buyer, seller)
    }

    #[test]
    fn test_single_supplier_clears() {
        let (mut model, ca, buyer, seller) = trading_pair();
        model.add_market(ca, "X", "Market for X").unwrap();
        model.set_max_time(3);
        model.main().unwrap();
        let demand = model.get_time_series("X__DEM_X", None).unwrap();
        let supply = model.get_time_series("X__SUP_X", None).unwrap();
        let sold = model.get_time_series("S__SUP_X", None).unwrap();
        for k in 1..=3 {
            assert_relative_eq!(demand[k], 10.0);
            assert_relative_eq!(supply[k], demand[k]);
            assert_relative_eq!(sold[k], supply[k]);
        }
        assert_eq!(model.sector_series(seller, "F").unwrap(), vec![0.0, 10.0, 20.0, 30.0]);
        assert_eq!(model.sector_series(buyer, "F").unwrap(), vec![0.0, -10.0, -20.0, -30.0]);
    }

    #[test]
    fn test_supplier_discovery_errors() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let buyer = model.add_sector(ca, "B", "", SectorKind::Generic, true).unwrap();
        model.add_variable(buyer, "DEM_X", "", "10").unwrap();
        model.add_market(ca, "X", "").unwrap();
        assert!(matches!(model.main(), Err(SfcError::Logic(_))));

        let (mut model, ca, _, _) = trading_pair();
        let other = model.add_sector(ca, "S2", "", SectorKind::Generic, true).unwrap();
        model.add_variable(other, "SUP_X", "", "0.0").unwrap();
        model.add_market(ca, "X", "").unwrap();
        assert!(matches!(model.main(), Err(SfcError::Logic(_))));
    }

    #[test]
    fn test_allocated_supply() {
        let (mut model, ca, _, seller) = trading_pair();
        let other = model.add_sector(ca, "S2", "", SectorKind::Generic, true).unwrap();
        model.add_variable(other, "SUP_X", "", "0.0").unwrap();
        let market = model.add_market(ca, "X", "").unwrap();
        model
            .set_supply_allocation(market, &[(seller, "0.25*SUP_X")], other)
            .unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let first = model.get_time_series("S__SUP_X", None).unwrap();
        let second = model.get_time_series("S2__SUP_X", None).unwrap();
        let total = model.get_time_series("X__SUP_X", None).unwrap();
        for k in 1..=2 {
            assert_relative_eq!(first[k], 2.5);
            assert_relative_eq!(second[k], 7.5);
            assert_relative_eq!(first[k] + second[k], total[k]);
        }
        assert_eq!(model.sector_series(other, "F").unwrap(), vec![0.0, 7.5, 15.0]);
    }

    #[test]
    fn test_foreign_supplier_takes_market_suffix() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let us = model.add_country("US", "United States", "CAD").unwrap();
        let buyer = model.add_sector(ca, "B", "", SectorKind::Generic, true).unwrap();
        model.add_variable(buyer, "DEM_X", "", "10").unwrap();
        let home = model.add_sector(ca, "S", "", SectorKind::Generic, true).unwrap();
        let abroad = model.add_sector(us, "S", "", SectorKind::Generic, true).unwrap();
        let market = model.add_market(ca, "X", "").unwrap();
        model
            .set_supply_allocation(market, &[(abroad, "4")], home)
            .unwrap();
        model.set_max_time(1);
        model.main().unwrap();
        assert!(model.sector(abroad).unwrap().defines("SUP_CA_X"));
        assert_relative_eq!(model.time_series().last("US_S__SUP_CA_X").unwrap(), 4.0);
        assert_relative_eq!(model.time_series().last("CA_S__SUP_X").unwrap(), 6.0);
        assert_relative_eq!(model.time_series().last("US_S__F").unwrap(), 4.0);
    }

    #[test]
    fn test_allocation_needs_goods_market() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let bank = model.add_sector(ca, "CB", "", SectorKind::Generic, true).unwrap();
        let money = model.add_money_market(ca, bank).unwrap();
        assert!(matches!(
            model.set_supply_allocation(money, &[], bank),
            Err(SfcError::Logic(_))
        ));
    }

    #[test]
    fn test_money_market_holdings() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let hh = model.add_household(ca, "HH", "", 0.5, 0.0).unwrap();
        model.add_cash_flow(hh, "+GIFT", Some("2"), None, true).unwrap();
        let bank = model.add_sector(ca, "CB", "", SectorKind::Generic, false).unwrap();
        model.add_variable(bank, "SUP_MON", "", "0.0").unwrap();
        model.add_money_market(ca, bank).unwrap();
        model.set_max_time(3);
        model.main().unwrap();
        let f = model.sector_series(hh, "F").unwrap();
        let issued = model.get_time_series("CB__SUP_MON", None).unwrap();
        for k in 1..=3 {
            assert_relative_eq!(issued[k], f[k]);
        }
        assert_relative_eq!(issued[3], 6.0);
    }

    #[test]
    fn test_deposit_interest() {
        let mut model = Model::new();
        let ca = model.add_country("CA", "Canada", "CAD").unwrap();
        let hh = model.add_household(ca, "HH", "", 0.0, 0.0).unwrap();
        model.add_initial_condition(hh, "F", "100").unwrap();
        model.generate_asset_weighting(hh, &[], "DEP").unwrap();
        model.add_initial_condition(hh, "DEM_DEP", "100").unwrap();
        let bank = model.add_sector(ca, "BANK", "", SectorKind::Generic, true).unwrap();
        model.add_initial_condition(bank, "F", "-100").unwrap();
        model.add_deposit_market(ca, bank, 0.1).unwrap();
        model.set_max_time(2);
        model.main().unwrap();
        let int = model.sector_series(hh, "INT_DEP").unwrap();
        let f = model.sector_series(hh, "F").unwrap();
        assert_relative_eq!(int[1], 10.0, max_relative = 1e-6);
        assert_relative_eq!(f[1], 110.0, max_relative = 1e-6);
        assert_relative_eq!(f[2], 121.0, max_relative = 1e-6);
        let bank_f = model.sector_series(bank, "F").unwrap();
        for k in 0..=2 {
            assert_relative_eq!(bank_f[k], -f[k], max_relative = 1e-6);
        }
    }
}
