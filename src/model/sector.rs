//! Sectors: named owners of an equation block
//!
//! A sector only knows its local names. Cross-sector references go through
//! [`Model::get_variable_name`](super::Model::get_variable_name), so sectors
//! refer to each other by [`SectorId`] and never by reference.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::equations::names::{decorated_name, is_identifier, validate_local_name, DELIMITER};
use crate::equations::{Equation, EquationBlock, Term};
use crate::error::{SfcError, SfcResult};

use super::country::CountryId;

static NEXT_SECTOR_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-wide sector identity, issued in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorId(usize);

impl SectorId {
    pub(crate) fn next() -> Self {
        SectorId(NEXT_SECTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a government-type sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernmentRole {
    /// Spends and taxes; nothing else
    DoNothing,
    /// Government and central bank in one; tracks its debt
    Consolidated,
    /// Fiscal arm paired with a [`SectorKind::CentralBank`]
    Treasury,
    /// Spending responds to the central bank's gold cover
    GoldStandard,
}

/// Where a market looks for demanders and suppliers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScope {
    Country,
    /// Every country sharing the market's currency
    CurrencyZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketAsset {
    /// Goods or labour: demand and supply generate cash flows
    Goods,
    /// Money: held as the residual asset, no cash flows
    Money,
    /// Interest-bearing deposits
    Deposits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupplyRule {
    /// The only sector in scope defining `SUP_{code}`
    Auto,
    /// A nominated issuer supplies everything
    Issuer(SectorId),
    /// Listed suppliers take their share; `residual` takes the rest
    Allocated {
        shares: Vec<(SectorId, String)>,
        residual: SectorId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSpec {
    pub scope: MarketScope,
    pub asset: MarketAsset,
    pub supply: SupplyRule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectorKind {
    Generic,
    Household {
        receives_dividends: bool,
    },
    Business {
        outputs: Vec<String>,
        labour: String,
    },
    Government(GovernmentRole),
    CentralBank {
        treasury: Option<SectorId>,
        gold: bool,
    },
    TaxFlow {
        receiver: Option<SectorId>,
    },
    Market(MarketSpec),
    ExchangeRates,
    ForexTransactions,
}

impl SectorKind {
    pub fn is_household(&self) -> bool {
        matches!(self, SectorKind::Household { .. })
    }

    pub fn is_business(&self) -> bool {
        matches!(self, SectorKind::Business { .. })
    }

    pub fn is_government(&self) -> bool {
        matches!(self, SectorKind::Government(_))
    }
}

#[derive(Debug, Clone)]
pub struct Sector {
    id: SectorId,
    code: String,
    description: String,
    country: CountryId,
    full_code: Option<String>,
    pub kind: SectorKind,
    has_f: bool,
    equations: EquationBlock,
}

impl Sector {
    /// Create a sector; with `has_f` it gets `F = LAG_F`, `LAG_F = F(k-1)`
    /// and an empty `INC`.
    pub fn new(
        country: CountryId,
        code: &str,
        description: &str,
        kind: SectorKind,
        has_f: bool,
    ) -> SfcResult<Self> {
        validate_code(code)?;
        let mut sector = Self {
            id: SectorId::next(),
            code: code.to_string(),
            description: description.to_string(),
            country,
            full_code: None,
            kind,
            has_f,
            equations: EquationBlock::new(),
        };
        if has_f {
            let mut lag = Equation::new("LAG_F", "Previous financial assets");
            lag.add_term(Term::blob("F(k-1)"))?;
            sector.equations.add(lag);
            sector
                .equations
                .add(Equation::with_rhs("F", "Net financial assets", "LAG_F"));
            sector
                .equations
                .add(Equation::new("INC", "Income (cash flows counted as income)"));
        }
        Ok(sector)
    }

    pub fn id(&self) -> SectorId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn country(&self) -> CountryId {
        self.country
    }

    pub fn has_f(&self) -> bool {
        self.has_f
    }

    pub fn full_code(&self) -> Option<&str> {
        self.full_code.as_deref()
    }

    pub(crate) fn set_full_code(&mut self, full_code: String) {
        self.full_code = Some(full_code);
    }

    /// `{full_code}__{local}` once the full code is known
    pub fn decorated(&self, local: &str) -> Option<String> {
        self.full_code.as_ref().map(|full| decorated_name(full, local))
    }

    pub fn equations(&self) -> &EquationBlock {
        &self.equations
    }

    pub fn equation(&self, name: &str) -> Option<&Equation> {
        self.equations.get(name)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.equations.contains(name)
    }

    /// Define (or redefine, with a warning) a local variable
    pub fn add_variable(&mut self, name: &str, description: &str, rhs: &str) -> SfcResult<()> {
        validate_local_name(name)?;
        self.equations.add(Equation::with_rhs(name, description, rhs));
        Ok(())
    }

    /// Like [`add_variable`](Self::add_variable) but a duplicate is an error
    pub fn try_add_variable(&mut self, name: &str, description: &str, rhs: &str) -> SfcResult<()> {
        if self.defines(name) {
            return Err(SfcError::Logic(format!(
                "{} already defines {}",
                self.code, name
            )));
        }
        self.add_variable(name, description, rhs)
    }

    /// Add a prepared equation; its left-hand side must be a local name
    pub fn add_equation(&mut self, equation: Equation) -> SfcResult<()> {
        validate_local_name(&equation.lhs)?;
        self.equations.add(equation);
        Ok(())
    }

    pub fn set_equation_rhs(&mut self, name: &str, rhs: &str) -> SfcResult<()> {
        let description = match self.equations.get(name) {
            Some(eq) => eq.description.clone(),
            None => {
                return Err(SfcError::Name(format!(
                    "{} has no variable '{}'",
                    self.code, name
                )))
            }
        };
        self.equations.remove(name);
        self.equations.add(Equation::with_rhs(name, &description, rhs));
        Ok(())
    }

    pub fn add_term_to_equation(&mut self, name: &str, term: &str) -> SfcResult<()> {
        let code = &self.code;
        let eq = self.equations.get_mut(name).ok_or_else(|| {
            SfcError::Name(format!("{} has no variable '{}'", code, name))
        })?;
        eq.add_term_str(term)
    }

    pub(crate) fn remove_variable(&mut self, name: &str) -> Option<Equation> {
        self.equations.remove(name)
    }
}

/// Sector and country codes: identifiers without the `__` delimiter
pub(crate) fn validate_code(code: &str) -> SfcResult<()> {
    if !is_identifier(code) {
        return Err(SfcError::Syntax(format!("'{}' is not a valid code", code)));
    }
    if code.contains(DELIMITER) {
        return Err(SfcError::Logic(format!(
            "code '{}' may not contain '{}'",
            code, DELIMITER
        )));
    }
    Ok(())
}
