//! Countries and currency zones

use super::sector::SectorId;

/// Index of a country inside its [`Model`](super::Model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryId(usize);

impl CountryId {
    pub(crate) fn from_index(index: usize) -> Self {
        CountryId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Country {
    pub id: CountryId,
    pub code: String,
    pub description: String,
    /// Currency code, e.g. `CAD`
    pub currency: String,
    /// Sectors in registration order
    pub sectors: Vec<SectorId>,
}

impl Country {
    pub(crate) fn new(id: CountryId, code: &str, description: &str, currency: &str) -> Self {
        Self {
            id,
            code: code.to_string(),
            description: description.to_string(),
            currency: currency.to_string(),
            sectors: Vec::new(),
        }
    }
}

/// Countries sharing a currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyZone {
    pub currency: String,
    pub countries: Vec<CountryId>,
}

impl CurrencyZone {
    pub fn contains(&self, country: CountryId) -> bool {
        self.countries.contains(&country)
    }
}
