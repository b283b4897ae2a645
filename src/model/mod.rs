//! Sector-based model construction
//!
//! [`Model`] owns countries and an arena of sectors. Each sector kind's
//! equation generation lives in its own module as an `impl Model` block.

pub mod country;
pub mod sector;

mod business;
mod external;
mod gold;
mod government;
mod household;
mod market;
mod orchestrator;
mod tax;

pub use country::{Country, CountryId, CurrencyZone};
pub use external::NUMERAIRE;
pub use orchestrator::Model;
pub use sector::{
    GovernmentRole, MarketAsset, MarketScope, MarketSpec, Sector, SectorId, SectorKind, SupplyRule,
};
