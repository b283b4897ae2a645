//! SFC Models - stock-flow consistent macroeconomic model builder and solver
//!
//! This library provides:
//! - A term/equation algebra over plain-text right-hand sides
//! - An equation parser that classifies, validates and reduces equation blocks
//! - A time-stepping fixed-point solver with steady-state and flex-price support
//! - Sector-based model construction (households, businesses, governments,
//!   markets, taxes, gold standard, external sector)
//! - Parallel scenario batches

pub mod builtin_models;
pub mod equations;
pub mod error;
pub mod logging;
pub mod model;
pub mod scenario;
pub mod solver;

// Re-export commonly used types
pub use equations::{Equation, EquationBlock, Term};
pub use error::{EvalError, SfcError, SfcResult};
pub use model::{CountryId, Model, SectorId, SectorKind};
pub use scenario::ScenarioRunner;
pub use solver::{EquationParser, EquationSolver, FunctionRegistry, SolverConfig, TimeSeries};
