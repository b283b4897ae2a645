//! Equation text parsing and time-stepping solution

pub mod bisection;
pub mod config;
pub mod engine;
pub mod functions;
pub mod parser;
pub mod series;
pub mod timeseries;

pub use config::SolverConfig;
pub use engine::EquationSolver;
pub use functions::FunctionRegistry;
pub use parser::{EquationParser, VariableKind};
pub use timeseries::{ExportFormat, TimeSeries};
