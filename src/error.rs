//! Error types shared by the equation, solver and model layers

use thiserror::Error;

/// Failure raised while evaluating a single expression.
///
/// The solver tolerates these while a fixed-point iteration is still
/// making progress, and promotes them to [`SfcError::Evaluation`] otherwise.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("math domain error: {0}")]
    Domain(String),
    #[error("function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
}

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum SfcError {
    /// Unparseable term, expression or equation line
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Reserved or undefined identifier
    #[error("name error: {0}")]
    Name(String),

    /// Structural mistake in the model or equation block
    #[error("logic error: {0}")]
    Logic(String),

    #[error("step {step}: no convergence after {iterations} iterations (error {error:.3e})")]
    Convergence {
        step: usize,
        iterations: usize,
        error: f64,
    },

    #[error("initial steady state not reached: {0}")]
    NoEquilibrium(String),

    #[error("step {step}: could not bracket a zero for flex price {price}")]
    BisectionNoBracket { step: usize, price: String },

    #[error("step {step}: cannot evaluate {variable}: {source}")]
    Evaluation {
        step: usize,
        variable: String,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, SfcError>`.
pub type SfcResult<T> = Result<T, SfcError>;
