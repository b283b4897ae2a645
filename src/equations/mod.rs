//! Symbolic layer: names, terms, equations and expression trees

pub mod equation;
pub mod expr;
pub mod lexer;
pub mod names;
pub mod term;

pub use equation::{Equation, EquationBlock};
pub use expr::{Expr, Node, UserFunction};
pub use term::Term;
