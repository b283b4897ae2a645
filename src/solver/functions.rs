//! User-supplied functions callable from equation text

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::equations::names::{is_identifier, validate_variable_name};
use crate::equations::UserFunction;
use crate::error::{EvalError, SfcError, SfcResult};

/// Name-indexed set of pure numeric callables
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, UserFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any earlier registration.
    ///
    /// The name must be an identifier that is neither reserved nor a
    /// built-in function.
    pub fn register<F>(&mut self, name: &str, func: F) -> SfcResult<()>
    where
        F: Fn(&[f64]) -> Result<f64, EvalError> + Send + Sync + 'static,
    {
        if !is_identifier(name) {
            return Err(SfcError::Syntax(format!("'{}' is not a valid function name", name)));
        }
        validate_variable_name(name)?;
        self.functions.insert(name.to_string(), Arc::new(func));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<UserFunction> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_call() {
        let mut registry = FunctionRegistry::new();
        registry
            .register("clamp01", |args: &[f64]| Ok(args[0].clamp(0.0, 1.0)))
            .unwrap();
        let f = registry.get("clamp01").unwrap();
        assert_eq!(f(&[3.0]).unwrap(), 1.0);
        assert!(registry.contains("clamp01"));
        assert!(!registry.contains("other"));
    }

    #[test]
    fn test_rejects_reserved_names() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.register("max", |_: &[f64]| Ok(0.0)).is_err());
        assert!(registry.register("if", |_: &[f64]| Ok(0.0)).is_err());
        assert!(registry.register("a b", |_: &[f64]| Ok(0.0)).is_err());
    }
}
