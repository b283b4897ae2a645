//! Equations and equation blocks

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::warn;

use super::lexer::{tokenize, TokenKind};
use super::names::create_equation_from_terms;
use super::term::Term;
use crate::error::{SfcError, SfcResult};

/// `lhs = term + term + ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub lhs: String,
    pub description: String,
    terms: Vec<Term>,
}

impl Equation {
    /// An equation with an empty right-hand side (renders as `0.0`)
    pub fn new(lhs: &str, description: &str) -> Self {
        Self {
            lhs: lhs.to_string(),
            description: description.to_string(),
            terms: Vec::new(),
        }
    }

    /// Build an equation from right-hand-side text.
    ///
    /// The text is split into terms at top-level `+`/`-`. If any piece is
    /// not a valid term the whole right-hand side is kept as one blob.
    pub fn with_rhs(lhs: &str, description: &str, rhs: &str) -> Self {
        let mut eq = Self::new(lhs, description);
        let rhs = rhs.trim();
        if rhs.is_empty() {
            return eq;
        }
        match split_terms(rhs) {
            Some(terms) => {
                for term in terms {
                    eq.merge(term);
                }
            }
            None => eq.terms.push(Term::blob(rhs)),
        }
        eq
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_blob(&self) -> bool {
        self.terms.iter().any(|t| t.is_blob)
    }

    /// Append a term, summing coefficients when the symbol already exists.
    ///
    /// Blob terms cannot be combined with anything else.
    pub fn add_term(&mut self, term: Term) -> SfcResult<()> {
        if self.is_blob() {
            return Err(SfcError::Logic(format!(
                "cannot add '{}' to blob equation {}",
                term, self.lhs
            )));
        }
        if term.is_blob && !self.terms.is_empty() {
            return Err(SfcError::Logic(format!(
                "cannot add blob '{}' to summable equation {}",
                term, self.lhs
            )));
        }
        self.merge(term);
        Ok(())
    }

    /// Parse `text` as a single term and add it
    pub fn add_term_str(&mut self, text: &str) -> SfcResult<()> {
        let term = Term::parse(text)?;
        self.add_term(term)
    }

    fn merge(&mut self, term: Term) {
        match self.terms.iter_mut().find(|t| t.same_symbol(&term)) {
            Some(existing) => existing.coefficient += term.coefficient,
            None => self.terms.push(term),
        }
    }

    /// Canonical right-hand side text
    pub fn rhs(&self) -> String {
        if let Some(blob) = self.terms.iter().find(|t| t.is_blob) {
            return blob.to_string();
        }
        let rendered: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        create_equation_from_terms(&rendered)
    }

    /// Token-safe substitution across all non-blob terms, re-merging afterwards
    pub fn replace_tokens_from_lookup(&mut self, lookup: &HashMap<String, String>) {
        if self.is_blob() {
            return;
        }
        let old = std::mem::take(&mut self.terms);
        for mut term in old {
            term.replace_tokens(lookup);
            self.merge(term);
        }
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs())
    }
}

/// Split `rhs` at top-level binary `+`/`-`; `None` if any piece is not a term
fn split_terms(rhs: &str) -> Option<Vec<Term>> {
    let tokens = tokenize(rhs).ok()?;
    let mut cuts = Vec::new();
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Plus | TokenKind::Minus
                if depth == 0 && i > 0 && tokens[i - 1].ends_operand() =>
            {
                cuts.push(t.start)
            }
            _ => {}
        }
    }
    let mut bounds = vec![0];
    bounds.extend(cuts);
    bounds.push(rhs.len());
    bounds
        .windows(2)
        .map(|w| Term::parse(&rhs[w[0]..w[1]]).ok())
        .collect()
}

/// Equations keyed by left-hand side, listed in key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquationBlock {
    equations: BTreeMap<String, Equation>,
}

impl EquationBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an equation, replacing (with a warning) any previous one
    pub fn add(&mut self, equation: Equation) -> Option<Equation> {
        let previous = self.equations.insert(equation.lhs.clone(), equation);
        if let Some(prev) = &previous {
            warn!(target: "sfc::model", "overwriting equation {} = {}", prev.lhs, prev.rhs());
        }
        previous
    }

    pub fn get(&self, lhs: &str) -> Option<&Equation> {
        self.equations.get(lhs)
    }

    pub fn get_mut(&mut self, lhs: &str) -> Option<&mut Equation> {
        self.equations.get_mut(lhs)
    }

    pub fn contains(&self, lhs: &str) -> bool {
        self.equations.contains_key(lhs)
    }

    pub fn remove(&mut self, lhs: &str) -> Option<Equation> {
        self.equations.remove(lhs)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Left-hand sides in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.equations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, Equation> {
        self.equations.values()
    }

    pub fn replace_tokens_from_lookup(&mut self, lookup: &HashMap<String, String>) {
        for eq in self.equations.values_mut() {
            eq.replace_tokens_from_lookup(lookup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rhs_rendering() {
        let eq = Equation::with_rhs("DEM_GOOD", "", "AlphaIncome*AfterTax + AlphaFin*LAG_F");
        assert_eq!(eq.rhs(), "AlphaIncome*AfterTax+AlphaFin*LAG_F");
        assert_eq!(Equation::new("x", "").rhs(), "0.0");

        let eq = Equation::with_rhs("x", "", "a - a");
        assert_eq!(eq.rhs(), "0.0");
    }

    #[test]
    fn test_render_idempotent() {
        let eq = Equation::with_rhs("x", "", " -a + 2*b - max(c, d-1) + 3 ");
        let again = Equation::with_rhs("x", "", &eq.rhs());
        assert_eq!(eq.rhs(), again.rhs());
        assert_eq!(eq.rhs(), "-a+2*b-max(c,d-1)+3");
    }

    #[test]
    fn test_terms_merge() {
        let mut eq = Equation::with_rhs("F", "", "LAG_F");
        eq.add_term_str("-DEM_GOOD").unwrap();
        eq.add_term_str("+INC").unwrap();
        eq.add_term_str("-2*DEM_GOOD").unwrap();
        assert_eq!(eq.rhs(), "LAG_F-3*DEM_GOOD+INC");
    }

    #[test]
    fn test_addition_commutes() {
        let mut a = Equation::new("y", "");
        let mut b = Equation::new("y", "");
        a.add_term_str("x").unwrap();
        a.add_term_str("-z").unwrap();
        b.add_term_str("-z").unwrap();
        b.add_term_str("x").unwrap();
        let ra = Equation::with_rhs("y", "", &a.rhs());
        let rb = Equation::with_rhs("y", "", &b.rhs());
        let mut la: Vec<String> = ra.terms().iter().map(|t| t.to_string()).collect();
        let mut lb: Vec<String> = rb.terms().iter().map(|t| t.to_string()).collect();
        la.sort();
        lb.sort();
        assert_eq!(la, lb);
    }

    #[test]
    fn test_blob_rules() {
        let mut eq = Equation::with_rhs("LAG_F", "", "F(k-1)");
        assert!(!eq.is_blob());
        assert_eq!(eq.rhs(), "F(k-1)");

        let mut blob = Equation::new("LAG_F", "");
        blob.add_term(Term::blob("F(k-1)")).unwrap();
        assert!(blob.is_blob());
        assert!(matches!(blob.add_term_str("x"), Err(SfcError::Logic(_))));
        assert!(matches!(eq.add_term(Term::blob("y")), Err(SfcError::Logic(_))));
    }

    #[test]
    fn test_unparseable_rhs_becomes_blob() {
        let eq = Equation::with_rhs("x", "", "a*-b + c");
        assert!(eq.is_blob());
        assert_eq!(eq.rhs(), "a*-b + c");
    }

    #[test]
    fn test_replace_tokens_merges() {
        let mut eq = Equation::with_rhs("y", "", "a + b");
        let mut lookup = HashMap::new();
        lookup.insert("b".to_string(), "a".to_string());
        eq.replace_tokens_from_lookup(&lookup);
        assert_eq!(eq.rhs(), "2*a");
    }

    #[test]
    fn test_block_overwrite_and_order() {
        let mut block = EquationBlock::new();
        assert!(block.add(Equation::with_rhs("z", "", "1")).is_none());
        block.add(Equation::with_rhs("a", "", "2"));
        let prev = block.add(Equation::with_rhs("z", "", "3"));
        assert_eq!(prev.map(|e| e.rhs()), Some("1".to_string()));
        assert_eq!(block.names().collect::<Vec<_>>(), vec!["a", "z"]);
        assert_eq!(block.get("z").map(|e| e.rhs()), Some("3".to_string()));
    }
}
