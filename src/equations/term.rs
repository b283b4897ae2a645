//! Signed terms of a right-hand side
//!
//! A right-hand side such as `AlphaIncome*AfterTax + 0.4*LAG_F - T` is kept
//! as a list of [`Term`]s so that cash flows can be appended and merged
//! symbolically before the final text is produced.

use std::collections::HashMap;
use std::fmt;

use super::expr::Expr;
use super::lexer::{tokenize, Token, TokenKind};
use super::names::{is_identifier, replace_tokens_from_lookup};
use crate::error::{SfcError, SfcResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// Signed multiplier applied to the symbol
    pub coefficient: f64,
    /// Identifier for simple terms, expression text otherwise; empty for constants
    pub symbol: String,
    /// True for `±c*x` (and constants)
    pub is_simple: bool,
    /// Opaque text that is rendered verbatim and never merged
    pub is_blob: bool,
}

impl Term {
    /// Parse a single term such as `-0.2*(x)` or `+a*b`.
    ///
    /// A top-level binary `+`/`-` in what remains after stripping the sign
    /// and one pair of outer parentheses is a [`SfcError::Logic`] error.
    pub fn parse(src: &str) -> SfcResult<Term> {
        let mut text = src.trim();
        if text.is_empty() {
            return Err(SfcError::Syntax("empty term".to_string()));
        }
        let mut coefficient = 1.0;
        strip_sign(&mut text, &mut coefficient);

        if let Some(inner) = strip_outer_parens(text)? {
            text = inner.trim();
            strip_sign(&mut text, &mut coefficient);
        }
        if text.is_empty() {
            return Err(SfcError::Syntax(format!("empty term in '{}'", src)));
        }

        let tokens = tokenize(text)?;
        if has_interior_sign(&tokens) {
            return Err(SfcError::Logic(format!(
                "term '{}' contains an interior sign",
                src.trim()
            )));
        }
        // Surfaces unmatched parentheses and dangling operators
        Expr::parse(text)?;

        match tokens.as_slice() {
            [Token {
                kind: TokenKind::Ident(name),
                ..
            }] => Ok(Term::simple(coefficient, name)),
            [Token {
                kind: TokenKind::Number(c),
                ..
            }] => Ok(Term::constant(coefficient * c)),
            [Token {
                kind: TokenKind::Number(c),
                ..
            }, Token {
                kind: TokenKind::Star,
                ..
            }, Token {
                kind: TokenKind::Ident(name),
                ..
            }] => Ok(Term::simple(coefficient * c, name)),
            [Token {
                kind: TokenKind::Number(c),
                ..
            }, Token {
                kind: TokenKind::Star,
                end,
                ..
            }, rest @ ..]
                if matches!(rest.first().map(|t| &t.kind), Some(TokenKind::LParen))
                    && matching_paren(rest) == Some(rest.len() - 1) =>
            {
                let mut inner = Term::parse(&text[*end..])?;
                inner.coefficient *= coefficient * c;
                Ok(inner)
            }
            _ => Ok(Term {
                coefficient,
                symbol: text.split_whitespace().collect(),
                is_simple: false,
                is_blob: false,
            }),
        }
    }

    /// `coefficient * name`
    pub fn simple(coefficient: f64, name: &str) -> Term {
        Term {
            coefficient,
            symbol: name.to_string(),
            is_simple: true,
            is_blob: false,
        }
    }

    pub fn constant(value: f64) -> Term {
        Term {
            coefficient: value,
            symbol: String::new(),
            is_simple: true,
            is_blob: false,
        }
    }

    /// Opaque text, e.g. a lag marker `F(k-1)`
    pub fn blob(src: &str) -> Term {
        Term {
            coefficient: 1.0,
            symbol: src.trim().to_string(),
            is_simple: false,
            is_blob: true,
        }
    }

    pub fn is_constant(&self) -> bool {
        !self.is_blob && self.symbol.is_empty()
    }

    /// Same term with the sign flipped
    pub fn negated(&self) -> Term {
        let mut out = self.clone();
        if !out.is_blob {
            out.coefficient = -out.coefficient;
        }
        out
    }

    /// True when both terms can be combined by adding coefficients
    pub fn same_symbol(&self, other: &Term) -> bool {
        !self.is_blob && !other.is_blob && self.symbol == other.symbol
    }

    /// Token-safe substitution inside the symbol.
    ///
    /// Replacement text that is not a plain identifier is parenthesised so
    /// that the coefficient keeps applying to all of it.
    pub fn replace_tokens(&mut self, lookup: &HashMap<String, String>) {
        if self.is_blob || self.symbol.is_empty() {
            return;
        }
        let wrapped: HashMap<String, String> = lookup
            .iter()
            .map(|(k, v)| {
                let v = v.trim();
                let v = if is_identifier(v) {
                    v.to_string()
                } else {
                    format!("({})", v)
                };
                (k.clone(), v)
            })
            .collect();
        self.symbol = replace_tokens_from_lookup(&self.symbol, &wrapped);
        if self.is_simple && !is_identifier(&self.symbol) {
            self.is_simple = false;
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blob {
            return write!(f, "{}", self.symbol);
        }
        let c = self.coefficient;
        if c == 0.0 {
            return Ok(());
        }
        let sign = if c < 0.0 { '-' } else { '+' };
        let mag = c.abs();
        if self.symbol.is_empty() {
            write!(f, "{}{}", sign, mag)
        } else if self.is_simple {
            if mag == 1.0 {
                write!(f, "{}{}", sign, self.symbol)
            } else {
                write!(f, "{}{}*{}", sign, mag, self.symbol)
            }
        } else if mag == 1.0 {
            write!(f, "{}{}", sign, self.symbol)
        } else {
            write!(f, "{}{}*({})", sign, mag, self.symbol)
        }
    }
}

fn strip_sign(text: &mut &str, coefficient: &mut f64) {
    if let Some(rest) = text.strip_prefix('-') {
        *coefficient = -*coefficient;
        *text = rest.trim_start();
    } else if let Some(rest) = text.strip_prefix('+') {
        *text = rest.trim_start();
    }
}

/// Contents of `text` if it is wrapped in one matched pair of parentheses
fn strip_outer_parens(text: &str) -> SfcResult<Option<&str>> {
    if !text.starts_with('(') {
        return Ok(None);
    }
    let tokens = tokenize(text)?;
    match matching_paren(&tokens) {
        Some(i) if i == tokens.len() - 1 => Ok(Some(&text[1..text.len() - 1])),
        Some(_) => Ok(None),
        None => Err(SfcError::Syntax(format!("unmatched parenthesis in '{}'", text))),
    }
}

/// Index of the token closing the bracket opened at `tokens[0]`
fn matching_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn has_interior_sign(tokens: &[Token]) -> bool {
    let mut depth = 0i32;
    for t in tokens {
        match t.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Plus | TokenKind::Minus if depth == 0 => return true,
            _ => {}
        }
    }
    false
}
