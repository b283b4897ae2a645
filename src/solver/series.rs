//! Exogenous series literals
//!
//! An exogenous right-hand side is either a scalar expression (`20`,
//! `2*10`) or a sequence built from list literals: `[1, 2, 3]`,
//! `[20]*5 + [25]*10`, `3*[0.5]`. List literals are joined by `+`
//! (concatenation) and repeated by an integer factor on either side.

use log::warn;

use crate::equations::expr::{Expr, UserFunction};
use crate::equations::lexer::{tokenize, Token, TokenKind};
use crate::error::{SfcError, SfcResult};

/// Upper bound on the length of any series, `MaxTime` included
pub const MAX_SERIES_LEN: usize = 1_000_000;

/// Evaluate an exogenous right-hand side to its values
pub fn evaluate_series(
    src: &str,
    user_fn: &dyn Fn(&str) -> Option<UserFunction>,
) -> SfcResult<Vec<f64>> {
    let tokens = tokenize(src)?;
    if !tokens.iter().any(|t| t.kind == TokenKind::LBracket) {
        let value = Expr::parse(src)?.eval_constant(user_fn)?;
        return Ok(vec![value]);
    }
    let mut reader = SeriesReader {
        src,
        tokens: &tokens,
        pos: 0,
        user_fn,
    };
    let mut out = reader.item()?;
    while reader.pos < tokens.len() {
        match tokens[reader.pos].kind {
            TokenKind::Plus => {
                reader.pos += 1;
                out.extend(reader.item()?);
            }
            _ => return Err(reader.error("expected '+' between list literals")),
        }
    }
    if out.is_empty() {
        return Err(SfcError::Syntax(format!("empty series '{}'", src)));
    }
    Ok(out)
}

/// Stretch `values` to `len` entries, repeating the last value
pub fn pad_series(name: &str, mut values: Vec<f64>, len: usize) -> Vec<f64> {
    if values.len() < len {
        let last = values.last().copied().unwrap_or(0.0);
        // A single value is a constant, not a short series
        if values.len() > 1 {
            warn!(
                target: "sfc::parser",
                "exogenous series {} has {} values, padding to {} with {}",
                name,
                values.len(),
                len,
                last
            );
        }
        values.resize(len, last);
    }
    values
}

struct SeriesReader<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
    user_fn: &'a dyn Fn(&str) -> Option<UserFunction>,
}

impl<'a> SeriesReader<'a> {
    fn error(&self, what: &str) -> SfcError {
        SfcError::Syntax(format!("{} in series '{}'", what, self.src))
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    // list ('*' n)? | n '*' list
    fn item(&mut self) -> SfcResult<Vec<f64>> {
        if let Some(TokenKind::Number(n)) = self.peek() {
            let n = *n;
            self.pos += 1;
            if self.peek() != Some(&TokenKind::Star) {
                return Err(self.error("expected '*' after repeat count"));
            }
            self.pos += 1;
            let list = self.list()?;
            return self.repeat(list, n);
        }
        let list = self.list()?;
        if self.peek() == Some(&TokenKind::Star) {
            self.pos += 1;
            match self.peek() {
                Some(TokenKind::Number(n)) => {
                    let n = *n;
                    self.pos += 1;
                    return self.repeat(list, n);
                }
                _ => return Err(self.error("expected repeat count after '*'")),
            }
        }
        Ok(list)
    }

    fn repeat(&self, list: Vec<f64>, n: f64) -> SfcResult<Vec<f64>> {
        if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
            return Err(self.error("repeat count must be a non-negative integer"));
        }
        if n > MAX_SERIES_LEN as f64 {
            return Err(self.error("repeat count too large"));
        }
        match list.len().checked_mul(n as usize) {
            Some(len) if len <= MAX_SERIES_LEN => Ok(list.repeat(n as usize)),
            _ => Err(self.error("series too long")),
        }
    }

    fn list(&mut self) -> SfcResult<Vec<f64>> {
        if self.peek() != Some(&TokenKind::LBracket) {
            return Err(self.error("expected '['"));
        }
        self.pos += 1;
        let mut values = Vec::new();
        loop {
            if self.peek() == Some(&TokenKind::RBracket) {
                self.pos += 1;
                return Ok(values);
            }
            let start = match self.tokens.get(self.pos) {
                Some(t) => t.start,
                None => return Err(self.error("unterminated list")),
            };
            let mut depth = 0i32;
            let mut end = None;
            while let Some(t) = self.tokens.get(self.pos) {
                match t.kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => depth -= 1,
                    TokenKind::Comma | TokenKind::RBracket if depth == 0 => {
                        end = Some(t.start);
                        break;
                    }
                    TokenKind::LBracket => return Err(self.error("nested lists")),
                    _ => {}
                }
                self.pos += 1;
            }
            let end = end.ok_or_else(|| self.error("unterminated list"))?;
            let value = Expr::parse(&self.src[start..end])?.eval_constant(self.user_fn)?;
            values.push(value);
            if self.peek() == Some(&TokenKind::Comma) {
                self.pos += 1;
            }
        }
    }
}
