//! Expression trees for right-hand sides
//!
//! Text is parsed once into an [`Expr`] that still refers to variables by
//! name. [`Expr::compile`] then resolves names to slots in the solver's
//! value vector and functions to built-ins or user callables, giving a
//! [`Node`] tree that is walked on every fixed-point pass.

use std::fmt;
use std::sync::Arc;

use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{EvalError, SfcError, SfcResult};

/// A user-supplied numeric function callable from equation text
pub type UserFunction = Arc<dyn Fn(&[f64]) -> Result<f64, EvalError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(String),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Min,
    Max,
    Abs,
    Pow,
    Round,
    Sum,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    Floor,
    Ceil,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "abs" => Builtin::Abs,
            "pow" => Builtin::Pow,
            "round" => Builtin::Round,
            "sum" => Builtin::Sum,
            "sqrt" => Builtin::Sqrt,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "log10" => Builtin::Log10,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            _ => return None,
        };
        Some(f)
    }

    /// Inclusive bounds on the argument count (`None` = unbounded)
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Builtin::Min | Builtin::Max => (1, None),
            Builtin::Sum => (0, None),
            Builtin::Pow => (2, Some(2)),
            Builtin::Round | Builtin::Log => (1, Some(2)),
            _ => (1, Some(1)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Pow => "pow",
            Builtin::Round => "round",
            Builtin::Sum => "sum",
            Builtin::Sqrt => "sqrt",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Log10 => "log10",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
        }
    }

    fn apply(&self, args: &[f64]) -> Result<f64, EvalError> {
        let value = match self {
            Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Builtin::Sum => args.iter().sum(),
            Builtin::Abs => args[0].abs(),
            Builtin::Pow => power(args[0], args[1])?,
            Builtin::Round => {
                if args.len() == 2 {
                    let scale = 10f64.powi(args[1].round() as i32);
                    (args[0] * scale).round() / scale
                } else {
                    args[0].round()
                }
            }
            Builtin::Sqrt => {
                if args[0] < 0.0 {
                    return Err(EvalError::Domain(format!("sqrt({})", args[0])));
                }
                args[0].sqrt()
            }
            Builtin::Exp => args[0].exp(),
            Builtin::Log => {
                if args[0] <= 0.0 {
                    return Err(EvalError::Domain(format!("log({})", args[0])));
                }
                if args.len() == 2 {
                    if args[1] <= 0.0 || args[1] == 1.0 {
                        return Err(EvalError::Domain(format!("log base {}", args[1])));
                    }
                    args[0].ln() / args[1].ln()
                } else {
                    args[0].ln()
                }
            }
            Builtin::Log10 => {
                if args[0] <= 0.0 {
                    return Err(EvalError::Domain(format!("log10({})", args[0])));
                }
                args[0].log10()
            }
            Builtin::Sin => args[0].sin(),
            Builtin::Cos => args[0].cos(),
            Builtin::Tan => args[0].tan(),
            Builtin::Floor => args[0].floor(),
            Builtin::Ceil => args[0].ceil(),
        };
        Ok(value)
    }
}

fn power(base: f64, exponent: f64) -> Result<f64, EvalError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    let value = base.powf(exponent);
    if value.is_nan() {
        return Err(EvalError::Domain(format!("{} ^ {}", base, exponent)));
    }
    Ok(value)
}

/// A user function bound to its name (for diagnostics)
#[derive(Clone)]
pub struct BoundFunction {
    pub name: String,
    pub func: UserFunction,
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

/// Compiled expression: variables resolved to value-vector slots
#[derive(Debug, Clone)]
pub enum Node {
    Const(f64),
    Slot(usize),
    Builtin(Builtin, Vec<Node>),
    User(BoundFunction, Vec<Node>),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
}

impl Node {
    /// Evaluate against the current value vector
    pub fn eval(&self, values: &[f64]) -> Result<f64, EvalError> {
        let value = match self {
            Node::Const(c) => *c,
            Node::Slot(i) => values[*i],
            Node::Neg(inner) => -inner.eval(values)?,
            Node::Binary(op, l, r) => {
                let a = l.eval(values)?;
                let b = r.eval(values)?;
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        a / b
                    }
                    BinaryOp::Pow => power(a, b)?,
                }
            }
            Node::Builtin(f, args) => {
                let args = args
                    .iter()
                    .map(|a| a.eval(values))
                    .collect::<Result<Vec<_>, _>>()?;
                f.apply(&args)?
            }
            Node::User(f, args) => {
                let args = args
                    .iter()
                    .map(|a| a.eval(values))
                    .collect::<Result<Vec<_>, _>>()?;
                (f.func)(&args)?
            }
        };
        if value.is_infinite() {
            return Err(EvalError::Domain("non-finite result".to_string()));
        }
        Ok(value)
    }

    /// Slots read by this node
    pub fn slots(&self, out: &mut Vec<usize>) {
        match self {
            Node::Const(_) => {}
            Node::Slot(i) => out.push(*i),
            Node::Neg(inner) => inner.slots(out),
            Node::Binary(_, l, r) => {
                l.slots(out);
                r.slots(out);
            }
            Node::Builtin(_, args) | Node::User(_, args) => {
                for a in args {
                    a.slots(out);
                }
            }
        }
    }
}

impl Expr {
    /// Parse an expression from equation text
    pub fn parse(src: &str) -> SfcResult<Expr> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(SfcError::Syntax("empty expression".to_string()));
        }
        let mut parser = ExprParser {
            src,
            tokens: &tokens,
            pos: 0,
        };
        let expr = parser.additive()?;
        if parser.pos != tokens.len() {
            return Err(SfcError::Syntax(format!(
                "unexpected trailing input at byte {} in '{}'",
                tokens[parser.pos].start, src
            )));
        }
        Ok(expr)
    }

    /// Resolve names into a [`Node`].
    ///
    /// `slot_of` maps variable names to slots; `user_fn` looks up
    /// user-registered functions. Unknown names are a [`SfcError::Name`].
    pub fn compile(
        &self,
        slot_of: &dyn Fn(&str) -> Option<usize>,
        user_fn: &dyn Fn(&str) -> Option<UserFunction>,
    ) -> SfcResult<Node> {
        let node = match self {
            Expr::Const(c) => Node::Const(*c),
            Expr::Var(name) => match slot_of(name) {
                Some(slot) => Node::Slot(slot),
                None => {
                    return Err(SfcError::Name(format!("undefined variable '{}'", name)));
                }
            },
            Expr::Neg(inner) => Node::Neg(Box::new(inner.compile(slot_of, user_fn)?)),
            Expr::Binary(op, l, r) => Node::Binary(
                *op,
                Box::new(l.compile(slot_of, user_fn)?),
                Box::new(r.compile(slot_of, user_fn)?),
            ),
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| a.compile(slot_of, user_fn))
                    .collect::<SfcResult<Vec<_>>>()?;
                if let Some(func) = user_fn(name) {
                    Node::User(
                        BoundFunction {
                            name: name.clone(),
                            func,
                        },
                        args,
                    )
                } else if let Some(builtin) = Builtin::from_name(name) {
                    let (lo, hi) = builtin.arity();
                    if args.len() < lo || hi.map_or(false, |hi| args.len() > hi) {
                        let expected = match hi {
                            Some(hi) if hi == lo => lo.to_string(),
                            Some(hi) => format!("{}..{}", lo, hi),
                            None => format!("at least {}", lo),
                        };
                        return Err(SfcError::Syntax(
                            EvalError::Arity {
                                name: builtin.name().to_string(),
                                expected,
                                got: args.len(),
                            }
                            .to_string(),
                        ));
                    }
                    Node::Builtin(builtin, args)
                } else {
                    return Err(SfcError::Name(format!("unknown function '{}'", name)));
                }
            }
        };
        Ok(node)
    }

    /// Evaluate an expression that references no variables
    pub fn eval_constant(&self, user_fn: &dyn Fn(&str) -> Option<UserFunction>) -> SfcResult<f64> {
        let node = self.compile(&|_| None, user_fn)?;
        node.eval(&[]).map_err(|e| SfcError::Syntax(format!("cannot evaluate constant: {}", e)))
    }
}

struct ExprParser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&TokenKind> {
        let t = self.tokens.get(self.pos).map(|t| &t.kind);
        self.pos += 1;
        t
    }

    fn error(&self, what: &str) -> SfcError {
        SfcError::Syntax(format!("{} in '{}'", what, self.src))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> SfcResult<()> {
        match self.next() {
            Some(k) if *k == kind => Ok(()),
            _ => Err(self.error(what)),
        }
    }

    fn additive(&mut self) -> SfcResult<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> SfcResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> SfcResult<Expr> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // -2^2 parses as -(2^2); the exponent binds right to left
    fn power(&mut self) -> SfcResult<Expr> {
        let base = self.primary()?;
        if let Some(TokenKind::Caret) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> SfcResult<Expr> {
        match self.next().cloned() {
            Some(TokenKind::Number(v)) => Ok(Expr::Const(v)),
            Some(TokenKind::Ident(name)) => {
                if let Some(TokenKind::LParen) = self.peek() {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if let Some(TokenKind::RParen) = self.peek() {
                        self.pos += 1;
                        return Ok(Expr::Call(name, args));
                    }
                    loop {
                        args.push(self.additive()?);
                        match self.next() {
                            Some(TokenKind::Comma) => continue,
                            Some(TokenKind::RParen) => break,
                            _ => return Err(self.error("expected ',' or ')' in call")),
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(TokenKind::LParen) => {
                let inner = self.additive()?;
                self.expect(TokenKind::RParen, "unmatched parenthesis")?;
                Ok(inner)
            }
            Some(_) => Err(self.error("unexpected token")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval_with(src: &str, names: &[&str], values: &[f64]) -> Result<f64, EvalError> {
        let expr = Expr::parse(src).unwrap();
        let node = expr
            .compile(&|n| names.iter().position(|x| *x == n), &|_| None)
            .unwrap();
        node.eval(values)
    }

    #[test]
    fn test_precedence() {
        assert_relative_eq!(eval_with("1 + 2 * 3", &[], &[]).unwrap(), 7.0);
        assert_relative_eq!(eval_with("(1 + 2) * 3", &[], &[]).unwrap(), 9.0);
        assert_relative_eq!(eval_with("2 ^ 3 ^ 2", &[], &[]).unwrap(), 512.0);
        assert_relative_eq!(eval_with("-2 ^ 2", &[], &[]).unwrap(), -4.0);
        assert_relative_eq!(eval_with("10 - 4 - 3", &[], &[]).unwrap(), 3.0);
        assert_relative_eq!(eval_with("2**-1", &[], &[]).unwrap(), 0.5);
    }

    #[test]
    fn test_variables_and_functions() {
        let v = eval_with(
            "AlphaIncome * AfterTax + AlphaFin * LAG_F",
            &["AlphaIncome", "AfterTax", "AlphaFin", "LAG_F"],
            &[0.6, 80.0, 0.4, 80.0],
        )
        .unwrap();
        assert_relative_eq!(v, 80.0);
        assert_relative_eq!(eval_with("max(x, 0, -1)", &["x"], &[-3.0]).unwrap(), 0.0);
        assert_relative_eq!(eval_with("round(2.345, 2)", &[], &[]).unwrap(), 2.35, epsilon = 1e-12);
        assert_relative_eq!(eval_with("sum(1, 2, 3)", &[], &[]).unwrap(), 6.0);
        assert_relative_eq!(eval_with("sqrt(p)", &["p"], &[4.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_eval_errors() {
        assert_eq!(eval_with("1/x", &["x"], &[0.0]), Err(EvalError::DivisionByZero));
        assert!(matches!(eval_with("sqrt(x)", &["x"], &[-1.0]), Err(EvalError::Domain(_))));
        assert!(matches!(eval_with("log(0)", &[], &[]), Err(EvalError::Domain(_))));
    }

    #[test]
    fn test_compile_errors() {
        let expr = Expr::parse("y + 1").unwrap();
        assert!(matches!(expr.compile(&|_| None, &|_| None), Err(SfcError::Name(_))));
        let expr = Expr::parse("pow(2)").unwrap();
        assert!(matches!(expr.compile(&|_| None, &|_| None), Err(SfcError::Syntax(_))));
        let expr = Expr::parse("nosuch(2)").unwrap();
        assert!(matches!(expr.compile(&|_| None, &|_| None), Err(SfcError::Name(_))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("(a + b").is_err());
        assert!(Expr::parse("a +").is_err());
        assert!(Expr::parse("a b").is_err());
        assert!(Expr::parse("").is_err());
    }

    #[test]
    fn test_user_function() {
        let double: UserFunction = Arc::new(|args: &[f64]| Ok(2.0 * args[0]));
        let expr = Expr::parse("double(x) + 1").unwrap();
        let node = expr
            .compile(&|n| if n == "x" { Some(0) } else { None }, &|n| {
                if n == "double" {
                    Some(double.clone())
                } else {
                    None
                }
            })
            .unwrap();
        assert_relative_eq!(node.eval(&[3.0]).unwrap(), 7.0);
    }
}
