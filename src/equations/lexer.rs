//! Tokenizer for right-hand-side expressions

use crate::error::{SfcError, SfcResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    /// `^` or `**`
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// A token with its byte span in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// True for tokens after which a `+`/`-` is a binary operator
    pub fn ends_operand(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Ident(_) | TokenKind::Number(_) | TokenKind::RParen | TokenKind::RBracket
        )
    }
}

pub fn tokenize(src: &str) -> SfcResult<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Ident(src[start..i].to_string())
        } else if c.is_ascii_digit() || c == b'.' {
            i = number_end(bytes, i);
            let literal = &src[start..i];
            let value: f64 = literal.parse().map_err(|_| {
                SfcError::Syntax(format!("invalid number '{}' in '{}'", literal, src))
            })?;
            TokenKind::Number(value)
        } else {
            i += 1;
            match c {
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => {
                    if i < bytes.len() && bytes[i] == b'*' {
                        i += 1;
                        TokenKind::Caret
                    } else {
                        TokenKind::Star
                    }
                }
                b'/' => TokenKind::Slash,
                b'^' => TokenKind::Caret,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b',' => TokenKind::Comma,
                _ => {
                    let ch = src[start..].chars().next().unwrap_or('?');
                    return Err(SfcError::Syntax(format!(
                        "unexpected character '{}' in '{}'",
                        ch, src
                    )));
                }
            }
        };

        tokens.push(Token { kind, start, end: i });
    }

    Ok(tokens)
}

fn number_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_expression() {
        assert_eq!(
            kinds("a*2.5e-1 - max(b,1)"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Star,
                TokenKind::Number(0.25),
                TokenKind::Minus,
                TokenKind::Ident("max".into()),
                TokenKind::LParen,
                TokenKind::Ident("b".into()),
                TokenKind::Comma,
                TokenKind::Number(1.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_double_star_is_power() {
        assert_eq!(
            kinds("x**2"),
            vec![TokenKind::Ident("x".into()), TokenKind::Caret, TokenKind::Number(2.0)]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize(" ab + 1").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (1, 3));
        assert_eq!((tokens[2].start, tokens[2].end), (6, 7));
    }

    #[test]
    fn test_rejects_unknown_character() {
        assert!(matches!(tokenize("a $ b"), Err(SfcError::Syntax(_))));
        assert!(matches!(tokenize("1.2.3"), Err(SfcError::Syntax(_))));
    }
}
