//! Identifier utilities for equation text
//!
//! Scanning here is deliberately lenient: it only needs to find identifier
//! spans (skipping numeric literals such as `1e-5`), so it also works on
//! exogenous series literals and lag markers like `F(k-1)`.

use std::collections::HashMap;

use crate::error::{SfcError, SfcResult};

/// Delimiter between a sector's full code and a local variable name
pub const DELIMITER: &str = "__";

/// Name of the discrete time index supplied by the solver
pub const TIME_INDEX: &str = "k";

/// Name of the time variable injected as `t = k` when absent
pub const TIME_VARIABLE: &str = "t";

/// Solver control: number of steps to simulate
pub const MAX_TIME: &str = "MaxTime";

/// Solver control: convergence tolerance
pub const ERR_TOLERANCE: &str = "Err_Tolerance";

/// Words that may never be used as a variable name or as a token.
///
/// The set is the union of the Rust keywords, the common expression-language
/// keywords and literals (`if`, `lambda`, `True`, `nan`, ...), the usual
/// scripting built-in names (`len`, `range`, `list`, `print`, ...) and the
/// prelude type names. Numeric functions in [`allowed_functions`] are
/// callable but are not in this set.
const RESERVED_WORDS: &[&str] = &[
    // Rust keywords
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
    "trait", "true", "type", "unsafe", "use", "where", "while", "yield",
    // expression-language keywords and literals
    "and", "or", "not", "xor", "then", "elif", "is", "def", "lambda", "import", "from",
    "class", "pass", "del", "global", "nonlocal", "try", "except", "finally", "raise",
    "with", "assert", "True", "False", "None", "null", "inf", "nan", "exogenous",
    // scripting built-ins
    "len", "range", "list", "dict", "set", "tuple", "str", "int", "float", "bool",
    "print", "input", "open", "map", "filter", "zip", "sorted", "reversed", "enumerate",
    "iter", "next", "any", "all", "eval", "exec", "hash", "id", "object", "format",
    // prelude names
    "Some", "Ok", "Err", "Option", "Result", "Vec", "String", "Box",
];

/// Numeric functions available inside right-hand sides
const ALLOWED_FUNCTIONS: &[&str] = &[
    "min", "max", "abs", "pow", "round", "sum", "sqrt", "exp", "log", "log10", "sin",
    "cos", "tan", "floor", "ceil",
];

/// Reserved identifiers, for callers that want to validate names up front
pub fn reserved_words() -> &'static [&'static str] {
    RESERVED_WORDS
}

/// Built-in functions allowed as call tokens (but not as variable names)
pub fn allowed_functions() -> &'static [&'static str] {
    ALLOWED_FUNCTIONS
}

/// True if `name` is a reserved word
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// True if `name` is one of the built-in numeric functions
pub fn is_builtin_function(name: &str) -> bool {
    ALLOWED_FUNCTIONS.contains(&name)
}

/// True if `name` is a syntactically valid identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check a sector-local variable name.
///
/// Local names must be identifiers, must not contain the `__` delimiter,
/// and must not collide with reserved words, built-in functions or `k`.
pub fn validate_local_name(name: &str) -> SfcResult<()> {
    if !is_identifier(name) {
        return Err(SfcError::Syntax(format!("'{}' is not a valid variable name", name)));
    }
    if name.contains(DELIMITER) {
        return Err(SfcError::Logic(format!(
            "local variable name '{}' may not contain '{}'",
            name, DELIMITER
        )));
    }
    validate_variable_name(name)
}

/// Check that a (possibly decorated) name may be assigned to.
pub fn validate_variable_name(name: &str) -> SfcResult<()> {
    if is_reserved(name) || is_builtin_function(name) || name == TIME_INDEX {
        return Err(SfcError::Name(format!("'{}' is a reserved name", name)));
    }
    Ok(())
}

/// Build the decorated name `{full_code}__{local}`
pub fn decorated_name(full_code: &str, local: &str) -> String {
    format!("{}{}{}", full_code, DELIMITER, local)
}

/// Byte spans of all identifiers in `text`
fn identifier_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            spans.push((start, i));
        } else if c.is_ascii_digit()
            || (c == b'.' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit())
        {
            i = skip_number(bytes, i);
        } else {
            i += 1;
        }
    }

    spans
}

/// Advance past a numeric literal, including an exponent suffix
fn skip_number(bytes: &[u8], mut i: usize) -> usize {
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

/// All identifier tokens in `text`, in order of appearance (duplicates kept)
pub fn extract_tokens(text: &str) -> Vec<String> {
    identifier_spans(text)
        .into_iter()
        .map(|(s, e)| text[s..e].to_string())
        .collect()
}

/// Replace whole-identifier occurrences of `old` by `new`
pub fn replace_token(text: &str, old: &str, new: &str) -> String {
    let mut lookup = HashMap::new();
    lookup.insert(old.to_string(), new.to_string());
    replace_tokens_from_lookup(text, &lookup)
}

/// Replace every identifier found in `lookup` by its mapped value.
///
/// Substrings of longer identifiers are never touched, so replacing `x`
/// leaves `x2` and `LAG_x` alone.
pub fn replace_tokens_from_lookup(text: &str, lookup: &HashMap<String, String>) -> String {
    if lookup.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in identifier_spans(text) {
        if let Some(replacement) = lookup.get(&text[start..end]) {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Concatenate signed terms into a canonical right-hand side.
///
/// Unsigned terms get a `+`; the leading `+` is dropped; an empty list
/// renders as `0.0`.
pub fn create_equation_from_terms<S: AsRef<str>>(terms: &[S]) -> String {
    let mut out = String::new();
    for term in terms {
        let term = term.as_ref().trim();
        if term.is_empty() {
            continue;
        }
        if !term.starts_with('+') && !term.starts_with('-') {
            out.push('+');
        }
        out.push_str(term);
    }
    let out = out.strip_prefix('+').unwrap_or(&out).to_string();
    if out.is_empty() {
        "0.0".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tokens_skips_numbers() {
        let tokens = extract_tokens("0.5*x + 1e-5*y2 - max(z, .3)");
        assert_eq!(tokens, vec!["x", "y2", "max", "z"]);
    }

    #[test]
    fn test_extract_tokens_lag_marker() {
        let tokens = extract_tokens("F(k-1) + LAG_F");
        assert_eq!(tokens, vec!["F", "k", "LAG_F"]);
    }

    #[test]
    fn test_replace_token_is_token_safe() {
        let out = replace_token("x + x2 + LAG_x + x*x", "x", "HH__x");
        assert_eq!(out, "HH__x + x2 + LAG_x + HH__x*HH__x");
    }

    #[test]
    fn test_replace_tokens_from_lookup() {
        let mut lookup = HashMap::new();
        lookup.insert("F".to_string(), "HH__F".to_string());
        lookup.insert("LAG_F".to_string(), "HH__LAG_F".to_string());
        assert_eq!(
            replace_tokens_from_lookup("F(k-1)", &lookup),
            "HH__F(k-1)"
        );
        assert_eq!(
            replace_tokens_from_lookup("LAG_F + 2e3*F", &lookup),
            "HH__LAG_F + 2e3*HH__F"
        );
    }

    #[test]
    fn test_create_equation_from_terms() {
        assert_eq!(create_equation_from_terms(&["x", "-y", "+z"]), "x-y+z");
        assert_eq!(create_equation_from_terms(&["-y"]), "-y");
        let empty: [&str; 0] = [];
        assert_eq!(create_equation_from_terms(&empty), "0.0");
    }

    #[test]
    fn test_local_name_rules() {
        assert!(validate_local_name("DEM_GOOD").is_ok());
        assert!(matches!(validate_local_name("HH__F"), Err(SfcError::Logic(_))));
        assert!(matches!(validate_local_name("max"), Err(SfcError::Name(_))));
        assert!(matches!(validate_local_name("if"), Err(SfcError::Name(_))));
        assert!(matches!(validate_local_name("k"), Err(SfcError::Name(_))));
        assert!(matches!(validate_local_name("2x"), Err(SfcError::Syntax(_))));
    }

    #[test]
    fn test_reserved_lists_are_disjoint() {
        for f in allowed_functions() {
            assert!(!is_reserved(f), "{} should be callable", f);
        }
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        for name in ["len", "range", "list", "print", "type", "self", "Some", "import"] {
            assert!(matches!(validate_local_name(name), Err(SfcError::Name(_))), "{}", name);
        }
        assert!(validate_local_name("length").is_ok());
        assert!(validate_local_name("LIST").is_ok());
    }
}
