//! Capture-group bookkeeping for compiled matchers.
//!
//! Field names are drawn from a wider alphabet than regex group identifiers
//! (`foo-bar`, `[nested][field]`, `@meta`), and the same field may be captured
//! by several branches of one pattern. Every generated group therefore gets an
//! internal identifier, and a [`CaptureField`] records which external field it
//! feeds and how its text is coerced.

use crate::error::{GrokError, Result};
use serde_json::{Number, Value};

/// Prefix reserved for generated group identifiers.
pub(crate) const GROUP_PREFIX: &str = "__grok";

/// Type conversion applied to captured text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coercion {
    /// Keep the raw matched substring.
    #[default]
    None,
    /// Parse as a 64-bit integer.
    Int,
    /// Parse as a 64-bit float.
    Float,
}

impl Coercion {
    /// Parse the `TYPE` suffix of a `%{SYNTAX:SEMANTIC:TYPE}` reference.
    pub fn parse(suffix: &str, semantic: &str) -> Result<Self> {
        match suffix {
            "int" => Ok(Coercion::Int),
            "float" => Ok(Coercion::Float),
            other => Err(GrokError::UnknownCoercion {
                coercion: other.to_string(),
                semantic: semantic.to_string(),
            }),
        }
    }

    /// Convert captured text into a field value.
    ///
    /// Text that cannot be converted yields `Value::Null`. Integer coercion of
    /// decimal text truncates toward zero.
    pub fn apply(self, text: &str) -> Value {
        match self {
            Coercion::None => Value::String(text.to_string()),
            Coercion::Int => {
                let trimmed = text.trim();
                if let Ok(int) = trimmed.parse::<i64>() {
                    return Value::from(int);
                }
                if let Ok(int) = trimmed.parse::<u64>() {
                    return Value::from(int);
                }
                // `i64::MAX as f64` rounds up to 2^63, hence the open upper bound.
                match trimmed.parse::<f64>().map(f64::trunc) {
                    Ok(t) if t >= i64::MIN as f64 && t < i64::MAX as f64 => Value::from(t as i64),
                    _ => Value::Null,
                }
            }
            Coercion::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
        }
    }
}

/// A named group in a compiled expression and the field it populates.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureField {
    /// Group identifier inside the compiled expression.
    pub group: String,
    /// External field name.
    pub field: String,
    pub coercion: Coercion,
}

pub(crate) fn internal_group_name(index: usize) -> String {
    format!("{GROUP_PREFIX}{index}")
}

/// Named groups of `expression` in order of their opening parenthesis.
///
/// Escapes and character classes are skipped, and look-behind assertions
/// (`(?<=`, `(?<!`) are not groups.
pub(crate) fn named_groups(expression: &str) -> Vec<String> {
    let bytes = expression.as_bytes();
    let mut groups = Vec::new();
    let mut in_class = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class && expression[i..].starts_with("(?<") => {
                let rest = &expression[i + 3..];
                let ident_len = rest
                    .char_indices()
                    .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
                    .map_or(rest.len(), |(idx, _)| idx);
                if ident_len > 0 && rest[ident_len..].starts_with('>') {
                    groups.push(rest[..ident_len].to_string());
                    i += 3 + ident_len;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    groups
}
