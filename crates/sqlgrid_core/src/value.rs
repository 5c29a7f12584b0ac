//! Cell values and the typed comparator shared by sorting and export ordering.

use crate::schema::Affinity;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// A single cell value as produced by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Numeric view of a value, used for equality filters and ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(value) => value as f64,
            Number::Real(value) => value,
        }
    }

    /// Numeric equality across integer and real representations.
    pub fn equals(self, other: Number) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a.cmp(&b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }
}

/// Parse a user-entered number.
///
/// Accepts `,` as a decimal separator. Non-finite results are rejected.
///
/// # Returns
/// `Some(number)` when the trimmed text is an integer or a finite real.
pub fn parse_number(text: &str) -> Option<Number> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    if !normalized.contains('.') {
        if let Ok(value) = normalized.parse::<i64>() {
            return Some(Number::Integer(value));
        }
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Number::Real)
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "left empty" for key capture on insert.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Numeric coercion: integers and reals directly, text when it parses.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(value) => Some(Number::Integer(*value)),
            Value::Real(value) => Some(Number::Real(*value)),
            Value::Text(text) => parse_number(text),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// Text coercion used by substring filters and plain-text rendering.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Integer(value) => Cow::Owned(value.to_string()),
            Value::Real(value) => Cow::Owned(format_real(*value)),
            Value::Text(text) => Cow::Borrowed(text.as_str()),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Build a value from text typed into a cell editor.
    ///
    /// Numeric columns map empty input to NULL and reject text that does not
    /// parse as a number. Blob columns store the raw UTF-8 bytes.
    ///
    /// # Returns
    /// `None` when the input is not acceptable for `affinity`.
    pub fn parse_input(text: &str, affinity: Affinity) -> Option<Value> {
        match affinity {
            Affinity::Integer | Affinity::Real => {
                if text.trim().is_empty() {
                    return Some(Value::Null);
                }
                parse_number(text).map(|number| match number {
                    Number::Integer(value) => Value::Integer(value),
                    Number::Real(value) => Value::Real(value),
                })
            }
            Affinity::Blob => Some(Value::Blob(text.as_bytes().to_vec())),
            Affinity::Text | Affinity::Unknown => Some(Value::Text(text.to_string())),
        }
    }

    fn as_number_strict(&self) -> Option<Number> {
        match self {
            Value::Integer(value) => Some(Number::Integer(*value)),
            Value::Real(value) => Some(Number::Real(*value)),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }
}

fn format_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

/// Compare two values in ascending order.
///
/// Null sorts first, then numbers (compared numerically across integer and
/// real), then text (compared case-insensitively), then blobs (bytewise).
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => compare_text_folded(x, y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => match (a.as_number_strict(), b.as_number_strict()) {
            (Some(x), Some(y)) => x.compare(y),
            _ => a.type_rank().cmp(&b.type_rank()),
        },
    }
}

fn compare_text_folded(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_accepts_comma_decimal_separator() {
        assert_eq!(parse_number(" 42 "), Some(Number::Integer(42)));
        assert_eq!(parse_number("2,5"), Some(Number::Real(2.5)));
        assert_eq!(parse_number("1e3"), Some(Number::Real(1000.0)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert!(Number::Integer(3).equals(Number::Real(3.0)));
        assert!(!Number::Integer(3).equals(Number::Real(3.5)));
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Real(2.5)),
            Ordering::Less
        );
    }

    #[test]
    fn text_comparison_ignores_case() {
        assert_eq!(
            compare_values(&Value::from("apple"), &Value::from("Banana")),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::from("ABC"), &Value::from("abc")),
            Ordering::Equal
        );
    }

    #[test]
    fn mixed_types_follow_storage_class_order() {
        let ordered = [
            Value::Null,
            Value::Integer(10),
            Value::from("10"),
            Value::Blob(vec![0]),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn text_coercion_matches_storage_rendering() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Integer(-7).to_text(), "-7");
        assert_eq!(Value::Real(3.0).to_text(), "3.0");
        assert_eq!(Value::Real(0.25).to_text(), "0.25");
        assert_eq!(Value::Blob(b"raw".to_vec()).to_text(), "raw");
    }

    #[test]
    fn parse_input_respects_column_affinity() {
        assert_eq!(
            Value::parse_input("", Affinity::Integer),
            Some(Value::Null)
        );
        assert_eq!(
            Value::parse_input("12", Affinity::Real),
            Some(Value::Integer(12))
        );
        assert_eq!(Value::parse_input("twelve", Affinity::Integer), None);
        assert_eq!(
            Value::parse_input("", Affinity::Text),
            Some(Value::from(""))
        );
        assert_eq!(
            Value::parse_input("ab", Affinity::Blob),
            Some(Value::Blob(b"ab".to_vec()))
        );
    }

    #[test]
    fn empty_detection_covers_null_and_blank_text() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(!Value::Integer(0).is_empty());
    }
}
