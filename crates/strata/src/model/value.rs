//! Row values and the missing-value predicate.
//!
//! Rows enter the model as opaque JSON objects plus their original index in
//! the data set. Columns read a single field out of the object and interpret
//! it according to their kind; everything about loading, parsing, and storing
//! the data itself lives outside the model.

use serde_json::Value;

/// A single data row: an opaque JSON payload plus its original index.
///
/// The index is the row's position in the externally-owned data set and is
/// used as the final, stable tie-breaker when sorting.
#[derive(Debug, Clone)]
pub struct Row {
    /// The row payload. Columns read named fields out of this value.
    pub data: Value,
    /// Position of this row in the original data set.
    pub index: usize,
}

impl Row {
    /// Creates a row from a JSON payload and its original index.
    pub fn new(data: Value, index: usize) -> Self {
        Self { data, index }
    }

    /// Reads a named field from the row payload.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// The shared missing-value predicate.
///
/// A value is missing when it is absent, `null`, an empty string, or an
/// empty array. (JSON cannot represent NaN; a NaN numeric cell arrives here
/// as `null`.)
pub fn is_missing_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

/// Coerces a JSON value to a number, if it is one.
pub fn as_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Stringifies a JSON value the way cell labels expect: strings verbatim,
/// everything else via its JSON rendering, missing values as the empty string.
pub fn as_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_values() {
        assert!(is_missing_value(None));
        assert!(is_missing_value(Some(&Value::Null)));
        assert!(is_missing_value(Some(&json!(""))));
        assert!(is_missing_value(Some(&json!([]))));
        assert!(!is_missing_value(Some(&json!(0))));
        assert!(!is_missing_value(Some(&json!("x"))));
        assert!(!is_missing_value(Some(&json!(false))));
    }

    #[test]
    fn test_row_field() {
        let row = Row::new(json!({"name": "Alice", "age": 30}), 0);
        assert_eq!(row.field("name"), Some(&json!("Alice")));
        assert_eq!(row.field("missing"), None);
    }

    #[test]
    fn test_coercions() {
        assert_eq!(as_number(Some(&json!(1.5))), Some(1.5));
        assert_eq!(as_number(Some(&json!("1.5"))), None);
        assert_eq!(as_text(Some(&json!("abc"))), "abc");
        assert_eq!(as_text(Some(&json!(3))), "3");
        assert_eq!(as_text(None), "");
    }
}
