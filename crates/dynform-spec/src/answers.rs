use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw user input keyed by field id, as typed or selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field_id: impl Into<String>, raw: impl Into<String>) {
        self.0.insert(field_id.into(), raw.into());
    }

    pub fn get(&self, field_id: &str) -> Option<&str> {
        self.0.get(field_id).map(String::as_str)
    }

    pub fn remove(&mut self, field_id: &str) -> Option<String> {
        self.0.remove(field_id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A value after coercion by its field rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Integer(value) => Value::from(*value),
            FieldValue::Text(value) => Value::String(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    MinLength,
    WholeNumber,
    UnknownField,
}

/// User-facing validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field_id: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewNote>,
}

/// Operator-facing signal that never blocks submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewNote {
    /// A text field received only digits; it may really be numeric.
    DigitsOnlyText,
    /// A numeric field received letters; it may really be textual.
    LettersInNumber,
}

impl ReviewNote {
    pub fn describe(self) -> &'static str {
        match self {
            ReviewNote::DigitsOnlyText => {
                "text field contains only numbers; consider whether it should be numeric"
            }
            ReviewNote::LettersInNumber => {
                "integer field contains letters; it might be incorrectly configured as numeric"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReview {
    pub field_id: String,
    pub note: ReviewNote,
}

/// Successful single-field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedValue {
    pub value: FieldValue,
    pub review: Option<ReviewNote>,
}

/// Result of evaluating a whole form against its contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormReport {
    pub valid: bool,
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review: Vec<FieldReview>,
}

impl FormReport {
    pub fn error_for(&self, field_id: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field_id == field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_values_serialize_as_plain_json() {
        assert_eq!(serde_json::to_value(FieldValue::Integer(-3)).unwrap(), json!(-3));
        assert_eq!(
            serde_json::to_value(FieldValue::Text("x".into())).unwrap(),
            json!("x")
        );
        assert_eq!(FieldValue::Integer(30).to_json(), json!(30));
    }

    #[test]
    fn form_values_collect_from_pairs() {
        let values: FormValues = [("age", "30"), ("city", "Pécs")].into_iter().collect();
        assert_eq!(values.get("age"), Some("30"));
        assert_eq!(values.len(), 2);
        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            json!({ "age": "30", "city": "Pécs" })
        );
    }
}
