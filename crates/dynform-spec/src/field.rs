use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of field kinds understood by the form engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Text,
    Choice,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Text => "text",
            FieldKind::Choice => "choice",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field description as served by `GET /form`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    #[serde(rename = "widget")]
    pub declared_kind: FieldKind,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, declared_kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            declared_kind,
        }
    }
}

/// A field after its declared kind has been reconciled with lexical evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFieldSpec {
    #[serde(flatten)]
    pub spec: FieldSpec,
    pub resolved_kind: FieldKind,
    pub overridden: bool,
}

impl ResolvedFieldSpec {
    pub fn new(spec: FieldSpec, resolved_kind: FieldKind) -> Self {
        let overridden = spec.declared_kind != resolved_kind;
        Self {
            spec,
            resolved_kind,
            overridden,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn is_choice(&self) -> bool {
        self.resolved_kind == FieldKind::Choice
    }
}

/// Structural problems in a served field list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field at position {0} has an empty id")]
    EmptyId(usize),
    #[error("field id '{0}' appears more than once")]
    DuplicateId(String),
}

/// Checks that every field id is non-empty and unique.
pub fn check_field_list(fields: &[FieldSpec]) -> Result<(), SchemaError> {
    let mut seen = BTreeSet::new();
    for (idx, field) in fields.iter().enumerate() {
        if field.id.is_empty() {
            return Err(SchemaError::EmptyId(idx));
        }
        if !seen.insert(field.id.as_str()) {
            return Err(SchemaError::DuplicateId(field.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_wire_field() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "age",
            "label": "Age",
            "widget": "text"
        }))
        .expect("field should decode");
        assert_eq!(field, FieldSpec::new("age", "Age", FieldKind::Text));
    }

    #[test]
    fn unknown_widget_fails_decoding() {
        let err = serde_json::from_value::<FieldSpec>(json!({
            "id": "when",
            "label": "When",
            "widget": "date"
        }))
        .expect_err("unknown widget must not decode");
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let fields = vec![
            FieldSpec::new("a", "A", FieldKind::Text),
            FieldSpec::new("a", "A again", FieldKind::Integer),
        ];
        assert_eq!(
            check_field_list(&fields),
            Err(SchemaError::DuplicateId("a".into()))
        );
    }

    #[test]
    fn rejects_empty_id() {
        let fields = vec![
            FieldSpec::new("a", "A", FieldKind::Text),
            FieldSpec::new("", "Blank", FieldKind::Text),
        ];
        assert_eq!(check_field_list(&fields), Err(SchemaError::EmptyId(1)));
    }
}
