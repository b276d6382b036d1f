use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;

use crate::answers::{
    CheckedValue, ErrorCode, FieldError, FieldReview, FieldValue, FormReport, FormValues,
    ReviewNote,
};
use crate::field::{FieldKind, ResolvedFieldSpec};

static WHOLE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("whole number pattern is valid"));
static DIGITS_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("digits pattern is valid"));
static HAS_LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]").expect("letters pattern is valid"));

const TEXT_MIN_LEN: usize = 2;

/// Shape check applied to one field's raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Trimmed input must be a signed whole number; coerces to `i64`.
    WholeNumber,
    /// Raw input must be at least two characters long.
    Text,
    /// Raw input must be non-empty; nothing else is checked.
    Required,
}

impl RuleKind {
    fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Integer => RuleKind::WholeNumber,
            FieldKind::Text => RuleKind::Text,
            // Membership in the fetched choice set is deliberately not enforced here.
            FieldKind::Choice => RuleKind::Required,
        }
    }
}

/// Compiled validation and coercion rule for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    field_id: String,
    label: String,
    kind: RuleKind,
}

impl FieldRule {
    pub fn new(field_id: impl Into<String>, label: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            field_id: field_id.into(),
            label: label.into(),
            kind,
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn check(&self, raw: &str) -> Result<CheckedValue, FieldError> {
        match self.kind {
            RuleKind::WholeNumber => self.check_whole_number(raw),
            RuleKind::Text => self.check_text(raw),
            RuleKind::Required => {
                if raw.is_empty() {
                    return Err(self.required());
                }
                Ok(CheckedValue {
                    value: FieldValue::Text(raw.to_string()),
                    review: None,
                })
            }
        }
    }

    fn check_whole_number(&self, raw: &str) -> Result<CheckedValue, FieldError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(self.required());
        }
        if !WHOLE_NUMBER.is_match(trimmed) {
            let review = HAS_LETTERS
                .is_match(trimmed)
                .then_some(ReviewNote::LettersInNumber);
            return Err(self.not_whole_number(review));
        }
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| self.not_whole_number(None))?;
        Ok(CheckedValue {
            value: FieldValue::Integer(value),
            review: None,
        })
    }

    fn check_text(&self, raw: &str) -> Result<CheckedValue, FieldError> {
        let len = raw.chars().count();
        if len == 0 {
            return Err(self.required());
        }
        if len < TEXT_MIN_LEN {
            return Err(self.error(
                ErrorCode::MinLength,
                format!("{} must be at least {TEXT_MIN_LEN} characters", self.label),
                None,
            ));
        }
        let review = DIGITS_ONLY
            .is_match(raw)
            .then_some(ReviewNote::DigitsOnlyText);
        Ok(CheckedValue {
            value: FieldValue::Text(raw.to_string()),
            review,
        })
    }

    fn required(&self) -> FieldError {
        self.error(
            ErrorCode::Required,
            format!("{} is required", self.label),
            None,
        )
    }

    fn not_whole_number(&self, review: Option<ReviewNote>) -> FieldError {
        self.error(
            ErrorCode::WholeNumber,
            format!(
                "{} must be a valid whole number (e.g., 123, -45)",
                self.label
            ),
            review,
        )
    }

    fn error(&self, code: ErrorCode, message: String, review: Option<ReviewNote>) -> FieldError {
        FieldError {
            field_id: self.field_id.clone(),
            code,
            message,
            review,
        }
    }
}

/// One rule per field id; rebuilt, never mutated, when the field list changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContract {
    rules: BTreeMap<String, FieldRule>,
    order: Vec<String>,
}

impl ValidationContract {
    /// Compiles a contract from a resolved field list.
    ///
    /// Field ids are expected to be unique; see [`crate::check_field_list`]. If an id
    /// repeats anyway, the first occurrence wins so the key set still equals the id set.
    pub fn compile(fields: &[ResolvedFieldSpec]) -> Self {
        let mut rules = BTreeMap::new();
        let mut order = Vec::with_capacity(fields.len());
        for field in fields {
            if rules.contains_key(field.id()) {
                continue;
            }
            let rule = FieldRule::new(
                field.id(),
                field.label(),
                RuleKind::for_kind(field.resolved_kind),
            );
            rules.insert(field.id().to_string(), rule);
            order.push(field.id().to_string());
        }
        Self { rules, order }
    }

    pub fn rule(&self, field_id: &str) -> Option<&FieldRule> {
        self.rules.get(field_id)
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.rules.contains_key(field_id)
    }

    /// Field ids in the order the service listed them.
    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Re-validates one field without touching the others.
    pub fn validate_field(&self, field_id: &str, raw: &str) -> Result<CheckedValue, FieldError> {
        match self.rules.get(field_id) {
            Some(rule) => rule.check(raw),
            None => Err(unknown_field(field_id)),
        }
    }

    /// Evaluates every field; a field missing from `values` counts as empty input.
    pub fn evaluate(&self, values: &FormValues) -> FormReport {
        let mut payload = Map::new();
        let mut errors = Vec::new();
        let mut review = Vec::new();

        for field_id in &self.order {
            let Some(rule) = self.rules.get(field_id) else {
                continue;
            };
            let raw = values.get(field_id).unwrap_or_default();
            match rule.check(raw) {
                Ok(checked) => {
                    if let Some(note) = checked.review {
                        review.push(FieldReview {
                            field_id: field_id.clone(),
                            note,
                        });
                    }
                    payload.insert(field_id.clone(), checked.value.to_json());
                }
                Err(error) => {
                    if let Some(note) = error.review {
                        review.push(FieldReview {
                            field_id: field_id.clone(),
                            note,
                        });
                    }
                    errors.push(error);
                }
            }
        }

        let unknown_fields: Vec<String> = values
            .iter()
            .filter(|(key, _)| !self.rules.contains_key(*key))
            .map(|(key, _)| key.to_string())
            .collect();

        FormReport {
            valid: errors.is_empty() && unknown_fields.is_empty(),
            payload,
            errors,
            unknown_fields,
            review,
        }
    }
}

fn unknown_field(field_id: &str) -> FieldError {
    FieldError {
        field_id: field_id.to_string(),
        code: ErrorCode::UnknownField,
        message: format!("'{field_id}' is not a field of this form"),
        review: None,
    }
}
