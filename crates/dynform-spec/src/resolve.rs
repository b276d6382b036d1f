use serde::Deserialize;
use thiserror::Error;

use crate::field::{FieldKind, FieldSpec, ResolvedFieldSpec};

const TEXTUAL_TOKENS: &[&str] = &[
    "name",
    "company",
    "email",
    "phone",
    "notes",
    "department",
    "region",
    "city",
    "type",
];

const NUMERIC_TOKENS: &[&str] = &[
    "age", "year", "month", "day", "quantity", "rating", "height", "sku", "width", "version",
    "discount", "price", "priority",
];

/// Errors raised while building custom evidence lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvidenceError {
    #[error("evidence tokens must not be empty")]
    EmptyToken,
    #[error("token '{0}' appears in both the textual and numeric lists")]
    Overlap(String),
}

/// Raw evidence lists, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default)]
    pub textual: Vec<String>,
    #[serde(default)]
    pub numeric: Vec<String>,
}

/// Two disjoint, ordered lists of lower-case substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalEvidence {
    textual: Vec<String>,
    numeric: Vec<String>,
}

impl Default for LexicalEvidence {
    fn default() -> Self {
        Self {
            textual: TEXTUAL_TOKENS.iter().map(|t| t.to_string()).collect(),
            numeric: NUMERIC_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl LexicalEvidence {
    pub fn new<T, N>(textual: T, numeric: N) -> Result<Self, EvidenceError>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let textual = normalize_tokens(textual)?;
        let numeric = normalize_tokens(numeric)?;
        if let Some(shared) = textual.iter().find(|token| numeric.contains(token)) {
            return Err(EvidenceError::Overlap(shared.clone()));
        }
        Ok(Self { textual, numeric })
    }

    /// Builds evidence from configuration, keeping the defaults for any list left empty.
    pub fn from_config(config: &EvidenceConfig) -> Result<Self, EvidenceError> {
        let defaults = Self::default();
        let textual = if config.textual.is_empty() {
            defaults.textual
        } else {
            config.textual.clone()
        };
        let numeric = if config.numeric.is_empty() {
            defaults.numeric
        } else {
            config.numeric.clone()
        };
        Self::new(textual, numeric)
    }

    pub fn textual(&self) -> &[String] {
        &self.textual
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn has_textual(&self, id: &str, label: &str) -> bool {
        matches_any(&self.textual, id, label)
    }

    pub fn has_numeric(&self, id: &str, label: &str) -> bool {
        matches_any(&self.numeric, id, label)
    }
}

fn normalize_tokens<I>(tokens: I) -> Result<Vec<String>, EvidenceError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        let token = token.as_ref().trim().to_lowercase();
        if token.is_empty() {
            return Err(EvidenceError::EmptyToken);
        }
        if !out.contains(&token) {
            out.push(token);
        }
    }
    Ok(out)
}

fn matches_any(tokens: &[String], id: &str, label: &str) -> bool {
    let id = id.to_lowercase();
    let label = label.to_lowercase();
    tokens
        .iter()
        .any(|token| id.contains(token.as_str()) || label.contains(token.as_str()))
}

/// Reconciles declared field kinds with lexical evidence from ids and labels.
#[derive(Debug, Clone, Default)]
pub struct FieldTypeResolver {
    evidence: LexicalEvidence,
}

impl FieldTypeResolver {
    pub fn new(evidence: LexicalEvidence) -> Self {
        Self { evidence }
    }

    pub fn evidence(&self) -> &LexicalEvidence {
        &self.evidence
    }

    /// Resolved kind from id, label and declared kind alone.
    ///
    /// Textual evidence is checked first: when present, the only override is
    /// Integer to Text and every other kind passes through. Numeric evidence
    /// turns Text into Integer. Choice is never overridden.
    pub fn resolve_kind(&self, id: &str, label: &str, declared: FieldKind) -> FieldKind {
        if self.evidence.has_textual(id, label) {
            return match declared {
                FieldKind::Integer => FieldKind::Text,
                other => other,
            };
        }
        if self.evidence.has_numeric(id, label) && declared == FieldKind::Text {
            return FieldKind::Integer;
        }
        declared
    }

    pub fn resolve(&self, field: &FieldSpec) -> ResolvedFieldSpec {
        let kind = self.resolve_kind(&field.id, &field.label, field.declared_kind);
        ResolvedFieldSpec::new(field.clone(), kind)
    }

    pub fn resolve_all(&self, fields: &[FieldSpec]) -> Vec<ResolvedFieldSpec> {
        fields.iter().map(|field| self.resolve(field)).collect()
    }
}

/// Resolves a single field with the default evidence lists.
pub fn resolve_field(field: &FieldSpec) -> ResolvedFieldSpec {
    FieldTypeResolver::default().resolve(field)
}

/// Resolves a whole field list with the default evidence lists.
pub fn resolve_fields(fields: &[FieldSpec]) -> Vec<ResolvedFieldSpec> {
    FieldTypeResolver::default().resolve_all(fields)
}
