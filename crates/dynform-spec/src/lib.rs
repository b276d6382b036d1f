#![allow(missing_docs)]

pub mod answers;
pub mod contract;
pub mod field;
pub mod resolve;

pub use answers::{
    CheckedValue, ErrorCode, FieldError, FieldReview, FieldValue, FormReport, FormValues,
    ReviewNote,
};
pub use contract::{FieldRule, RuleKind, ValidationContract};
pub use field::{FieldKind, FieldSpec, ResolvedFieldSpec, SchemaError, check_field_list};
pub use resolve::{
    EvidenceConfig, EvidenceError, FieldTypeResolver, LexicalEvidence, resolve_field,
    resolve_fields,
};
