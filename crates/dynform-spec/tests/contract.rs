use serde_json::json;

use dynform_spec::{
    ErrorCode, FieldKind, FieldSpec, FieldValue, FormValues, ReviewNote, ValidationContract,
    resolve_fields,
};

fn sample_fields() -> Vec<FieldSpec> {
    serde_json::from_value(json!([
        { "id": "age", "label": "Age", "widget": "text" },
        { "id": "company_name", "label": "Company Name", "widget": "integer" },
        { "id": "favourite", "label": "Favourite", "widget": "choice" },
        { "id": "code", "label": "Code", "widget": "integer" }
    ]))
    .expect("fixture should deserialize")
}

fn sample_contract() -> ValidationContract {
    ValidationContract::compile(&resolve_fields(&sample_fields()))
}

#[test]
fn contract_keys_match_field_ids() {
    let contract = sample_contract();
    let ids: Vec<&str> = contract.field_ids().collect();
    assert_eq!(ids, ["age", "company_name", "favourite", "code"]);
    assert_eq!(contract.len(), 4);
}

#[test]
fn integer_rule_coerces_and_rejects() {
    let contract = sample_contract();
    let ok = contract.validate_field("code", "42").expect("42 is valid");
    assert_eq!(ok.value, FieldValue::Integer(42));

    let err = contract.validate_field("code", "4.2").expect_err("decimal");
    assert_eq!(err.code, ErrorCode::WholeNumber);
    assert_eq!(err.message, "Code must be a valid whole number (e.g., 123, -45)");

    let err = contract.validate_field("code", "").expect_err("empty");
    assert_eq!(err.message, "Code is required");
}

#[test]
fn text_rule_checks_length_and_flags_digits() {
    let contract = sample_contract();
    let err = contract
        .validate_field("company_name", "a")
        .expect_err("too short");
    assert_eq!(err.message, "Company Name must be at least 2 characters");

    let ok = contract.validate_field("company_name", "ab").expect("ab");
    assert_eq!(ok.review, None);

    for digits in ["12345", "123456"] {
        let ok = contract
            .validate_field("company_name", digits)
            .expect("digits are accepted");
        assert_eq!(ok.value, FieldValue::Text(digits.into()));
        assert_eq!(ok.review, Some(ReviewNote::DigitsOnlyText));
    }
}

#[test]
fn choice_rule_only_requires_a_value() {
    let contract = sample_contract();
    assert!(contract.validate_field("favourite", "anything").is_ok());
    let err = contract.validate_field("favourite", "").expect_err("empty");
    assert_eq!(err.message, "Favourite is required");
}

#[test]
fn unknown_field_is_rejected_incrementally() {
    let contract = sample_contract();
    let err = contract.validate_field("nope", "1").expect_err("unknown");
    assert_eq!(err.code, ErrorCode::UnknownField);
}

#[test]
fn evaluate_builds_payload_when_valid() {
    let contract = sample_contract();
    let values: FormValues = [
        ("age", " 30 "),
        ("company_name", "Acme"),
        ("favourite", "blue"),
        ("code", "-7"),
    ]
    .into_iter()
    .collect();
    let report = contract.evaluate(&values);
    assert!(report.valid);
    assert_eq!(
        serde_json::Value::Object(report.payload),
        json!({ "age": 30, "company_name": "Acme", "favourite": "blue", "code": -7 })
    );
}

#[test]
fn evaluate_reports_missing_and_unknown_fields() {
    let contract = sample_contract();
    let values: FormValues = [("age", "thirty"), ("extra", "x")].into_iter().collect();
    let report = contract.evaluate(&values);
    assert!(!report.valid);
    assert_eq!(report.unknown_fields, vec!["extra".to_string()]);
    assert_eq!(
        report.error_for("age").map(|e| e.message.as_str()),
        Some("Age must be a valid whole number (e.g., 123, -45)")
    );
    assert_eq!(
        report.error_for("favourite").map(|e| e.code),
        Some(ErrorCode::Required)
    );
    assert_eq!(report.errors.len(), 4);
    assert_eq!(report.review.len(), 1);
    assert_eq!(report.review[0].note, ReviewNote::LettersInNumber);
}

#[test]
fn duplicate_ids_keep_first_rule() {
    let fields = vec![
        FieldSpec::new("x", "First", FieldKind::Integer),
        FieldSpec::new("x", "Second", FieldKind::Text),
    ];
    let contract = ValidationContract::compile(&resolve_fields(&fields));
    assert_eq!(contract.len(), 1);
    assert_eq!(contract.rule("x").map(|rule| rule.label()), Some("First"));
}
