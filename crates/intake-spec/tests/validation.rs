use std::time::Instant;

use serde_json::json;

use intake_spec::{
    Answer, AnswerStore, ConfigError, FileAttachment, FileRejected, FormSpec, NavOutcome,
    NavigationConfig, Position, QuestionSpec, QuestionType, Session, StoreError, SubField, check,
    is_satisfied, resolve_visibility, validate, validate_value,
};

fn fixture() -> FormSpec {
    FormSpec::from_json_str(include_str!("fixtures/brand_discovery.json")).expect("fixture")
}

fn parse(value: serde_json::Value) -> Result<FormSpec, ConfigError> {
    FormSpec::from_json_str(&value.to_string())
}

#[test]
fn required_scalar_rejects_missing_and_whitespace() {
    let question = QuestionSpec::new("name", "Name", QuestionType::ShortText).required();
    let mut store = AnswerStore::new();

    let missing = check(&question, &store).unwrap_err();
    assert_eq!(missing.code.as_deref(), Some("required"));
    assert_eq!(missing.message, "This field is required");

    store.set(&question, Answer::text(" \t ")).unwrap();
    assert!(check(&question, &store).is_err());

    store.set(&question, Answer::text("Acme")).unwrap();
    assert!(check(&question, &store).is_ok());
}

#[test]
fn optional_questions_always_pass() {
    let question = QuestionSpec::new("notes", "Notes", QuestionType::LongText);
    assert!(check(&question, &AnswerStore::new()).is_ok());
}

#[test]
fn required_multi_select_needs_a_choice() {
    let spec = fixture();
    let question = spec.question("personality").unwrap();
    let mut store = AnswerStore::new();
    store.set(question, Answer::list(["", "  "])).unwrap();
    let error = check(question, &store).unwrap_err();
    assert_eq!(error.message, "Please select at least one option");
}

#[test]
fn structured_reports_missing_required_labels() {
    let spec = fixture();
    let question = spec.question("contact").unwrap();
    let mut store = AnswerStore::new();
    store
        .set(question, Answer::fields([("Role", "CTO"), ("Notes", "hi")]))
        .unwrap();
    let error = check(question, &store).unwrap_err();
    assert_eq!(error.message, "Please complete: Name");

    store
        .set(question, Answer::fields([("Name", "Ada")]))
        .unwrap();
    assert!(check(question, &store).is_ok());
}

#[test]
fn structured_without_required_sub_fields_passes_unanswered() {
    let question = QuestionSpec::new("contact", "Contact", QuestionType::Structured)
        .required()
        .with_structure(vec![SubField {
            label: "Role".into(),
            ..SubField::default()
        }]);
    let store = AnswerStore::new();
    assert!(is_satisfied(&question, &store));
    assert!(check(&question, &store).is_ok());
}

#[test]
fn structured_without_structure_does_not_trap_navigation() {
    let spec = parse(json!({
        "title": "Bare",
        "questions": [{ "id": "t", "label": "Details", "type": "structured", "required": true }]
    }))
    .unwrap();
    assert!(is_satisfied(&spec.questions[0], &AnswerStore::new()));

    let mut session = Session::new(spec, NavigationConfig::immediate());
    let now = Instant::now();
    session.advance(now);
    assert_eq!(
        session.advance(now),
        NavOutcome::Moved {
            from: Position::Question { index: 0 },
            to: Position::Final
        }
    );
}

#[test]
fn constraints_apply_only_to_text_that_is_present() {
    let mut spec = parse(json!({
        "title": "Constraints",
        "questions": [
            {
                "id": "code",
                "label": "Promo code",
                "type": "short-text",
                "constraint": { "pattern": "^[A-Z]{3}[0-9]{2}$", "minLen": 5, "maxLen": 5 }
            }
        ]
    }))
    .unwrap();
    let question = spec.questions.remove(0);
    let mut store = AnswerStore::new();

    assert!(check(&question, &store).is_ok());

    store.set(&question, Answer::text("abc")).unwrap();
    let error = check(&question, &store).unwrap_err();
    assert_eq!(error.code.as_deref(), Some("pattern_mismatch"));

    store.set(&question, Answer::text("ABC12")).unwrap();
    assert!(check(&question, &store).is_ok());
}

#[test]
fn hidden_required_questions_do_not_block_validation() {
    let spec = fixture();
    let answers = json!({
        "company_name": "Acme",
        "contact": { "Name": "Ada" },
        "email": "ada@example.com",
        "industry": "software",
        "has_brand": "no",
        "personality": ["bold"]
    });
    let result = validate_value(&spec, &answers);
    assert!(result.valid, "{:?}", result);
    assert!(result.missing_required.is_empty());

    let answers = json!({
        "company_name": "Acme",
        "contact": { "Name": "Ada" },
        "email": "ada@example.com",
        "industry": "software",
        "has_brand": "yes",
        "personality": ["bold"]
    });
    let result = validate_value(&spec, &answers);
    assert!(!result.valid);
    assert_eq!(result.missing_required, vec!["brand_assets".to_string()]);
}

#[test]
fn validate_value_flags_unknown_and_mistyped_fields() {
    let spec = fixture();
    let answers = json!({
        "company_name": ["not", "a", "string"],
        "industry": "other",
        "industry_other": "Aerospace",
        "favourite_colour": "blue"
    });
    let result = validate_value(&spec, &answers);
    assert!(!result.valid);
    assert_eq!(result.unknown_fields, vec!["favourite_colour".to_string()]);
    assert!(
        result
            .errors
            .iter()
            .any(|error| error.code.as_deref() == Some("type_mismatch")
                && error.question_id.as_deref() == Some("company_name"))
    );
}

#[test]
fn other_suffix_is_unknown_without_allow_other() {
    let spec = fixture();
    let result = validate_value(&spec, &json!({ "has_brand_other": "maybe" }));
    assert_eq!(result.unknown_fields, vec!["has_brand_other".to_string()]);
}

#[test]
fn validate_on_store_lists_missing_required() {
    let spec = fixture();
    let result = validate(&spec, &AnswerStore::new());
    assert!(!result.valid);
    assert_eq!(
        result.missing_required,
        vec!["company_name", "contact", "email", "industry", "has_brand", "personality"]
    );
}

#[test]
fn visibility_is_transitive() {
    let spec = parse(json!({
        "title": "Chain",
        "questions": [
            { "id": "a", "label": "A", "type": "radio",
              "options": [{ "value": "yes", "label": "Yes" }, { "value": "no", "label": "No" }] },
            { "id": "b", "label": "B", "type": "checkbox", "dependsOn": "a", "showWhen": "yes",
              "options": [{ "value": "x", "label": "X" }, { "value": "y", "label": "Y" }] },
            { "id": "c", "label": "C", "type": "text", "dependsOn": "b", "showWhen": ["y", "z"] }
        ]
    }))
    .unwrap();

    let mut store = AnswerStore::new();
    store.set(&spec.questions[0], Answer::text("yes")).unwrap();
    store.set(&spec.questions[1], Answer::list(["x", "y"])).unwrap();
    let map = resolve_visibility(&spec, &store);
    assert_eq!(map.get("b"), Some(&true));
    assert_eq!(map.get("c"), Some(&true));

    store.set(&spec.questions[0], Answer::text("no")).unwrap();
    let map = resolve_visibility(&spec, &store);
    assert_eq!(map.get("b"), Some(&false));
    assert_eq!(map.get("c"), Some(&false));
    // answers of hidden questions are retained
    assert!(store.get("b").is_some());
}

#[test]
fn file_limits_reject_without_touching_accepted_files() {
    let spec = fixture();
    let question = spec.question("brand_assets").unwrap();
    let mut store = AnswerStore::new();

    for name in ["guide.pdf", "logo.png"] {
        store
            .add_file(question, FileAttachment::new(name, "application/octet-stream", vec![1; 512]))
            .unwrap();
    }
    let third = store.add_file(
        question,
        FileAttachment::new("extra.svg", "image/svg+xml", vec![1; 512]),
    );
    assert!(matches!(
        third,
        Err(StoreError::FileRejected(FileRejected::TooMany { max: 2 }))
    ));
    assert_eq!(store.files("brand_assets").len(), 2);

    store.remove_file("brand_assets", 0).unwrap();
    let too_big = store.add_file(
        question,
        FileAttachment::new("huge.pdf", "application/pdf", vec![0; 2 * 1024 * 1024]),
    );
    assert!(matches!(
        too_big,
        Err(StoreError::FileRejected(FileRejected::TooLarge { .. }))
    ));
    let wrong_type = store.add_file(
        question,
        FileAttachment::new("notes.docx", "application/msword", vec![0; 10]),
    );
    assert!(matches!(
        wrong_type,
        Err(StoreError::FileRejected(
            FileRejected::ExtensionNotAllowed { .. }
        ))
    ));
    assert_eq!(store.files("brand_assets")[0].name, "logo.png");
}

#[test]
fn config_rejects_duplicate_ids() {
    let err = parse(json!({
        "title": "Dup",
        "questions": [
            { "id": "a", "label": "A", "type": "text" },
            { "id": "a", "label": "A again", "type": "text" }
        ]
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateQuestion(id) if id == "a"));
}

#[test]
fn config_rejects_forward_dependencies() {
    let err = parse(json!({
        "title": "Forward",
        "questions": [
            { "id": "a", "label": "A", "type": "text", "dependsOn": "b", "showWhen": "x" },
            { "id": "b", "label": "B", "type": "text" }
        ]
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDependency { .. }));
}

#[test]
fn config_rejects_selects_without_options() {
    let err = parse(json!({
        "title": "Empty select",
        "questions": [{ "id": "a", "label": "A", "type": "dropdown" }]
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::MissingOptions(_)));
}

#[test]
fn config_rejects_overlapping_sections() {
    let err = parse(json!({
        "title": "Sections",
        "sections": [
            { "id": "one", "title": "One", "questions": ["a"] },
            { "id": "two", "title": "Two", "questions": ["a"] }
        ],
        "questions": [{ "id": "a", "label": "A", "type": "text" }]
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::SectionOverlap { .. }));
}

#[test]
fn config_rejects_empty_forms_and_bad_json() {
    assert!(matches!(
        parse(json!({ "title": "Nothing", "questions": [] })),
        Err(ConfigError::Empty)
    ));
    assert!(matches!(
        FormSpec::from_json_str("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}
