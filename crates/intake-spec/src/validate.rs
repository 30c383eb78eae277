use regex::Regex;
use serde_json::Value;

use crate::answers::{Answer, ValidationError, ValidationResult};
use crate::spec::form::FormSpec;
use crate::spec::question::{AnswerShape, Constraint, QuestionSpec};
use crate::store::AnswerStore;
use crate::visibility::resolve_visibility;

/// Whether the question's "required" rules are met by the stored answer.
pub fn is_satisfied(question: &QuestionSpec, store: &AnswerStore) -> bool {
    if !question.required {
        return true;
    }
    if question.kind.shape() == AnswerShape::Fields {
        // an absent map counts as empty; no required sub-fields means satisfied
        let fields = store.get(&question.id).and_then(Answer::as_fields);
        return question
            .structure()
            .iter()
            .filter(|field| field.required)
            .all(|field| {
                fields
                    .and_then(|fields| fields.get(&field.label))
                    .is_some_and(|value| !value.trim().is_empty())
            });
    }
    match (question.kind.shape(), store.get(&question.id)) {
        (AnswerShape::Text, Some(Answer::Text(text))) => !text.trim().is_empty(),
        (AnswerShape::List, Some(Answer::List(items))) => !items.is_empty(),
        (AnswerShape::Files, Some(Answer::Files(files))) => !files.is_empty(),
        _ => false,
    }
}

/// Per-question check used before leaving a screen. Never mutates state.
pub fn check(question: &QuestionSpec, store: &AnswerStore) -> Result<(), ValidationError> {
    if !is_satisfied(question, store) {
        return Err(required_error(question, store));
    }

    if let Some(constraint) = &question.constraint
        && let Some(Answer::Text(text)) = store.get(&question.id)
        && !text.is_empty()
        && let Some(error) = enforce_constraint(question, text, constraint)
    {
        return Err(error);
    }

    Ok(())
}

/// Validate every visible question and flag answers for undeclared ids.
pub fn validate(spec: &FormSpec, store: &AnswerStore) -> ValidationResult {
    let visibility = resolve_visibility(spec, store);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for question in &spec.questions {
        if !visibility.get(&question.id).copied().unwrap_or(true) {
            continue;
        }
        match check(question, store) {
            Ok(()) => {}
            Err(error) if error.code.as_deref() == Some("required") => {
                missing_required.push(question.id.clone());
            }
            Err(error) => errors.push(error),
        }
    }

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty(),
        errors,
        missing_required,
        unknown_fields: Vec::new(),
    }
}

/// Like [`validate`] but starting from a raw answers object, so ids the form
/// does not declare can be reported.
pub fn validate_value(spec: &FormSpec, answers: &Value) -> ValidationResult {
    let store = AnswerStore::from_answers_value(&spec.questions, answers);
    let mut result = validate(spec, &store);

    let answers_map = answers.as_object().cloned().unwrap_or_default();
    for (key, value) in &answers_map {
        if let Some(question) = spec.question(key) {
            if !store.contains(key) && !value.is_null() {
                result.errors.push(base_error(
                    question,
                    "answer does not match the question type",
                    "type_mismatch",
                ));
            }
            continue;
        }
        let other_text = key
            .strip_suffix("_other")
            .and_then(|base| spec.question(base))
            .is_some_and(|question| question.allow_other);
        if !other_text {
            result.unknown_fields.push(key.clone());
        }
    }

    result.valid = result.valid && result.errors.is_empty() && result.unknown_fields.is_empty();
    result
}

fn required_error(question: &QuestionSpec, store: &AnswerStore) -> ValidationError {
    if question.kind.shape() == AnswerShape::Fields {
        let missing = question
            .structure()
            .iter()
            .filter(|field| field.required)
            .filter(|field| {
                store
                    .get(&question.id)
                    .and_then(Answer::as_fields)
                    .and_then(|fields| fields.get(&field.label))
                    .is_none_or(|value| value.trim().is_empty())
            })
            .map(|field| field.label.as_str())
            .collect::<Vec<_>>();
        return base_error(
            question,
            &format!("Please complete: {}", missing.join(", ")),
            "required",
        );
    }
    let message = match question.kind.shape() {
        AnswerShape::List => "Please select at least one option",
        AnswerShape::Files => "Please attach at least one file",
        _ => "This field is required",
    };
    base_error(question, message, "required")
}

fn enforce_constraint(
    question: &QuestionSpec,
    text: &str,
    constraint: &Constraint,
) -> Option<ValidationError> {
    if let Some(pattern) = &constraint.pattern
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Some(base_error(
            question,
            "value does not match pattern",
            "pattern_mismatch",
        ));
    }

    let length = text.chars().count();
    if let Some(min_len) = constraint.min_len
        && length < min_len
    {
        return Some(base_error(
            question,
            &format!("Please enter at least {} characters", min_len),
            "min_length",
        ));
    }

    if let Some(max_len) = constraint.max_len
        && length > max_len
    {
        return Some(base_error(
            question,
            &format!("Please use at most {} characters", max_len),
            "max_length",
        ));
    }

    None
}

fn base_error(question: &QuestionSpec, message: &str, code: &str) -> ValidationError {
    ValidationError {
        question_id: Some(question.id.clone()),
        path: Some(format!("/{}", question.id)),
        message: message.into(),
        code: Some(code.into()),
    }
}
