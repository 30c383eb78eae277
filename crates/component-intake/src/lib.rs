use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use intake_spec::{
    Answer, AnswerStore, ConfigError, DeliveryPayload, FormSpec, NavOutcome, NavigationConfig,
    QuestionType, ReportContext, Session, SessionError, SessionState, StoreError, build_screen,
    export_filename as intake_export_filename, generate_with,
    render_json_ui as intake_render_json_ui, render_text as intake_render_text, validate_value,
};

const DEFAULT_SPEC: &str = include_str!("../../intake-spec/tests/fixtures/brand_discovery.json");
const OTHER_SUFFIX: &str = "_other";

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid form: {0}")]
    Form(#[from] ConfigError),
    #[error("failed to parse session state: {0}")]
    StateParse(#[source] serde_json::Error),
    #[error("failed to parse answer: {0}")]
    AnswerParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
    #[serde(default)]
    client_info: Option<String>,
    /// Submission time shared by the exported report and the webhook body.
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
}

fn parse_config(config_json: &str) -> Result<ComponentConfig, ComponentError> {
    if config_json.trim().is_empty() {
        return Ok(ComponentConfig::default());
    }
    serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
}

fn load_form_spec(config_json: &str) -> Result<FormSpec, ComponentError> {
    let config = parse_config(config_json)?;
    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);
    Ok(FormSpec::from_json_str(spec_json)?)
}

fn parse_state(state_json: &str) -> Result<SessionState, ComponentError> {
    if state_json.trim().is_empty() {
        return Ok(SessionState::default());
    }
    serde_json::from_str(state_json).map_err(ComponentError::StateParse)
}

fn parse_answers(spec: &FormSpec, answers_json: &str) -> AnswerStore {
    let value = serde_json::from_str(answers_json).unwrap_or_else(|_| json!({}));
    AnswerStore::from_answers_value(&spec.questions, &value)
}

/// Every call is stateless, so the settle period and auto-advance delay do
/// not apply.
fn open_session(config_json: &str, state_json: &str) -> Result<Session, ComponentError> {
    let spec = load_form_spec(config_json)?;
    let state = parse_state(state_json)?;
    Ok(Session::restore(spec, state, NavigationConfig::immediate()))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn state_value(session: &Session) -> Result<Value, ComponentError> {
    serde_json::to_value(session.snapshot()).map_err(ComponentError::JsonEncode)
}

fn outcome_value(outcome: &NavOutcome) -> Value {
    match outcome {
        NavOutcome::Moved { from, to } => json!({
            "status": "moved",
            "from": from,
            "to": to,
        }),
        NavOutcome::Blocked(error) => json!({
            "status": "blocked",
            "error": error,
        }),
        NavOutcome::Dropped => json!({ "status": "dropped" }),
        NavOutcome::Unchanged => json!({ "status": "unchanged" }),
    }
}

fn screen_response(session: &Session, extra: Value) -> Result<Value, ComponentError> {
    let mut response = json!({
        "state": state_value(session)?,
        "ui": intake_render_json_ui(&build_screen(session)),
    });
    if let (Some(target), Value::Object(extra)) = (response.as_object_mut(), extra) {
        target.extend(extra);
    }
    Ok(response)
}

pub fn describe(config_json: &str) -> String {
    respond(
        load_form_spec(config_json)
            .and_then(|spec| serde_json::to_value(spec).map_err(ComponentError::JsonEncode)),
    )
}

pub fn validate_answers(config_json: &str, answers_json: &str) -> String {
    let validation = load_form_spec(config_json).and_then(|spec| {
        let answers: Value =
            serde_json::from_str(answers_json).map_err(ComponentError::AnswerParse)?;
        serde_json::to_value(validate_value(&spec, &answers)).map_err(ComponentError::JsonEncode)
    });
    respond(validation)
}

pub fn render_json_ui(config_json: &str, state_json: &str) -> String {
    respond(
        open_session(config_json, state_json)
            .map(|session| intake_render_json_ui(&build_screen(&session))),
    )
}

pub fn render_text(config_json: &str, state_json: &str) -> String {
    respond_string(
        open_session(config_json, state_json)
            .map(|session| intake_render_text(&build_screen(&session))),
    )
}

/// Apply one answer to the session. `{id}_other` writes the free text of a
/// select question's `other` choice; file answers go through the question's
/// attachment limits one file at a time.
pub fn submit_patch(
    config_json: &str,
    state_json: &str,
    question_id: &str,
    value_json: &str,
) -> String {
    respond(open_session(config_json, state_json).and_then(|mut session| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::AnswerParse)?;

        let applied = match other_base(session.spec(), question_id) {
            Some(base) => {
                let text = value.as_str().unwrap_or_default();
                session.set_other(&base, text)
            }
            None => apply_answer(&mut session, question_id, value),
        };

        match applied {
            Ok(()) => screen_response(&session, json!({ "status": "ok" })),
            Err(err @ SessionError::UnknownQuestion(_)) => Err(err.into()),
            Err(err) => screen_response(
                &session,
                json!({ "status": "error", "error": err.to_string() }),
            ),
        }
    }))
}

fn other_base(spec: &FormSpec, question_id: &str) -> Option<String> {
    if spec.question(question_id).is_some() {
        return None;
    }
    question_id
        .strip_suffix(OTHER_SUFFIX)
        .filter(|base| spec.question(base).is_some_and(|q| q.allow_other))
        .map(str::to_string)
}

fn apply_answer(session: &mut Session, question_id: &str, value: Value) -> Result<(), SessionError> {
    let kind = session
        .spec()
        .question(question_id)
        .map(|question| question.kind)
        .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;

    let answer: Answer = serde_json::from_value(value)
        .map_err(|err| SessionError::Store(StoreError::Decode(err.to_string())))?;

    if kind != QuestionType::FileAttachment {
        return session.answer(question_id, answer, Instant::now());
    }

    let files = match answer {
        Answer::Files(files) => files,
        Answer::List(items) if items.is_empty() => Vec::new(),
        other => return session.answer(question_id, other, Instant::now()),
    };
    while !session.store().files(question_id).is_empty() {
        session.remove_file(question_id, 0)?;
    }
    for file in files {
        session.attach_file(question_id, file)?;
    }
    Ok(())
}

pub fn advance(config_json: &str, state_json: &str) -> String {
    respond(open_session(config_json, state_json).and_then(|mut session| {
        let outcome = session.advance(Instant::now());
        screen_response(&session, json!({ "outcome": outcome_value(&outcome) }))
    }))
}

pub fn back(config_json: &str, state_json: &str) -> String {
    respond(open_session(config_json, state_json).and_then(|mut session| {
        let outcome = session.back(Instant::now());
        screen_response(&session, json!({ "outcome": outcome_value(&outcome) }))
    }))
}

fn report_context(config: &ComponentConfig) -> ReportContext {
    match config.submitted_at {
        Some(submitted_at) => ReportContext::submitted(submitted_at),
        None => ReportContext::unsubmitted(),
    }
}

/// Markdown report. Without `submitted_at` in the config the submission
/// line is left out, so repeated calls only differ in the footer.
pub fn generate_report(config_json: &str, answers_json: &str) -> String {
    respond_string(parse_config(config_json).and_then(|config| {
        let spec = load_form_spec(config_json)?;
        let store = parse_answers(&spec, answers_json);
        Ok(generate_with(&spec, &store, &report_context(&config)))
    }))
}

pub fn export_filename(config_json: &str) -> String {
    respond_string(load_form_spec(config_json).map(|spec| intake_export_filename(&spec, Utc::now())))
}

/// Webhook body for a finished questionnaire. Hosts post it themselves.
pub fn delivery_payload(config_json: &str, answers_json: &str) -> String {
    respond(parse_config(config_json).and_then(|config| {
        let spec = load_form_spec(config_json)?;
        let store = parse_answers(&spec, answers_json);
        let report = generate_with(&spec, &store, &report_context(&config));
        let client_info = config.client_info.as_deref().unwrap_or("component-intake");
        let completed_at = config.submitted_at.unwrap_or_else(Utc::now);
        let payload = DeliveryPayload::new(&spec, &store, &report, completed_at, client_info);
        serde_json::to_value(payload).map_err(ComponentError::JsonEncode)
    }))
}
