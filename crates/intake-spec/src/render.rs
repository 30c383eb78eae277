use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    answers::Answer,
    delivery::DeliveryStatus,
    files::{FilePolicy, format_size},
    navigation::{Advisory, Session},
    progress::Position,
    spec::{
        form::{FormSpec, SectionSpec},
        question::{ChoiceOption, OTHER_VALUE, QuestionSpec, QuestionType, SubField},
    },
    store::AnswerStore,
    validate::check,
    visibility::resolve_visibility,
};

/// Input surface a host should draw for a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum InputSurface {
    TextInput {
        input_type: &'static str,
        placeholder: Option<String>,
    },
    TextArea {
        rows: u32,
        placeholder: Option<String>,
    },
    RadioGroup {
        options: Vec<ChoiceOption>,
        allow_other: bool,
    },
    Dropdown {
        options: Vec<ChoiceOption>,
        allow_other: bool,
    },
    CheckboxGroup {
        options: Vec<ChoiceOption>,
        allow_other: bool,
    },
    SubForm {
        fields: Vec<SubField>,
    },
    FileDrop {
        max_files: usize,
        max_size_mb: f64,
        accepted_extensions: Vec<String>,
        files: Vec<FileSummary>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub mime_type: String,
    pub size: String,
}

/// Section heading shown above a grouped question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub icon: Option<String>,
    pub subtitle: Option<String>,
}

impl From<&SectionSpec> for SectionView {
    fn from(section: &SectionSpec) -> Self {
        Self {
            id: section.id.clone(),
            title: section.title.clone(),
            icon: section.icon.clone(),
            subtitle: section.subtitle.clone(),
        }
    }
}

/// Describes a single question for render outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderQuestion {
    pub id: String,
    pub label: String,
    pub kind: QuestionType,
    pub required: bool,
    pub subtitle: Option<String>,
    pub helper_text: Option<String>,
    pub section: Option<SectionView>,
    pub visible: bool,
    pub satisfied: bool,
    pub current_value: Option<Answer>,
    pub other_text: Option<String>,
    pub surface: InputSurface,
}

/// Everything a host needs to draw the current screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenPayload {
    pub form_title: String,
    pub description: Option<String>,
    pub position: Position,
    pub progress_percent: f64,
    pub step: Option<(usize, usize)>,
    pub can_go_back: bool,
    pub submit_label: String,
    pub question: Option<RenderQuestion>,
    pub advisory: Option<Advisory>,
    pub answered: Vec<String>,
    pub report: Option<String>,
    pub success_message: Option<String>,
    pub delivery: Option<DeliveryStatus>,
}

/// Build the input surface for one question from the current answers.
pub fn render_question(
    spec: &FormSpec,
    question: &QuestionSpec,
    store: &AnswerStore,
) -> RenderQuestion {
    let visibility = resolve_visibility(spec, store);
    RenderQuestion {
        id: question.id.clone(),
        label: question.label.clone(),
        kind: question.kind,
        required: question.required,
        subtitle: question.subtitle.clone(),
        helper_text: question.helper_text.clone(),
        section: spec.section_for(&question.id).map(SectionView::from),
        visible: visibility.get(&question.id).copied().unwrap_or(true),
        satisfied: check(question, store).is_ok(),
        current_value: store.get(&question.id).cloned(),
        other_text: store.other(&question.id).map(String::from),
        surface: surface_for(question, store),
    }
}

fn surface_for(question: &QuestionSpec, store: &AnswerStore) -> InputSurface {
    let options = question.options().to_vec();
    match question.kind {
        QuestionType::ShortText | QuestionType::Email | QuestionType::Phone => {
            InputSurface::TextInput {
                input_type: match question.kind {
                    QuestionType::Email => "email",
                    QuestionType::Phone => "tel",
                    _ => "text",
                },
                placeholder: question.placeholder.clone(),
            }
        }
        QuestionType::LongText => InputSurface::TextArea {
            rows: question.rows.unwrap_or(3),
            placeholder: question.placeholder.clone(),
        },
        QuestionType::SingleSelect => InputSurface::RadioGroup {
            options,
            allow_other: question.allow_other,
        },
        QuestionType::Dropdown => InputSurface::Dropdown {
            options,
            allow_other: question.allow_other,
        },
        QuestionType::MultiSelect => InputSurface::CheckboxGroup {
            options,
            allow_other: question.allow_other,
        },
        QuestionType::Structured => InputSurface::SubForm {
            fields: question.structure().to_vec(),
        },
        QuestionType::FileAttachment => {
            let policy = FilePolicy::for_question(question);
            InputSurface::FileDrop {
                max_files: policy.max_files,
                max_size_mb: policy.max_size_mb,
                accepted_extensions: policy.accepted_extensions().to_vec(),
                files: store
                    .files(&question.id)
                    .iter()
                    .map(|file| FileSummary {
                        name: file.name.clone(),
                        mime_type: file.mime_type.clone(),
                        size: format_size(file.size_bytes),
                    })
                    .collect(),
            }
        }
    }
}

/// Build the screen payload for the session's current position.
pub fn build_screen(session: &Session) -> ScreenPayload {
    let spec = session.spec();
    let store = session.store();
    let submission = session.submission();
    ScreenPayload {
        form_title: spec.title.clone(),
        description: spec.description.clone(),
        position: session.position(),
        progress_percent: session.progress_percent(),
        step: session.step(),
        can_go_back: session.can_go_back(),
        submit_label: spec.messages.submit_button.clone(),
        question: session
            .current_question()
            .map(|question| render_question(spec, question, store)),
        advisory: session.advisory().cloned(),
        answered: spec
            .questions
            .iter()
            .filter(|question| {
                store
                    .get(&question.id)
                    .is_some_and(|answer| !answer.is_empty())
            })
            .map(|question| question.id.clone())
            .collect(),
        report: submission.map(|submission| submission.report.clone()),
        success_message: submission.map(|submission| submission.success_message.clone()),
        delivery: submission.map(|submission| submission.delivery.clone()),
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &ScreenPayload) -> Value {
    let question = payload
        .question
        .as_ref()
        .map(|question| serde_json::to_value(question).unwrap_or(Value::Null))
        .unwrap_or(Value::Null);

    json!({
        "form_title": payload.form_title,
        "description": payload.description,
        "screen": payload.position.as_str(),
        "position": payload.position,
        "progress": {
            "percent": payload.progress_percent,
            "step": payload.step.map(|(step, _)| step),
            "total": payload.step.map(|(_, total)| total),
        },
        "can_go_back": payload.can_go_back,
        "submit_label": payload.submit_label,
        "question": question,
        "advisory": payload.advisory,
        "answered": payload.answered,
        "report": payload.report,
        "success_message": payload.success_message,
        "delivery": payload.delivery,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &ScreenPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} [{:.0}%]",
        payload.form_title, payload.progress_percent
    ));

    match payload.position {
        Position::Welcome => {
            if let Some(description) = &payload.description {
                lines.push(description.clone());
            }
            lines.push("Press enter to begin.".to_string());
        }
        Position::Question { .. } => {
            if let Some(question) = &payload.question {
                lines.extend(question_lines(question, payload.step));
            }
        }
        Position::Final => {
            lines.push(format!(
                "All done. {} to generate your report.",
                payload.submit_label
            ));
        }
        Position::Success => {
            if let Some(message) = &payload.success_message {
                lines.push(message.clone());
            }
            if let Some(DeliveryStatus::Failed { .. }) = &payload.delivery {
                lines.push(
                    "(The report could not be sent automatically; please keep a copy.)".into(),
                );
            }
        }
    }

    if let Some(advisory) = &payload.advisory {
        lines.push(format!("! {}", advisory.message));
    }

    lines.join("\n")
}

fn question_lines(question: &RenderQuestion, step: Option<(usize, usize)>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(section) = &question.section {
        let mut heading = section.title.clone();
        if let Some(icon) = &section.icon {
            heading = format!("{} {}", icon, heading);
        }
        lines.push(format!("== {} ==", heading));
        if let Some(subtitle) = &section.subtitle {
            lines.push(subtitle.clone());
        }
    }

    let mut title = match step {
        Some((step, total)) => format!("{}/{} {}", step, total, question.label),
        None => question.label.clone(),
    };
    if question.required {
        title.push_str(" *");
    }
    lines.push(title);
    if let Some(subtitle) = &question.subtitle {
        lines.push(subtitle.clone());
    }
    if let Some(helper) = &question.helper_text {
        lines.push(format!("({})", helper));
    }

    match &question.surface {
        InputSurface::TextInput { placeholder, .. } | InputSurface::TextArea { placeholder, .. } => {
            if let Some(placeholder) = placeholder {
                lines.push(format!("e.g. {}", placeholder));
            }
        }
        InputSurface::RadioGroup { options, .. }
        | InputSurface::Dropdown { options, .. }
        | InputSurface::CheckboxGroup { options, .. } => {
            for (position, option) in options.iter().enumerate() {
                let marker = if selected(question, &option.value) {
                    "x"
                } else {
                    " "
                };
                lines.push(format!("  [{}] {}. {}", marker, position + 1, option.label));
            }
        }
        InputSurface::SubForm { fields } => {
            for field in fields {
                let required = if field.required { " *" } else { "" };
                lines.push(format!("  - {}{}", field.label, required));
            }
        }
        InputSurface::FileDrop {
            max_files,
            max_size_mb,
            accepted_extensions,
            files,
        } => {
            let mut limits = format!("up to {} file(s), {} MB each", max_files, max_size_mb);
            if !accepted_extensions.is_empty() {
                limits.push_str(&format!(", types: {}", accepted_extensions.join(", ")));
            }
            lines.push(format!("  ({})", limits));
            for (position, file) in files.iter().enumerate() {
                lines.push(format!("  {}. {} ({})", position + 1, file.name, file.size));
            }
        }
    }

    if let Some(current) = &question.current_value
        && !current.is_empty()
        && matches!(
            question.surface,
            InputSurface::TextInput { .. } | InputSurface::TextArea { .. }
        )
        && let Some(text) = current.as_text()
    {
        lines.push(format!("Current: {}", text));
    }
    if let Some(other) = &question.other_text {
        lines.push(format!("Other: {}", other));
    }
    lines
}

fn selected(question: &RenderQuestion, value: &str) -> bool {
    match &question.current_value {
        Some(Answer::Text(text)) => text == value,
        Some(Answer::List(items)) => items.iter().any(|item| item == value),
        _ => value == OTHER_VALUE && question.other_text.is_some(),
    }
}
