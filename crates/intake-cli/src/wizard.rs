use std::fmt::Write;
use std::fs;
use std::path::Path;

use intake_spec::spec::{ChoiceOption, OTHER_VALUE, QuestionSpec};
use intake_spec::{
    AnswerStore, DeliveryStatus, FileAttachment, QuestionType, ScreenPayload, Submission,
    render_text,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: screens and prompts only.
    Clean,
    /// Verbose output: positions, answered ids, answer snapshots.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints screens and prompts for the terminal wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            show_answers_json,
        }
    }

    pub fn show_screen(&self, payload: &ScreenPayload) {
        println!();
        println!("{}", render_text(payload));
        if self.verbosity.is_verbose() {
            println!(
                "Position: {} | answered: {}",
                payload.position.as_str(),
                if payload.answered.is_empty() {
                    "-".to_string()
                } else {
                    payload.answered.join(", ")
                }
            );
        }
    }

    pub fn show_hint(&self, hint: &str) {
        println!("({})", hint);
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_advisory(&self, message: &str) {
        eprintln!("! {}", message);
    }

    pub fn show_completion(
        &self,
        submission: &Submission,
        report_path: &Path,
        store: &AnswerStore,
    ) {
        println!("Report saved to {}", report_path.display());
        match &submission.delivery {
            DeliveryStatus::Skipped => {}
            DeliveryStatus::Delivered => println!("Report sent to the configured webhook."),
            DeliveryStatus::Failed { reason } => {
                eprintln!("Report could not be sent ({}); keep the saved copy.", reason)
            }
        }
        if self.verbosity.is_verbose() {
            match store.to_cbor() {
                Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
                Err(err) => eprintln!("Failed to serialize answers to CBOR: {}", err),
            }
        }
        if self.show_answers_json {
            println!("{}", store.to_value());
        }
    }
}

/// Line-level commands recognised at any question prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardCommand {
    Back,
    /// Drop the stored answer for the current question.
    Clear,
    Exit,
}

pub fn parse_command(raw: &str) -> Option<WizardCommand> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "back" | ":b" => Some(WizardCommand::Back),
        "clear" | ":c" => Some(WizardCommand::Clear),
        "exit" | "quit" | ":q" => Some(WizardCommand::Exit),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Short input hint shown under a question prompt.
pub fn input_hint(question: &QuestionSpec) -> Option<String> {
    match question.kind {
        QuestionType::SingleSelect | QuestionType::Dropdown => {
            Some("enter a number or value".into())
        }
        QuestionType::MultiSelect => Some("comma-separated numbers or values".into()),
        QuestionType::FileAttachment => {
            Some("comma-separated file paths, blank to continue".into())
        }
        QuestionType::Structured => Some("you will be asked for each field".into()),
        _ => None,
    }
}

/// Resolve one token to an option value: a 1-based number, a value, or a
/// label (case-insensitive).
pub fn parse_choice(question: &QuestionSpec, raw: &str) -> Result<String, AnswerParseError> {
    let token = raw.trim();
    let options = question.options();
    let found = token
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| options.get(index))
        .or_else(|| {
            options.iter().find(|option| {
                option.value.eq_ignore_ascii_case(token) || option.label.eq_ignore_ascii_case(token)
            })
        });

    match found {
        Some(option) => Ok(option.value.clone()),
        None => Err(AnswerParseError::new(
            format!("'{}' is not one of the options.", token),
            Some(format!("allowed values: {}", describe_options(options))),
        )),
    }
}

pub fn parse_choices(question: &QuestionSpec, raw: &str) -> Result<Vec<String>, AnswerParseError> {
    let mut values = Vec::new();
    for token in raw.split(',').filter(|token| !token.trim().is_empty()) {
        let value = parse_choice(question, token)?;
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values)
}

/// Whether the chosen values call for the free-text follow-up.
pub fn needs_other_text(question: &QuestionSpec, values: &[String]) -> bool {
    question.allow_other && values.iter().any(|value| value == OTHER_VALUE)
}

fn describe_options(options: &[ChoiceOption]) -> String {
    options
        .iter()
        .map(|option| option.value.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn parse_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect()
}

/// Read a local file into an attachment.
pub fn load_attachment(path: &Path) -> Result<FileAttachment, AnswerParseError> {
    let content = fs::read(path).map_err(|err| {
        AnswerParseError::new(
            format!("Could not read '{}'.", path.display()),
            Some(err.to_string()),
        )
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = mime_for(&name);
    Ok(FileAttachment::new(name, mime, content))
}

fn mime_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}
