mod http;
mod wizard;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use component_intake::{export_filename, generate_report, validate_answers};
use intake_spec::spec::{AnswerShape, config_json_schema};
use intake_spec::{
    Answer, Delivery, FormSpec, NavOutcome, NavigationConfig, Position, QuestionSpec,
    QuestionType, Session, SessionError, ValidationResult, build_screen, render_json_ui,
};
use serde_json::{Value, json};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use http::{HttpDelivery, fetch_source};
use wizard::{
    AnswerParseError, Verbosity, WizardCommand, WizardPresenter, input_hint, load_attachment,
    needs_other_text, parse_choice, parse_choices, parse_command, parse_paths,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const OUTPUT_DIR_ENV: &str = "INTAKE_OUTPUT_DIR";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Brand discovery questionnaire in the terminal",
    long_about = "Runs config-driven intake questionnaires, renders reports, and validates answers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Walk through a questionnaire one screen at a time.
    Wizard {
        /// Form config JSON: a local path or an http(s) URL.
        #[arg(long, value_name = "SPEC")]
        spec: String,
        /// Directory for the exported report (defaults to INTAKE_OUTPUT_DIR or the current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Skip posting the report to the configured webhook.
        #[arg(long)]
        no_deliver: bool,
        /// Show verbose output (positions, answered ids, CBOR snapshot).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit answer JSON after submitting.
        #[arg(long)]
        answers_json: bool,
        /// Render output mode for each screen.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Build the markdown report for a saved answers file.
    Report {
        #[arg(long, value_name = "SPEC")]
        spec: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Directory for the exported report (defaults to INTAKE_OUTPUT_DIR or the current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Print the report instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },
    /// Validate an answers file against a form config.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Print the JSON schema of the form config document.
    Schema {
        /// Write the schema to this file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Wizard {
            spec,
            out,
            no_deliver,
            verbose,
            answers_json,
            format,
        } => run_wizard(&spec, out, no_deliver, verbose, answers_json, format).await,
        Command::Report {
            spec,
            answers,
            out,
            stdout,
        } => run_report(&spec, answers, out, stdout).await,
        Command::Validate { spec, answers } => run_validate(&spec, answers).await,
        Command::Schema { out } => run_schema(out),
    }
}

/// Raw config text plus the component config wrapping it.
async fn load_config(source: &str) -> CliResult<(FormSpec, String)> {
    let raw = fetch_source(source).await?;
    let spec = FormSpec::from_json_str(&raw)?;
    let config_json = json!({ "form_spec_json": raw, "client_info": "brand-intake-cli" }).to_string();
    Ok((spec, config_json))
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    match serde_json::from_str::<Value>(response) {
        Ok(value) => match value.get("error").and_then(Value::as_str) {
            Some(error) => Err(error.into()),
            None => Ok(value),
        },
        // text responses (reports, filenames) are not JSON
        Err(_) => Ok(Value::String(response.to_string())),
    }
}

fn component_text(response: String) -> CliResult<String> {
    match parse_component_result(&response)? {
        Value::String(text) => Ok(text),
        _ => Ok(response),
    }
}

async fn run_report(
    source: &str,
    answers_path: PathBuf,
    out: Option<PathBuf>,
    stdout: bool,
) -> CliResult<()> {
    let (_, config_json) = load_config(source).await?;
    let mut config: Value = serde_json::from_str(&config_json)?;
    config["submitted_at"] = json!(Utc::now());
    let config_json = config.to_string();
    let answers_json = fs::read_to_string(answers_path)?;
    serde_json::from_str::<Value>(&answers_json)?;

    let report = component_text(generate_report(&config_json, &answers_json))?;
    if stdout {
        println!("{}", report);
        return Ok(());
    }

    let filename = component_text(export_filename(&config_json))?;
    let path = resolve_output_dir(out)?.join(filename);
    fs::write(&path, report)?;
    println!("Report saved to {}", path.display());
    Ok(())
}

async fn run_validate(source: &str, answers_path: PathBuf) -> CliResult<()> {
    let (_, config_json) = load_config(source).await?;
    let answers_json = fs::read_to_string(answers_path)?;

    let response = parse_component_result(&validate_answers(&config_json, &answers_json))?;
    let result: ValidationResult = serde_json::from_value(response)?;
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {}",
                error.path.as_deref().unwrap_or("<unknown>"),
                error.message
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_schema(out: Option<PathBuf>) -> CliResult<()> {
    let schema = serde_json::to_string_pretty(&config_json_schema())?;
    match out {
        Some(path) => {
            fs::write(&path, schema)?;
            println!("Schema written to {}", path.display());
        }
        None => println!("{}", schema),
    }
    Ok(())
}

fn resolve_output_dir(out: Option<PathBuf>) -> CliResult<PathBuf> {
    let candidate = match out {
        Some(path) => path,
        None => env::var_os(OUTPUT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if candidate.as_os_str().is_empty() {
        return Err("output directory cannot be empty".into());
    }
    fs::create_dir_all(&candidate)?;
    Ok(candidate)
}

async fn run_wizard(
    source: &str,
    out: Option<PathBuf>,
    no_deliver: bool,
    verbose: bool,
    answers_json: bool,
    format: RenderMode,
) -> CliResult<()> {
    let (spec, _) = load_config(source).await?;
    let out_dir = resolve_output_dir(out)?;
    let delivery = match (&spec.webhook, no_deliver) {
        (Some(webhook), false) => Some(HttpDelivery::new(webhook.clone())?),
        _ => None,
    };

    let config = NavigationConfig::default();
    let mut session = Session::new(spec, config);
    let presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);

    loop {
        let payload = build_screen(&session);
        match format {
            RenderMode::Text => presenter.show_screen(&payload),
            RenderMode::Json => println!("{}", render_json_ui(&payload)),
        }
        // the terminal draws synchronously, so the screen has settled
        session.guard_mut().release();

        match session.position() {
            Position::Welcome => {
                let line = read_line("")?;
                if parse_command(&line) == Some(WizardCommand::Exit) {
                    return Err("wizard aborted by user".into());
                }
                session.advance(Instant::now());
            }
            Position::Question { index } => {
                let question = session.spec().questions[index].clone();
                match ask_question(&mut session, &question, &presenter).await? {
                    Step::Back => {
                        session.back(Instant::now());
                    }
                    Step::Advance => report_outcome(session.advance(Instant::now())),
                    Step::Advanced => {}
                }
            }
            Position::Final => {
                let line = read_line(&format!("{} (enter), back, or exit", payload.submit_label))?;
                match parse_command(&line) {
                    Some(WizardCommand::Exit) => return Err("wizard aborted by user".into()),
                    Some(WizardCommand::Back) => {
                        session.back(Instant::now());
                    }
                    None => {
                        println!("Generating report...");
                        let submission = session
                            .submit(
                                delivery.as_ref().map(|d| d as &dyn Delivery),
                                "brand-intake-cli",
                            )
                            .await?;
                        let path = out_dir.join(&submission.filename);
                        fs::write(&path, &submission.report)?;
                        presenter.show_completion(&submission, &path, session.store());
                    }
                }
            }
            Position::Success => break,
        }
    }

    Ok(())
}

enum Step {
    Back,
    Advance,
    /// The answer triggered an auto-advance that already moved the session.
    Advanced,
}

fn report_outcome(outcome: NavOutcome) {
    match outcome {
        NavOutcome::Blocked(error) => debug!(question = ?error.question_id, "advance blocked"),
        NavOutcome::Dropped => warn!("navigation request dropped"),
        _ => {}
    }
}

async fn ask_question(
    session: &mut Session,
    question: &QuestionSpec,
    presenter: &WizardPresenter,
) -> CliResult<Step> {
    if let Some(hint) = input_hint(question) {
        presenter.show_hint(&hint);
    }

    if question.kind == QuestionType::Structured {
        return ask_structured(session, question);
    }

    loop {
        let line = read_line("")?;
        match parse_command(&line) {
            Some(WizardCommand::Exit) => return Err("wizard aborted by user".into()),
            Some(WizardCommand::Back) => return Ok(Step::Back),
            Some(WizardCommand::Clear) => {
                clear_answer(session, question)?;
                presenter.show_hint("answer cleared");
                continue;
            }
            None => {}
        }

        let applied = match question.kind {
            QuestionType::SingleSelect | QuestionType::Dropdown => {
                apply_single_choice(session, question, &line).await
            }
            QuestionType::MultiSelect => apply_multi_choice(session, question, &line),
            QuestionType::FileAttachment => apply_files(session, question, presenter, &line),
            _ => apply_text(session, question, &line),
        };

        match applied {
            Ok(step) => return Ok(step),
            Err(InputError::Parse(err)) => presenter.show_parse_error(&err),
            Err(InputError::Session(err)) => presenter.show_advisory(&err.to_string()),
        }
    }
}

enum InputError {
    Parse(AnswerParseError),
    Session(SessionError),
}

impl From<AnswerParseError> for InputError {
    fn from(err: AnswerParseError) -> Self {
        InputError::Parse(err)
    }
}

impl From<SessionError> for InputError {
    fn from(err: SessionError) -> Self {
        InputError::Session(err)
    }
}

fn apply_text(
    session: &mut Session,
    question: &QuestionSpec,
    line: &str,
) -> Result<Step, InputError> {
    // blank keeps the stored answer
    if !line.trim().is_empty() {
        session.answer(&question.id, Answer::text(line), Instant::now())?;
    }
    Ok(Step::Advance)
}

async fn apply_single_choice(
    session: &mut Session,
    question: &QuestionSpec,
    line: &str,
) -> Result<Step, InputError> {
    if line.trim().is_empty() {
        return Ok(Step::Advance);
    }
    let value = parse_choice(question, line)?;
    let wants_other = needs_other_text(question, std::slice::from_ref(&value));
    session.answer(&question.id, Answer::text(value), Instant::now())?;

    if wants_other {
        session.cancel_auto_advance();
        let text = read_line("Other").map_err(|err| {
            InputError::Parse(AnswerParseError::new("Input closed.", Some(err.to_string())))
        })?;
        session.set_other(&question.id, &text)?;
        return Ok(Step::Advance);
    }

    if session.has_pending_advance() {
        let delay = NavigationConfig::default().auto_advance_delay;
        tokio::time::sleep(delay).await;
        if let Some(outcome) = session.poll_auto_advance(Instant::now()) {
            report_outcome(outcome);
            return Ok(Step::Advanced);
        }
    }
    Ok(Step::Advance)
}

fn apply_multi_choice(
    session: &mut Session,
    question: &QuestionSpec,
    line: &str,
) -> Result<Step, InputError> {
    if line.trim().is_empty() {
        return Ok(Step::Advance);
    }
    let values = parse_choices(question, line)?;
    let wants_other = needs_other_text(question, &values);
    session.answer(&question.id, Answer::List(values), Instant::now())?;
    if wants_other {
        let text = read_line("Other").map_err(|err| {
            InputError::Parse(AnswerParseError::new("Input closed.", Some(err.to_string())))
        })?;
        session.set_other(&question.id, &text)?;
    }
    Ok(Step::Advance)
}

fn apply_files(
    session: &mut Session,
    question: &QuestionSpec,
    presenter: &WizardPresenter,
    line: &str,
) -> Result<Step, InputError> {
    for path in parse_paths(line) {
        let attachment = match load_attachment(Path::new(&path)) {
            Ok(attachment) => attachment,
            Err(err) => {
                presenter.show_parse_error(&err);
                continue;
            }
        };
        // rejections are per file; accepted files stay attached
        if let Err(err) = session.attach_file(&question.id, attachment) {
            presenter.show_advisory(&err.to_string());
        }
    }
    Ok(Step::Advance)
}

fn ask_structured(session: &mut Session, question: &QuestionSpec) -> CliResult<Step> {
    for field in question.structure() {
        let label = if field.required {
            format!("{} *", field.label)
        } else {
            field.label.clone()
        };
        let line = read_line(&label)?;
        match parse_command(&line) {
            Some(WizardCommand::Exit) => return Err("wizard aborted by user".into()),
            Some(WizardCommand::Back) => return Ok(Step::Back),
            Some(WizardCommand::Clear) => {
                session.set_field(&question.id, &field.label, "")?;
                continue;
            }
            None => {}
        }
        if !line.trim().is_empty() {
            session.set_field(&question.id, &field.label, &line)?;
        }
    }
    Ok(Step::Advance)
}

/// Replace the stored answer with an empty one of the right shape.
fn clear_answer(session: &mut Session, question: &QuestionSpec) -> Result<(), SessionError> {
    let empty = match question.kind.shape() {
        AnswerShape::Text => Answer::text(""),
        AnswerShape::List => Answer::List(Vec::new()),
        AnswerShape::Fields => Answer::Fields(BTreeMap::new()),
        AnswerShape::Files => Answer::Files(Vec::new()),
    };
    session.answer(&question.id, empty, Instant::now())?;
    if question.allow_other {
        session.set_other(&question.id, "")?;
    }
    Ok(())
}

fn read_line(prompt: &str) -> io::Result<String> {
    if prompt.is_empty() {
        print!("> ");
    } else {
        print!("{}: ", prompt);
    }
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before the questionnaire finished",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
