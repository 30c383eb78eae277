//! Markdown report built from the form and its answers.
//!
//! Questions appear in declaration order regardless of visibility; anything
//! without a non-empty answer is left out.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::answers::Answer;
use crate::files::format_size;
use crate::spec::form::FormSpec;
use crate::spec::question::{OTHER_VALUE, QuestionSpec, QuestionType};
use crate::store::AnswerStore;

pub const DEFAULT_FILENAME_PREFIX: &str = "brand-discovery";

/// Timestamps embedded in a report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportContext {
    pub submitted_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

impl ReportContext {
    /// Fixed submission time, generation stamped now.
    pub fn submitted(submitted_at: DateTime<Utc>) -> Self {
        Self {
            submitted_at: Some(submitted_at),
            generated_at: Utc::now(),
        }
    }

    /// No submission line, generation stamped now.
    pub fn unsubmitted() -> Self {
        Self {
            submitted_at: None,
            generated_at: Utc::now(),
        }
    }

    pub fn at(submitted_at: DateTime<Utc>, generated_at: DateTime<Utc>) -> Self {
        Self {
            submitted_at: Some(submitted_at),
            generated_at,
        }
    }
}

/// Generate the report for a submission made at `submitted_at`. Only the
/// generation footer depends on the current time.
pub fn generate(spec: &FormSpec, store: &AnswerStore, submitted_at: DateTime<Utc>) -> String {
    generate_with(spec, store, &ReportContext::submitted(submitted_at))
}

pub fn generate_with(spec: &FormSpec, store: &AnswerStore, ctx: &ReportContext) -> String {
    let mut doc = String::new();
    let _ = write!(doc, "# {}\n\n", spec.title);

    if spec.output.include_timestamp
        && let Some(submitted_at) = ctx.submitted_at
    {
        let _ = write!(
            doc,
            "**Submitted:** {} at {}\n\n",
            submitted_at.format("%Y-%m-%d"),
            submitted_at.format("%H:%M:%S")
        );
    }

    doc.push_str("---\n\n");

    for question in &spec.questions {
        let Some(answer) = store.get(&question.id) else {
            continue;
        };
        let Some(body) = render_body(question, answer, store) else {
            continue;
        };
        let _ = write!(doc, "## {}\n\n{}\n", question.label, body);
    }

    doc.push_str("---\n\n");
    let _ = write!(
        doc,
        "*Generated by {} on {}*",
        spec.title,
        ctx.generated_at.format("%Y-%m-%d")
    );
    doc
}

/// Download name for the exported report, e.g. `brand-discovery-2026-10-18.md`.
pub fn export_filename(spec: &FormSpec, date: DateTime<Utc>) -> String {
    let prefix = spec
        .output
        .filename_prefix
        .as_deref()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or(DEFAULT_FILENAME_PREFIX);
    format!("{}-{}.md", prefix, date.format("%Y-%m-%d"))
}

fn render_body(question: &QuestionSpec, answer: &Answer, store: &AnswerStore) -> Option<String> {
    let body = match answer {
        Answer::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if question.kind == QuestionType::LongText {
                format!("{}\n", text)
            } else {
                format!("**{}**\n", display_choice(question, text, store))
            }
        }
        Answer::List(items) => items
            .iter()
            .filter(|item| !item.trim().is_empty())
            .map(|item| format!("- {}\n", display_choice(question, item, store)))
            .collect::<String>(),
        Answer::Fields(fields) => question
            .structure()
            .iter()
            .filter_map(|field| {
                fields
                    .get(&field.label)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("**{}:** {}\n", field.label, value))
            })
            .collect::<String>(),
        Answer::Files(files) => files
            .iter()
            .map(|file| format!("- {} ({})\n", file.name, format_size(file.size_bytes)))
            .collect::<String>(),
    };
    (!body.is_empty()).then_some(body)
}

fn display_choice(question: &QuestionSpec, value: &str, store: &AnswerStore) -> String {
    if question.allow_other
        && value == OTHER_VALUE
        && let Some(text) = store.other(&question.id)
    {
        return format!("Other: {}", text);
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::form::OutputOptions;
    use chrono::TimeZone;

    fn spec() -> FormSpec {
        FormSpec {
            title: "Brand Discovery".into(),
            description: None,
            questions: vec![
                QuestionSpec::new("name", "Company name", QuestionType::ShortText),
                QuestionSpec::new("story", "Your story", QuestionType::LongText),
            ],
            sections: vec![],
            webhook: None,
            output: OutputOptions {
                include_timestamp: true,
                filename_prefix: None,
            },
            messages: Default::default(),
            styling: None,
        }
    }

    #[test]
    fn skeleton_matches_layout() {
        let spec = spec();
        let mut store = AnswerStore::new();
        store
            .set(&spec.questions[0], Answer::text("Acme"))
            .unwrap();
        store
            .set(&spec.questions[1], Answer::text("  Founded in a garage.  "))
            .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let doc = generate_with(&spec, &store, &ReportContext::at(at, at));
        assert_eq!(
            doc,
            "# Brand Discovery\n\n\
             **Submitted:** 2026-03-04 at 05:06:07\n\n\
             ---\n\n\
             ## Company name\n\n**Acme**\n\n\
             ## Your story\n\nFounded in a garage.\n\n\
             ---\n\n\
             *Generated by Brand Discovery on 2026-03-04*"
        );
    }

    #[test]
    fn export_filename_uses_prefix() {
        let mut spec = spec();
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        assert_eq!(export_filename(&spec, at), "brand-discovery-2026-10-18.md");
        spec.output.filename_prefix = Some("acme-intake".into());
        assert_eq!(export_filename(&spec, at), "acme-intake-2026-10-18.md");
    }
}
