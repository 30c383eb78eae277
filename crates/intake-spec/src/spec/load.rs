use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use serde_json::Value;
use thiserror::Error;

use crate::spec::form::FormSpec;

/// Fatal problems with the questionnaire definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read form config: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to fetch form config: {0}")]
    Fetch(String),
    #[error("failed to parse form config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("form config has no questions")]
    Empty,
    #[error("question id '{0}' is declared more than once")]
    DuplicateQuestion(String),
    #[error("question '{question}' depends on '{depends_on}', which is not an earlier question")]
    InvalidDependency {
        question: String,
        depends_on: String,
    },
    #[error("question '{question}' sets dependsOn without showWhen")]
    MissingShowWhen { question: String },
    #[error("select question '{0}' declares no options")]
    MissingOptions(String),
    #[error("section '{section}' references unknown question '{question}'")]
    UnknownSectionQuestion { section: String, question: String },
    #[error("question '{question}' belongs to both '{first}' and '{second}'")]
    SectionOverlap {
        question: String,
        first: String,
        second: String,
    },
}

impl FormSpec {
    /// Parse and structurally check a form definition.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let spec: FormSpec = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        spec.check()?;
        Ok(spec)
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self, ConfigError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw).map_err(ConfigError::Read)?;
        Self::from_json_str(&raw)
    }

    /// Verify id uniqueness, dependency ordering, option presence, and
    /// section membership.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.questions.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if let Some(depends_on) = &question.depends_on {
                if !seen.contains(depends_on.as_str()) {
                    return Err(ConfigError::InvalidDependency {
                        question: question.id.clone(),
                        depends_on: depends_on.clone(),
                    });
                }
                if question.show_when.is_none() {
                    return Err(ConfigError::MissingShowWhen {
                        question: question.id.clone(),
                    });
                }
            }
            if question.kind.uses_options() && question.options().is_empty() {
                return Err(ConfigError::MissingOptions(question.id.clone()));
            }
            if !seen.insert(question.id.as_str()) {
                return Err(ConfigError::DuplicateQuestion(question.id.clone()));
            }
        }

        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for section in &self.sections {
            for id in &section.questions {
                if !seen.contains(id.as_str()) {
                    return Err(ConfigError::UnknownSectionQuestion {
                        section: section.id.clone(),
                        question: id.clone(),
                    });
                }
                if let Some(first) = owners.insert(id.as_str(), section.id.as_str())
                    && first != section.id
                {
                    return Err(ConfigError::SectionOverlap {
                        question: id.clone(),
                        first: first.to_string(),
                        second: section.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// JSON schema describing the form config document.
pub fn config_json_schema() -> Value {
    let schema = schemars::schema_for!(FormSpec);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}
