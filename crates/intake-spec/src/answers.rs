use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::spec::question::AnswerShape;

/// A stored answer. The variant always matches the question's [`AnswerShape`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    List(Vec<String>),
    Fields(BTreeMap<String, String>),
    Files(Vec<FileAttachment>),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::List(items.into_iter().map(Into::into).collect())
    }

    pub fn fields<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Answer::Fields(
            entries
                .into_iter()
                .map(|(label, value)| (label.into(), value.into()))
                .collect(),
        )
    }

    pub fn shape(&self) -> AnswerShape {
        match self {
            Answer::Text(_) => AnswerShape::Text,
            Answer::List(_) => AnswerShape::List,
            Answer::Fields(_) => AnswerShape::Fields,
            Answer::Files(_) => AnswerShape::Files,
        }
    }

    /// True when the answer carries no user content.
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::List(items) => items.is_empty(),
            Answer::Fields(fields) => fields.values().all(|value| value.trim().is_empty()),
            Answer::Files(files) => files.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Answer::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Answer::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&[FileAttachment]> {
        match self {
            Answer::Files(files) => Some(files),
            _ => None,
        }
    }
}

/// Uploaded file kept as an opaque blob plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(default, with = "base64_content")]
    pub content: Vec<u8>,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

mod base64_content {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A single validation failure surfaced as an advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub question_id: Option<String>,
    pub path: Option<String>,
    pub message: String,
    pub code: Option<String>,
}

/// Whole-form validation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}
