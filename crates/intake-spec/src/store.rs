use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::{Answer, FileAttachment};
use crate::files::{FilePolicy, FileRejected};
use crate::spec::question::{AnswerShape, QuestionSpec, QuestionType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("answer for '{question}' must be {expected}")]
    ShapeMismatch {
        question: String,
        expected: &'static str,
    },
    #[error("question '{question}' has no sub-field labeled '{label}'")]
    UnknownField { question: String, label: String },
    #[error("question '{0}' does not offer an other option")]
    OtherNotAllowed(String),
    #[error("no attachment at index {index} for '{question}'")]
    NoSuchFile { question: String, index: usize },
    #[error(transparent)]
    FileRejected(#[from] FileRejected),
    #[error("answers snapshot could not be encoded: {0}")]
    Encode(String),
    #[error("answers snapshot could not be decoded: {0}")]
    Decode(String),
}

/// Mutable mapping from question id to its current answer.
///
/// Writers normalize before storing: scalars and structured values are
/// trimmed, blank list items are dropped. Last write wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnswerStore {
    #[serde(default)]
    answers: BTreeMap<String, Answer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    others: BTreeMap<String, String>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Answer)> {
        self.answers.iter()
    }

    /// Store `answer` for `question`, normalizing it to the declared shape.
    pub fn set(&mut self, question: &QuestionSpec, answer: Answer) -> Result<(), StoreError> {
        let normalized = normalize(question, answer)?;
        self.answers.insert(question.id.clone(), normalized);
        Ok(())
    }

    /// Write one sub-field of a structured answer without touching siblings.
    pub fn set_field(
        &mut self,
        question: &QuestionSpec,
        label: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        if question.kind != QuestionType::Structured {
            return Err(shape_mismatch(question));
        }
        if !question.structure().iter().any(|field| field.label == label) {
            return Err(StoreError::UnknownField {
                question: question.id.clone(),
                label: label.to_string(),
            });
        }
        let entry = self
            .answers
            .entry(question.id.clone())
            .or_insert_with(|| Answer::Fields(BTreeMap::new()));
        if let Answer::Fields(fields) = entry {
            fields.insert(label.to_string(), value.trim().to_string());
        }
        Ok(())
    }

    /// Append an attachment after checking the question's limits.
    pub fn add_file(
        &mut self,
        question: &QuestionSpec,
        file: FileAttachment,
    ) -> Result<(), StoreError> {
        if question.kind != QuestionType::FileAttachment {
            return Err(FileRejected::NotAFileQuestion(question.id.clone()).into());
        }
        let policy = FilePolicy::for_question(question);
        let existing = self.files(&question.id).len();
        policy.accept(existing, &file)?;
        let entry = self
            .answers
            .entry(question.id.clone())
            .or_insert_with(|| Answer::Files(Vec::new()));
        if let Answer::Files(files) = entry {
            files.push(file);
        }
        Ok(())
    }

    /// Remove the attachment at `index`, keeping the others in order.
    pub fn remove_file(
        &mut self,
        question_id: &str,
        index: usize,
    ) -> Result<FileAttachment, StoreError> {
        match self.answers.get_mut(question_id) {
            Some(Answer::Files(files)) if index < files.len() => {
                let removed = files.remove(index);
                if files.is_empty() {
                    self.answers.remove(question_id);
                }
                Ok(removed)
            }
            _ => Err(StoreError::NoSuchFile {
                question: question_id.to_string(),
                index,
            }),
        }
    }

    pub fn files(&self, question_id: &str) -> &[FileAttachment] {
        self.answers
            .get(question_id)
            .and_then(Answer::as_files)
            .unwrap_or_default()
    }

    /// Free text typed for the `other` choice. Clearing it removes the entry.
    pub fn set_other(&mut self, question: &QuestionSpec, text: &str) -> Result<(), StoreError> {
        if !question.allow_other || !question.kind.uses_options() {
            return Err(StoreError::OtherNotAllowed(question.id.clone()));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.others.remove(&question.id);
        } else {
            self.others.insert(question.id.clone(), trimmed.to_string());
        }
        Ok(())
    }

    pub fn other(&self, question_id: &str) -> Option<&str> {
        self.others.get(question_id).map(String::as_str)
    }

    /// Raw answers as a JSON object keyed by question id.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (id, answer) in &self.answers {
            map.insert(
                id.clone(),
                serde_json::to_value(answer).unwrap_or(Value::Null),
            );
        }
        for (id, text) in &self.others {
            map.insert(format!("{}_other", id), Value::String(text.clone()));
        }
        Value::Object(map)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|err| StoreError::Encode(err.to_string()))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, StoreError> {
        serde_cbor::to_vec(self).map_err(|err| StoreError::Encode(err.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_cbor::from_slice(bytes).map_err(|err| StoreError::Decode(err.to_string()))
    }

    /// Rebuild a store from a flat `{ question_id: value }` object, ignoring
    /// ids the form does not declare and values of the wrong shape.
    pub fn from_answers_value(questions: &[QuestionSpec], value: &Value) -> Self {
        let mut store = Self::new();
        let Some(map) = value.as_object() else {
            return store;
        };
        for question in questions {
            if let Some(raw) = map.get(&question.id)
                && let Ok(answer) = serde_json::from_value::<Answer>(raw.clone())
            {
                let _ = store.set(question, answer);
            }
            if let Some(Value::String(text)) = map.get(&format!("{}_other", question.id)) {
                let _ = store.set_other(question, text);
            }
        }
        store
    }
}

fn normalize(question: &QuestionSpec, answer: Answer) -> Result<Answer, StoreError> {
    match (question.kind.shape(), answer) {
        (AnswerShape::Text, Answer::Text(text)) => Ok(Answer::Text(text.trim().to_string())),
        (AnswerShape::List, Answer::List(items)) => Ok(Answer::List(
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )),
        (AnswerShape::Fields, Answer::Fields(fields)) => Ok(Answer::Fields(
            fields
                .into_iter()
                .map(|(label, value)| (label, value.trim().to_string()))
                .collect(),
        )),
        (AnswerShape::Files, Answer::Files(files)) => Ok(Answer::Files(files)),
        // An empty JSON array deserializes as a list; accept it for files.
        (AnswerShape::Files, Answer::List(items)) if items.is_empty() => {
            Ok(Answer::Files(Vec::new()))
        }
        _ => Err(shape_mismatch(question)),
    }
}

fn shape_mismatch(question: &QuestionSpec) -> StoreError {
    let expected = match question.kind.shape() {
        AnswerShape::Text => "a string",
        AnswerShape::List => "a list of strings",
        AnswerShape::Fields => "an object of labeled fields",
        AnswerShape::Files => "a list of files",
    };
    StoreError::ShapeMismatch {
        question: question.id.clone(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::question::SubField;

    #[test]
    fn set_trims_scalars() {
        let question = QuestionSpec::new("name", "Name", QuestionType::ShortText);
        let mut store = AnswerStore::new();
        store.set(&question, Answer::text("  Acme  ")).unwrap();
        assert_eq!(store.get("name"), Some(&Answer::text("Acme")));
    }

    #[test]
    fn set_rejects_wrong_shape() {
        let question = QuestionSpec::new("tags", "Tags", QuestionType::MultiSelect);
        let mut store = AnswerStore::new();
        let err = store.set(&question, Answer::text("bold")).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        assert!(store.get("tags").is_none());
    }

    #[test]
    fn set_field_keeps_siblings() {
        let question = QuestionSpec::new("contact", "Contact", QuestionType::Structured)
            .with_structure(vec![
                SubField {
                    label: "Name".into(),
                    required: true,
                    ..Default::default()
                },
                SubField {
                    label: "Role".into(),
                    ..Default::default()
                },
            ]);
        let mut store = AnswerStore::new();
        store.set_field(&question, "Name", " Ada ").unwrap();
        store.set_field(&question, "Role", "CTO").unwrap();
        let fields = store.get("contact").and_then(Answer::as_fields).unwrap();
        assert_eq!(fields.get("Name").map(String::as_str), Some("Ada"));
        assert_eq!(fields.get("Role").map(String::as_str), Some("CTO"));
        assert!(store.set_field(&question, "Email", "x").is_err());
    }

    #[test]
    fn remove_file_preserves_order() {
        let mut question = QuestionSpec::new("assets", "Assets", QuestionType::FileAttachment);
        question.max_files = Some(3);
        let mut store = AnswerStore::new();
        for name in ["a.png", "b.png", "c.png"] {
            store
                .add_file(&question, FileAttachment::new(name, "image/png", vec![0; 4]))
                .unwrap();
        }
        let removed = store.remove_file("assets", 1).unwrap();
        assert_eq!(removed.name, "b.png");
        let names = store
            .files("assets")
            .iter()
            .map(|file| file.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert!(store.remove_file("assets", 5).is_err());
    }

    #[test]
    fn clearing_other_text_removes_it() {
        let mut question = QuestionSpec::new("industry", "Industry", QuestionType::SingleSelect)
            .with_options([("retail", "Retail"), ("other", "Other")]);
        question.allow_other = true;
        let mut store = AnswerStore::new();
        store.set_other(&question, "Aerospace").unwrap();
        assert_eq!(store.other("industry"), Some("Aerospace"));
        store.set_other(&question, "   ").unwrap();
        assert_eq!(store.other("industry"), None);
    }

    #[test]
    fn cbor_snapshot_restores() {
        let question = QuestionSpec::new("name", "Name", QuestionType::ShortText);
        let mut store = AnswerStore::new();
        store.set(&question, Answer::text("Acme")).unwrap();
        let bytes = store.to_cbor().unwrap();
        assert_eq!(AnswerStore::from_cbor(&bytes).unwrap(), store);
    }
}
