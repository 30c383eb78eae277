use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input kinds supported by the questionnaire.
///
/// HTML input names (`text`, `tel`, `textarea`, `radio`, `select`,
/// `checkbox`, `file`) are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[default]
    #[serde(alias = "text")]
    ShortText,
    Email,
    #[serde(alias = "tel")]
    Phone,
    #[serde(alias = "textarea")]
    LongText,
    #[serde(alias = "radio")]
    SingleSelect,
    #[serde(alias = "select")]
    Dropdown,
    #[serde(alias = "checkbox")]
    MultiSelect,
    Structured,
    #[serde(alias = "file")]
    FileAttachment,
}

/// Storage shape required by a question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    Text,
    List,
    Fields,
    Files,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::ShortText => "short-text",
            QuestionType::Email => "email",
            QuestionType::Phone => "phone",
            QuestionType::LongText => "long-text",
            QuestionType::SingleSelect => "single-select",
            QuestionType::Dropdown => "dropdown",
            QuestionType::MultiSelect => "multi-select",
            QuestionType::Structured => "structured",
            QuestionType::FileAttachment => "file-attachment",
        }
    }

    pub fn shape(&self) -> AnswerShape {
        match self {
            QuestionType::ShortText
            | QuestionType::Email
            | QuestionType::Phone
            | QuestionType::LongText
            | QuestionType::SingleSelect
            | QuestionType::Dropdown => AnswerShape::Text,
            QuestionType::MultiSelect => AnswerShape::List,
            QuestionType::Structured => AnswerShape::Fields,
            QuestionType::FileAttachment => AnswerShape::Files,
        }
    }

    /// Types whose answer comes from the declared `options`.
    pub fn uses_options(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleSelect | QuestionType::Dropdown | QuestionType::MultiSelect
        )
    }

    /// Types that move on by themselves shortly after a choice is made.
    pub fn auto_advances(&self) -> bool {
        matches!(self, QuestionType::SingleSelect | QuestionType::Dropdown)
    }
}

/// One selectable option of a select question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A labeled sub-field of a structured question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubField {
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Extra checks applied to non-empty text answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

/// Value reserved for the free-text "other" choice.
pub const OTHER_VALUE: &str = "other";

/// Question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Vec<SubField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    /// Per-file size limit in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,
    /// Select questions only: offer an `other` choice with a free-text answer.
    #[serde(default)]
    pub allow_other: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

impl QuestionSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: QuestionType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, V, L>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        self.options = Some(
            options
                .into_iter()
                .map(|(value, label)| ChoiceOption::new(value, label))
                .collect(),
        );
        self
    }

    pub fn with_structure(mut self, fields: Vec<SubField>) -> Self {
        self.structure = Some(fields);
        self
    }

    pub fn shown_when(mut self, depends_on: impl Into<String>, value: Value) -> Self {
        self.depends_on = Some(depends_on.into());
        self.show_when = Some(value);
        self
    }

    /// Declared options, or an empty slice when none were configured.
    pub fn options(&self) -> &[ChoiceOption] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Declared sub-fields, or an empty slice when none were configured.
    pub fn structure(&self) -> &[SubField] {
        self.structure.as_deref().unwrap_or_default()
    }

    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options()
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.as_str())
    }
}
