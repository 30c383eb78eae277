pub mod form;
pub mod load;
pub mod question;

pub use form::{FormSpec, Messages, OutputOptions, SectionSpec, Styling, WebhookSpec};
pub use load::{ConfigError, config_json_schema};
pub use question::{
    AnswerShape, ChoiceOption, Constraint, OTHER_VALUE, QuestionSpec, QuestionType, SubField,
};
