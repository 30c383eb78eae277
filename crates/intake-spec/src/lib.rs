#![allow(missing_docs)]

pub mod answers;
pub mod delivery;
pub mod files;
pub mod navigation;
pub mod progress;
pub mod render;
pub mod report;
pub mod spec;
pub mod store;
pub mod template;
pub mod validate;
pub mod visibility;

pub use answers::{Answer, FileAttachment, ValidationError, ValidationResult};
pub use delivery::{Delivery, DeliveryError, DeliveryMetadata, DeliveryPayload, DeliveryStatus};
pub use files::{FilePolicy, FileRejected};
pub use navigation::{
    Advisory, AdvisoryKind, NavOutcome, NavigationConfig, Session, SessionError, SessionState,
    Submission, TransitionGuard,
};
pub use progress::{Position, progress_percent};
pub use render::{
    InputSurface, RenderQuestion, ScreenPayload, build_screen, render_json_ui, render_question,
    render_text,
};
pub use report::{ReportContext, export_filename, generate, generate_with};
pub use spec::{ConfigError, FormSpec, QuestionSpec, QuestionType, SectionSpec, SubField};
pub use store::{AnswerStore, StoreError};
pub use template::{TemplateEngine, TemplateError, register_default_helpers, success_message};
pub use validate::{check, is_satisfied, validate, validate_value};
pub use visibility::{VisibilityMap, resolve_visibility, visible_indices};
