use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::spec::form::FormSpec;
use crate::store::AnswerStore;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template render failed: {0}")]
    Render(String),
}

handlebars_helper!(upper: |text: str| text.to_uppercase());
handlebars_helper!(lower: |text: str| text.to_lowercase());
handlebars_helper!(fallback: |value: Json, default: str| match value {
    Value::String(text) if !text.trim().is_empty() => text.clone(),
    Value::Null => default.to_string(),
    Value::String(_) => default.to_string(),
    other => other.to_string(),
});

pub fn register_default_helpers(registry: &mut Handlebars<'_>) {
    registry.register_helper("upper", Box::new(upper));
    registry.register_helper("lower", Box::new(lower));
    registry.register_helper("fallback", Box::new(fallback));
}

/// Plain-text handlebars renderer for user-facing copy.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        register_default_helpers(&mut registry);
        Self { registry }
    }

    pub fn render(&self, template: &str, ctx: &Value) -> Result<String, TemplateError> {
        self.registry
            .render_template(template, ctx)
            .map_err(|err| TemplateError::Render(err.to_string()))
    }
}

/// Context exposed to message templates: `title` and `answers`.
pub fn message_context(spec: &FormSpec, store: &AnswerStore) -> Value {
    json!({
        "title": spec.title,
        "answers": store.to_value(),
    })
}

/// Render the configured success message; a broken template falls back to
/// the raw text.
pub fn success_message(spec: &FormSpec, store: &AnswerStore) -> String {
    let template = &spec.messages.success_message;
    match TemplateEngine::new().render(template, &message_context(spec, store)) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "success message template did not render");
            template.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_answers_without_escaping() {
        let engine = TemplateEngine::new();
        let ctx = json!({ "answers": { "company": "Fish & Chips" } });
        let text = engine
            .render("Thanks, {{answers.company}}!", &ctx)
            .unwrap();
        assert_eq!(text, "Thanks, Fish & Chips!");
    }

    #[test]
    fn fallback_helper_fills_blank_values() {
        let engine = TemplateEngine::new();
        let ctx = json!({ "answers": { "company": "  " } });
        let text = engine
            .render("Hi {{fallback answers.company \"there\"}}", &ctx)
            .unwrap();
        assert_eq!(text, "Hi there");
    }

    #[test]
    fn upper_helper() {
        let engine = TemplateEngine::new();
        let text = engine.render("{{upper title}}", &json!({ "title": "acme" })).unwrap();
        assert_eq!(text, "ACME");
    }
}
