use serde_json::Value;

use crate::answers::Answer;
use crate::spec::form::FormSpec;
use crate::spec::question::QuestionSpec;
use crate::store::AnswerStore;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Evaluate `dependsOn`/`showWhen` for every question against the current
/// answers. A question whose controlling question is hidden is hidden too.
pub fn resolve_visibility(spec: &FormSpec, store: &AnswerStore) -> VisibilityMap {
    let mut map = VisibilityMap::new();

    for question in &spec.questions {
        let visible = match &question.depends_on {
            None => true,
            Some(parent) => {
                let parent_visible = map.get(parent).copied().unwrap_or(false);
                parent_visible && condition_holds(question, store.get(parent))
            }
        };
        map.insert(question.id.clone(), visible);
    }

    map
}

/// Indices into `spec.questions` of the currently visible questions, in
/// declaration order.
pub fn visible_indices(spec: &FormSpec, store: &AnswerStore) -> Vec<usize> {
    let visibility = resolve_visibility(spec, store);
    spec.questions
        .iter()
        .enumerate()
        .filter(|(_, question)| visibility.get(&question.id).copied().unwrap_or(true))
        .map(|(index, _)| index)
        .collect()
}

fn condition_holds(question: &QuestionSpec, answer: Option<&Answer>) -> bool {
    let Some(expected) = &question.show_when else {
        return true;
    };
    let Some(answer) = answer else {
        return false;
    };
    match expected {
        Value::Array(candidates) => candidates
            .iter()
            .any(|candidate| answer_matches(answer, candidate)),
        other => answer_matches(answer, other),
    }
}

fn answer_matches(answer: &Answer, expected: &Value) -> bool {
    let Some(expected) = literal(expected) else {
        return false;
    };
    match answer {
        Answer::Text(text) => *text == expected,
        Answer::List(items) => items.iter().any(|item| *item == expected),
        Answer::Fields(_) | Answer::Files(_) => false,
    }
}

fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
