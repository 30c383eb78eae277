use serde::{Deserialize, Serialize};

/// Where the respondent currently is in the questionnaire.
///
/// `Question::index` points into the form's full question list, not the
/// visible sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    #[default]
    Welcome,
    Question {
        index: usize,
    },
    Final,
    Success,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Welcome => "welcome",
            Position::Question { .. } => "question",
            Position::Final => "final",
            Position::Success => "success",
        }
    }

    pub fn question_index(&self) -> Option<usize> {
        match self {
            Position::Question { index } => Some(*index),
            _ => None,
        }
    }
}

/// First visible question after `current` (or the first one when `None`).
pub fn next_visible(visible: &[usize], current: Option<usize>) -> Option<usize> {
    visible
        .iter()
        .copied()
        .find(|index| current.is_none_or(|current| *index > current))
}

/// Last visible question before `current`.
pub fn prev_visible(visible: &[usize], current: usize) -> Option<usize> {
    visible.iter().rev().copied().find(|index| *index < current)
}

/// Ordinal of `position` on the progress track: welcome is 0, the final
/// screen is `visible.len() + 1`.
pub fn ordinal(position: &Position, visible: &[usize]) -> usize {
    match position {
        Position::Welcome => 0,
        Position::Question { index } => visible.iter().filter(|i| **i < *index).count() + 1,
        Position::Final | Position::Success => visible.len() + 1,
    }
}

/// Completion percentage in `[0, 100]`.
pub fn progress_percent(position: &Position, visible: &[usize]) -> f64 {
    if matches!(position, Position::Success) {
        return 100.0;
    }
    let fraction = (ordinal(position, visible) + 1) as f64 / (visible.len() + 2) as f64;
    (fraction * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_prev_skip_hidden_indices() {
        let visible = [0, 2, 5];
        assert_eq!(next_visible(&visible, None), Some(0));
        assert_eq!(next_visible(&visible, Some(0)), Some(2));
        assert_eq!(next_visible(&visible, Some(2)), Some(5));
        assert_eq!(next_visible(&visible, Some(5)), None);
        assert_eq!(prev_visible(&visible, 5), Some(2));
        assert_eq!(prev_visible(&visible, 0), None);
    }

    #[test]
    fn progress_runs_from_welcome_to_final() {
        let visible = [0, 1, 2];
        let welcome = progress_percent(&Position::Welcome, &visible);
        let first = progress_percent(&Position::Question { index: 0 }, &visible);
        let last = progress_percent(&Position::Final, &visible);
        assert!((welcome - 20.0).abs() < 1e-9);
        assert!((first - 40.0).abs() < 1e-9);
        assert!((last - 100.0).abs() < 1e-9);
    }
}
