//! Session state machine: Welcome → Question(i)… → Final → Success.
//!
//! The session owns the form and the answer store. Every navigation step
//! recomputes the visible sequence, so an earlier answer can hide or reveal
//! later questions. Only one transition may be in flight at a time; requests
//! that arrive while the previous one is still settling are dropped.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::answers::{Answer, FileAttachment, ValidationError};
use crate::delivery::{Delivery, DeliveryPayload, DeliveryStatus};
use crate::progress::{Position, next_visible, prev_visible, progress_percent};
use crate::report::{ReportContext, export_filename, generate_with};
use crate::spec::form::FormSpec;
use crate::spec::question::{OTHER_VALUE, QuestionSpec};
use crate::store::{AnswerStore, StoreError};
use crate::template::success_message;
use crate::validate::check;
use crate::visibility::visible_indices;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);
pub const DEFAULT_AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot submit from the {0} screen")]
    NotReady(&'static str),
}

/// Timing knobs for hosts that animate between screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationConfig {
    pub settle: Duration,
    pub auto_advance_delay: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            auto_advance_delay: DEFAULT_AUTO_ADVANCE_DELAY,
        }
    }
}

impl NavigationConfig {
    /// No settle period and no auto-advance delay.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            auto_advance_delay: Duration::ZERO,
        }
    }
}

/// Single-flight guard around navigation transitions.
#[derive(Debug, Clone)]
pub struct TransitionGuard {
    settle: Duration,
    busy_until: Option<Instant>,
}

impl TransitionGuard {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            busy_until: None,
        }
    }

    pub fn is_busy(&self, now: Instant) -> bool {
        self.busy_until.is_some_and(|until| now < until)
    }

    fn arm(&mut self, now: Instant) {
        self.busy_until = Some(now + self.settle);
    }

    /// Host signal that the screen change finished before the settle period.
    pub fn release(&mut self) {
        self.busy_until = None;
    }
}

/// What a navigation request did.
#[derive(Debug, Clone, PartialEq)]
pub enum NavOutcome {
    Moved { from: Position, to: Position },
    /// Validation failed; the position is unchanged.
    Blocked(ValidationError),
    /// Another transition is still settling.
    Dropped,
    /// Nothing to do from here (back on Welcome, advance on Final).
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    Validation,
    FileRejected,
}

/// Non-blocking message shown next to the current question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub question_id: Option<String>,
    pub message: String,
}

impl Advisory {
    fn validation(error: &ValidationError) -> Self {
        Self {
            kind: AdvisoryKind::Validation,
            question_id: error.question_id.clone(),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    index: usize,
    due: Instant,
}

/// Result of a completed questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub report: String,
    pub filename: String,
    pub success_message: String,
    pub delivery: DeliveryStatus,
}

/// Serializable snapshot used by stateless hosts between calls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub answers: AnswerStore,
}

pub struct Session {
    spec: FormSpec,
    store: AnswerStore,
    position: Position,
    config: NavigationConfig,
    guard: TransitionGuard,
    pending: Option<PendingAdvance>,
    advisory: Option<Advisory>,
    submission: Option<Submission>,
}

impl Session {
    pub fn new(spec: FormSpec, config: NavigationConfig) -> Self {
        Self {
            spec,
            store: AnswerStore::new(),
            position: Position::Welcome,
            guard: TransitionGuard::new(config.settle),
            config,
            pending: None,
            advisory: None,
            submission: None,
        }
    }

    /// Resume from a snapshot. A question position that no longer exists
    /// falls back to the welcome screen.
    pub fn restore(spec: FormSpec, state: SessionState, config: NavigationConfig) -> Self {
        let mut session = Self::new(spec, config);
        session.position = match state.position {
            Position::Question { index } if index >= session.spec.questions.len() => {
                Position::Welcome
            }
            other => other,
        };
        session.store = state.answers;
        session
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            position: self.position,
            answers: self.store.clone(),
        }
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisory.as_ref()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn guard_mut(&mut self) -> &mut TransitionGuard {
        &mut self.guard
    }

    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.position
            .question_index()
            .and_then(|index| self.spec.questions.get(index))
    }

    /// Indices of the currently visible questions.
    pub fn visible(&self) -> Vec<usize> {
        visible_indices(&self.spec, &self.store)
    }

    pub fn visible_questions(&self) -> Vec<&QuestionSpec> {
        self.visible()
            .into_iter()
            .map(|index| &self.spec.questions[index])
            .collect()
    }

    pub fn progress_percent(&self) -> f64 {
        progress_percent(&self.position, &self.visible())
    }

    /// 1-based step and total among visible questions for the current screen.
    pub fn step(&self) -> Option<(usize, usize)> {
        let index = self.position.question_index()?;
        let visible = self.visible();
        let step = visible.iter().position(|i| *i == index)? + 1;
        Some((step, visible.len()))
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.position, Position::Question { .. } | Position::Final)
    }

    fn question(&self, question_id: &str) -> Result<QuestionSpec, SessionError> {
        self.spec
            .question(question_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))
    }

    /// Store an answer and refresh the advisory for that question. Choosing
    /// an option on a single-select or dropdown schedules an auto-advance,
    /// except the "other" option, which waits for its free text.
    pub fn answer(
        &mut self,
        question_id: &str,
        answer: Answer,
        now: Instant,
    ) -> Result<(), SessionError> {
        let question = self.question(question_id)?;
        let picks_other = question.allow_other && answer.as_text() == Some(OTHER_VALUE);
        self.store.set(&question, answer)?;
        self.revalidate(&question);

        if picks_other {
            self.pending = None;
        } else if question.kind.auto_advances()
            && let Some(index) = self.position.question_index()
            && self.spec.questions[index].id == question.id
            && self.store.get(&question.id).is_some_and(|a| !a.is_empty())
        {
            self.pending = Some(PendingAdvance {
                index,
                due: now + self.config.auto_advance_delay,
            });
        }
        Ok(())
    }

    pub fn set_field(
        &mut self,
        question_id: &str,
        label: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let question = self.question(question_id)?;
        self.store.set_field(&question, label, value)?;
        self.revalidate(&question);
        Ok(())
    }

    pub fn set_other(&mut self, question_id: &str, text: &str) -> Result<(), SessionError> {
        let question = self.question(question_id)?;
        self.store.set_other(&question, text)?;
        self.revalidate(&question);
        Ok(())
    }

    /// Try to attach a file. A rejection becomes an advisory and leaves the
    /// accepted files untouched.
    pub fn attach_file(
        &mut self,
        question_id: &str,
        file: FileAttachment,
    ) -> Result<(), SessionError> {
        let question = self.question(question_id)?;
        match self.store.add_file(&question, file) {
            Ok(()) => {
                self.revalidate(&question);
                Ok(())
            }
            Err(StoreError::FileRejected(rejected)) => {
                debug!(question = %question.id, reason = %rejected, "file rejected");
                self.advisory = Some(Advisory {
                    kind: AdvisoryKind::FileRejected,
                    question_id: Some(question.id.clone()),
                    message: rejected.to_string(),
                });
                Err(StoreError::FileRejected(rejected).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn remove_file(
        &mut self,
        question_id: &str,
        index: usize,
    ) -> Result<FileAttachment, SessionError> {
        let question = self.question(question_id)?;
        let removed = self.store.remove_file(&question.id, index)?;
        self.revalidate(&question);
        Ok(removed)
    }

    fn revalidate(&mut self, question: &QuestionSpec) {
        let shows_this = self
            .advisory
            .as_ref()
            .is_some_and(|advisory| advisory.question_id.as_deref() == Some(&question.id));
        if !shows_this {
            return;
        }
        self.advisory = check(question, &self.store)
            .err()
            .map(|error| Advisory::validation(&error));
    }

    /// Advance to the next visible screen if the current question validates.
    pub fn advance(&mut self, now: Instant) -> NavOutcome {
        if self.guard.is_busy(now) {
            debug!(position = self.position.as_str(), "advance dropped while settling");
            return NavOutcome::Dropped;
        }
        self.pending = None;

        let visible = self.visible();
        let target = match self.position {
            Position::Welcome => match next_visible(&visible, None) {
                Some(index) => Position::Question { index },
                None => Position::Final,
            },
            // a question hidden by a later answer no longer gates the move
            Position::Question { index } if !visible.contains(&index) => {
                match next_visible(&visible, Some(index)) {
                    Some(next) => Position::Question { index: next },
                    None => Position::Final,
                }
            }
            Position::Question { index } => {
                let question = &self.spec.questions[index];
                if let Err(error) = check(question, &self.store) {
                    self.advisory = Some(Advisory::validation(&error));
                    return NavOutcome::Blocked(error);
                }
                match next_visible(&visible, Some(index)) {
                    Some(next) => Position::Question { index: next },
                    None => Position::Final,
                }
            }
            Position::Final | Position::Success => return NavOutcome::Unchanged,
        };
        self.move_to(target, now)
    }

    /// Step back to the previous visible screen. Never validates.
    pub fn back(&mut self, now: Instant) -> NavOutcome {
        if self.guard.is_busy(now) {
            debug!(position = self.position.as_str(), "back dropped while settling");
            return NavOutcome::Dropped;
        }
        self.pending = None;

        let visible = self.visible();
        let target = match self.position {
            Position::Question { index } => match prev_visible(&visible, index) {
                Some(prev) => Position::Question { index: prev },
                None => Position::Welcome,
            },
            Position::Final => match visible.last() {
                Some(last) => Position::Question { index: *last },
                None => Position::Welcome,
            },
            Position::Welcome | Position::Success => return NavOutcome::Unchanged,
        };
        self.move_to(target, now)
    }

    fn move_to(&mut self, target: Position, now: Instant) -> NavOutcome {
        let from = self.position;
        self.position = target;
        self.advisory = None;
        self.guard.arm(now);
        debug!(from = from.as_str(), to = target.as_str(), "navigated");
        NavOutcome::Moved { from, to: target }
    }

    /// Fire a scheduled auto-advance once its delay has passed. Returns
    /// `None` when nothing was due; while the guard is still settling the
    /// advance stays scheduled so a later poll can fire it.
    pub fn poll_auto_advance(&mut self, now: Instant) -> Option<NavOutcome> {
        let pending = self.pending?;
        if now < pending.due || self.guard.is_busy(now) {
            return None;
        }
        self.pending = None;
        if self.position.question_index() != Some(pending.index) {
            return None;
        }
        Some(self.advance(now))
    }

    pub fn has_pending_advance(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel_auto_advance(&mut self) {
        self.pending = None;
    }

    /// Generate the report, hand it to `delivery` if present, and move to the
    /// success screen. Delivery failures are logged and recorded but never
    /// stop the transition.
    pub async fn submit(
        &mut self,
        delivery: Option<&dyn Delivery>,
        client_info: &str,
    ) -> Result<Submission, SessionError> {
        if self.position != Position::Final {
            return Err(SessionError::NotReady(self.position.as_str()));
        }
        self.pending = None;

        let now = Utc::now();
        let report = generate_with(&self.spec, &self.store, &ReportContext::at(now, now));
        let status = match delivery {
            None => DeliveryStatus::Skipped,
            Some(delivery) => {
                let payload =
                    DeliveryPayload::new(&self.spec, &self.store, &report, now, client_info);
                match delivery.deliver(&payload).await {
                    Ok(()) => {
                        info!(title = %self.spec.title, "report delivered");
                        DeliveryStatus::Delivered
                    }
                    Err(err) => {
                        warn!(error = %err, "report delivery failed");
                        DeliveryStatus::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            }
        };

        let submission = Submission {
            filename: export_filename(&self.spec, now),
            success_message: success_message(&self.spec, &self.store),
            report,
            delivery: status,
        };
        self.position = Position::Success;
        self.advisory = None;
        self.submission = Some(submission.clone());
        Ok(submission)
    }
}
