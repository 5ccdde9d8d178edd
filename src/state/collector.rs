//! Buffers answer submissions for the question that is currently open.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::state::game::{AnswerId, QuestionSnapshot};

/// Latest answer a player gave for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub player_id: Uuid,
    pub question_id: Uuid,
    /// Selected answers in the order the player sent them.
    pub answer_ids: Vec<AnswerId>,
    pub submitted_at: Instant,
}

/// Submission set handed over once a question closes.
#[derive(Debug, Clone)]
pub struct FrozenSubmissions {
    pub question_id: Uuid,
    /// When the question became answerable; answer times are measured from here.
    pub opened_at: Instant,
    /// One submission per player, in first-submission order.
    pub submissions: Vec<Submission>,
}

/// Reasons a submission is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("question `{0}` is not open for answers")]
    NotOpen(Uuid),
    #[error("at least one answer must be selected")]
    Empty,
    #[error("answer `{0}` was selected more than once")]
    Duplicate(AnswerId),
    #[error("answer `{0}` is not an answer of this question")]
    UnknownAnswer(AnswerId),
}

#[derive(Debug, Clone)]
enum Window {
    Idle,
    Open { question_id: Uuid, opened_at: Instant },
    Closed,
}

/// Collects answers for one question at a time.
#[derive(Debug, Clone)]
pub struct AnswerCollector {
    window: Window,
    submissions: IndexMap<Uuid, Submission>,
}

impl Default for AnswerCollector {
    fn default() -> Self {
        Self {
            window: Window::Idle,
            submissions: IndexMap::new(),
        }
    }
}

impl AnswerCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting answers for `question_id`, dropping anything collected before.
    pub fn open(&mut self, question_id: Uuid, opened_at: Instant) {
        self.submissions.clear();
        self.window = Window::Open {
            question_id,
            opened_at,
        };
    }

    /// Whether answers for `question_id` are currently accepted.
    pub fn is_open_for(&self, question_id: Uuid) -> bool {
        matches!(self.window, Window::Open { question_id: open, .. } if open == question_id)
    }

    /// Record a player's answer, replacing their previous one for the same question.
    ///
    /// The caller is responsible for checking the player belongs to the session.
    pub fn submit(
        &mut self,
        player_id: Uuid,
        question: &QuestionSnapshot,
        answer_ids: Vec<AnswerId>,
        submitted_at: Instant,
    ) -> Result<(), SubmissionError> {
        if !self.is_open_for(question.id) {
            return Err(SubmissionError::NotOpen(question.id));
        }

        if answer_ids.is_empty() {
            return Err(SubmissionError::Empty);
        }

        let mut seen = HashSet::with_capacity(answer_ids.len());
        for id in &answer_ids {
            if !seen.insert(*id) {
                return Err(SubmissionError::Duplicate(*id));
            }
            if !question.has_answer(*id) {
                return Err(SubmissionError::UnknownAnswer(*id));
            }
        }

        self.submissions.insert(
            player_id,
            Submission {
                player_id,
                question_id: question.id,
                answer_ids,
                submitted_at,
            },
        );
        Ok(())
    }

    /// Stop accepting answers for `question_id` and hand over what was collected.
    pub fn close(&mut self, question_id: Uuid) -> Result<FrozenSubmissions, SubmissionError> {
        let opened_at = match self.window {
            Window::Open {
                question_id: open,
                opened_at,
            } if open == question_id => opened_at,
            _ => return Err(SubmissionError::NotOpen(question_id)),
        };

        self.window = Window::Closed;
        let submissions = self.submissions.drain(..).map(|(_, s)| s).collect();

        Ok(FrozenSubmissions {
            question_id,
            opened_at,
            submissions,
        })
    }

    /// Throw away in-flight submissions without producing a result.
    pub fn discard(&mut self) {
        self.submissions.clear();
        self.window = Window::Idle;
    }
}
