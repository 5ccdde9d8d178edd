use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::SessionStateEntity;

/// Lifecycle states of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for players to join.
    Lobby,
    /// A question has been selected and becomes answerable once the countdown elapses.
    QuestionCountdown,
    /// Players may submit answers for the current question.
    QuestionOpen,
    /// Answers are shown along with the question result.
    QuestionClose,
    /// Every question has been played; final standings are shown.
    FinalResults,
    /// Terminal state; the session is read-only history.
    End,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the session from the lobby.
    Start,
    /// The countdown timer fired.
    CountdownElapsed,
    /// The question timer fired.
    QuestionElapsed,
    /// Host closes the open question early.
    GoToAnswer,
    /// Host moves on to the following question.
    NextQuestion,
    /// Host moves past the last question.
    ShowFinalResults,
    /// Host ends the session.
    End,
}

/// Error returned when an event has no edge from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The state the machine was in when the invalid event was received.
    pub from: SessionState,
    /// The event that cannot be applied from this state.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current state.
    InvalidTransition(InvalidTransition),
    /// `NextQuestion` was requested while on the last question.
    NoMoreQuestions {
        /// Number of questions in the session.
        total: usize,
    },
    /// `ShowFinalResults` was requested before the last question.
    QuestionsRemaining {
        /// Zero-based index of the current question.
        index: usize,
        /// Number of questions in the session.
        total: usize,
    },
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State changed since the plan was created.
    StateMismatch {
        /// State when the plan was created.
        expected: SessionState,
        /// Current state.
        actual: SessionState,
    },
    /// Version changed since the plan was created.
    VersionMismatch {
        /// Version when the plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// State the machine is currently in.
    pub from: SessionState,
    /// State the machine will move to.
    pub to: SessionState,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Question index once the transition is applied.
    pub question_index: Option<usize>,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: SessionState,
    pub question_index: Option<usize>,
    pub version: usize,
    pub pending: Option<SessionState>,
}

/// Per-session state machine owning the state and the current question index.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    question_index: Option<usize>,
    question_count: usize,
    version: usize,
    pending: Option<Plan>,
}

impl SessionStateMachine {
    /// Create a machine in the lobby for a session with `question_count` questions.
    pub fn new(question_count: usize) -> Self {
        Self {
            state: SessionState::Lobby,
            question_index: None,
            question_count,
            version: 0,
            pending: None,
        }
    }

    /// Machine of a session reloaded from the store. Its timers did not survive, so it is ended.
    pub fn ended(question_count: usize, question_index: Option<usize>) -> Self {
        Self {
            state: SessionState::End,
            question_index,
            question_count,
            version: 0,
            pending: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Zero-based index of the current question, `None` before start.
    pub fn question_index(&self) -> Option<usize> {
        self.question_index
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            question_index: self.question_index,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate that `event` can be applied from the current state and reserve the transition.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let (to, question_index) = self.compute_transition(event)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.state,
            to,
            event,
            question_index,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, returning the new state.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionState, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.state != plan.from {
            return Err(ApplyError::StateMismatch {
                expected: plan.from,
                actual: self.state,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.state = plan.to;
        self.question_index = plan.question_index;
        self.version = plan.version_next;

        Ok(self.state)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Whether the current question is the last one.
    pub fn on_last_question(&self) -> bool {
        self.question_index
            .is_some_and(|index| index + 1 >= self.question_count)
    }

    fn compute_transition(
        &self,
        event: SessionEvent,
    ) -> Result<(SessionState, Option<usize>), PlanError> {
        use SessionEvent as E;
        use SessionState as S;

        let index = self.question_index;
        let next = match (self.state, event) {
            (S::Lobby, E::Start) if self.question_count > 0 => (S::QuestionCountdown, Some(0)),
            (S::QuestionCountdown, E::CountdownElapsed) => (S::QuestionOpen, index),
            (S::QuestionOpen, E::QuestionElapsed | E::GoToAnswer) => (S::QuestionClose, index),
            (S::QuestionClose, E::NextQuestion) => {
                let next_index = index.map_or(0, |index| index + 1);
                if next_index >= self.question_count {
                    return Err(PlanError::NoMoreQuestions {
                        total: self.question_count,
                    });
                }
                (S::QuestionCountdown, Some(next_index))
            }
            (S::QuestionClose, E::ShowFinalResults) => {
                if !self.on_last_question() {
                    return Err(PlanError::QuestionsRemaining {
                        index: index.unwrap_or_default(),
                        total: self.question_count,
                    });
                }
                (S::FinalResults, index)
            }
            (from, E::End) if from != S::End => (S::End, index),
            (from, event) => {
                return Err(PlanError::InvalidTransition(InvalidTransition { from, event }));
            }
        };

        Ok(next)
    }
}

impl From<SessionState> for SessionStateEntity {
    fn from(value: SessionState) -> Self {
        match value {
            SessionState::Lobby => SessionStateEntity::Lobby,
            SessionState::QuestionCountdown => SessionStateEntity::QuestionCountdown,
            SessionState::QuestionOpen => SessionStateEntity::QuestionOpen,
            SessionState::QuestionClose => SessionStateEntity::QuestionClose,
            SessionState::FinalResults => SessionStateEntity::FinalResults,
            SessionState::End => SessionStateEntity::End,
        }
    }
}
