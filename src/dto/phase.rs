use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SessionState;

/// Session state exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibleSessionState {
    /// Waiting for players.
    Lobby,
    /// A question was selected and opens after the countdown.
    QuestionCountdown,
    /// Players may answer.
    QuestionOpen,
    /// Answers are closed and the question result is available.
    QuestionClose,
    /// Final standings are shown.
    FinalResults,
    /// Session is over.
    End,
}

impl From<SessionState> for VisibleSessionState {
    fn from(value: SessionState) -> Self {
        match value {
            SessionState::Lobby => VisibleSessionState::Lobby,
            SessionState::QuestionCountdown => VisibleSessionState::QuestionCountdown,
            SessionState::QuestionOpen => VisibleSessionState::QuestionOpen,
            SessionState::QuestionClose => VisibleSessionState::QuestionClose,
            SessionState::FinalResults => VisibleSessionState::FinalResults,
            SessionState::End => VisibleSessionState::End,
        }
    }
}
