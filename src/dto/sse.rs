use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{phase::VisibleSessionState, player::PlayerSummary};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels, tagged with the session it belongs to.
pub struct ServerEvent {
    pub session_id: Uuid,
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    pub fn new(session_id: Uuid, event: Option<String>, data: String) -> Self {
        Self {
            session_id,
            event,
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(session_id: Uuid, event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            session_id,
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    pub session_id: Uuid,
    /// Session state at subscription time.
    pub state: VisibleSessionState,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the session moves to another state.
pub struct StateChangedEvent {
    pub session_id: Uuid,
    pub state: VisibleSessionState,
    /// 1-based position of the current question, 0 before the first one.
    pub at_question: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player joins the lobby.
pub struct PlayerJoinedEvent {
    pub player: PlayerSummary,
    pub player_count: usize,
}
