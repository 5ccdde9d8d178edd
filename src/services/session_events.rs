use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        results::{FinalResultsView, QuestionResultView},
        sse::{PlayerJoinedEvent, ServerEvent, StateChangedEvent},
    },
    state::{
        SessionRuntime, SharedState,
        game::Player,
        results::{FinalResults, QuestionResult},
    },
};

const EVENT_STATE_CHANGED: &str = "session.state";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_QUESTION_RESULT: &str = "question.result";
const EVENT_FINAL_RESULTS: &str = "session.final_results";

/// Broadcast the state the session has just entered.
pub fn broadcast_state_changed(state: &SharedState, runtime: &SessionRuntime) {
    let payload = StateChangedEvent {
        session_id: runtime.session.id,
        state: runtime.state().into(),
        at_question: runtime.machine.question_index().map_or(0, |index| index + 1),
    };
    send_session_event(state, runtime.session.id, EVENT_STATE_CHANGED, &payload);
}

/// Broadcast a lobby arrival.
pub fn broadcast_player_joined(state: &SharedState, runtime: &SessionRuntime, player: &Player) {
    let payload = PlayerJoinedEvent {
        player: player.into(),
        player_count: runtime.session.players.len(),
    };
    send_session_event(state, runtime.session.id, EVENT_PLAYER_JOINED, &payload);
}

pub fn broadcast_question_result(
    state: &SharedState,
    runtime: &SessionRuntime,
    result: &QuestionResult,
) {
    let payload = QuestionResultView::new(result, &runtime.session.players);
    send_session_event(state, runtime.session.id, EVENT_QUESTION_RESULT, &payload);
}

pub fn broadcast_final_results(state: &SharedState, runtime: &SessionRuntime, results: &FinalResults) {
    let payload = FinalResultsView::new(results, &runtime.session.players);
    send_session_event(state, runtime.session.id, EVENT_FINAL_RESULTS, &payload);
}

fn send_session_event(state: &SharedState, session_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(session_id, Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(%session_id, event, error = %err, "failed to serialize session SSE payload"),
    }
}
