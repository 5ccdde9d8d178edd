//! Player-facing operations: joining, answering and following the session.

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        player::{
            JoinSessionRequest, PlayerJoined, PlayerQuestionView, PlayerStatus,
            SubmitAnswerRequest,
        },
        results::{FinalResultsView, QuestionResultView},
    },
    error::ServiceError,
    services::{
        session_events::broadcast_player_joined,
        session_service::{apply_event, final_results_view},
    },
    state::{
        SessionRuntime, SharedState,
        game::{QuestionSnapshot, RosterError},
        state_machine::{SessionEvent, SessionState},
    },
};

/// Add a player to a session lobby, starting the session when the auto-start threshold is met.
pub async fn join(
    state: &SharedState,
    session_id: Uuid,
    request: JoinSessionRequest,
) -> Result<PlayerJoined, ServiceError> {
    let mut runtime = state.lock_session(session_id).await?;

    if runtime.state() != SessionState::Lobby {
        return Err(ServiceError::InvalidState(format!(
            "players can only join while the session is in LOBBY (session is {:?})",
            runtime.state()
        )));
    }

    let player = runtime
        .session
        .add_player(&request.name)
        .map_err(|err| match err {
            RosterError::DuplicateName(name) => {
                ServiceError::InvalidInput(format!("name `{name}` is already taken"))
            }
        })?;
    state.register_player(player.id, session_id);

    if let Err(err) = state.persist(&runtime).await {
        runtime.session.remove_player(player.id);
        state.unregister_player(player.id);
        warn!(%session_id, player_id = %player.id, error = %err, "join rolled back");
        return Err(err);
    }
    info!(%session_id, player_id = %player.id, name = %player.name, "player joined");
    broadcast_player_joined(state, &runtime, &player);

    if runtime.session.auto_start_reached() {
        info!(
            %session_id,
            players = runtime.session.players.len(),
            "auto start threshold reached"
        );
        // The join is already saved; a failed start is reported without undoing it.
        if let Err(err) = apply_event(state, &mut runtime, SessionEvent::Start).await {
            warn!(%session_id, error = %err, "auto start failed");
        }
    }

    Ok(PlayerJoined {
        player_id: player.id,
        name: player.name,
    })
}

/// Record the player's answer to the question at 1-based `position`.
///
/// A later submission for the same question replaces the earlier one.
pub async fn submit_answer(
    state: &SharedState,
    player_id: Uuid,
    position: usize,
    request: SubmitAnswerRequest,
) -> Result<(), ServiceError> {
    let mut runtime = state.lock_player_session(player_id).await?;
    // Stamped under the lock so a submission never predates the opening of its question.
    let submitted_at = Instant::now();
    ensure_player(&runtime, player_id)?;

    if runtime.state() != SessionState::QuestionOpen {
        return Err(ServiceError::InvalidSubmission(format!(
            "answers are only accepted while a question is open (session is {:?})",
            runtime.state()
        )));
    }

    let index = current_index(&runtime, position)
        .map_err(ServiceError::InvalidSubmission)?;
    let SessionRuntime {
        session, collector, ..
    } = &mut *runtime;
    let question = session.question(index).ok_or_else(|| {
        ServiceError::InvalidSubmission(format!("question {position} does not exist"))
    })?;
    collector.submit(player_id, question, request.answer_ids, submitted_at)?;

    debug!(session_id = %session.id, %player_id, position, "answer recorded");
    Ok(())
}

/// Where the player's session stands.
pub async fn player_status(
    state: &SharedState,
    player_id: Uuid,
) -> Result<PlayerStatus, ServiceError> {
    let runtime = state.lock_player_session(player_id).await?;
    ensure_player(&runtime, player_id)?;

    Ok(PlayerStatus {
        state: runtime.state().into(),
        num_questions: runtime.session.questions.len(),
        at_question: runtime.machine.question_index().map_or(0, |index| index + 1),
    })
}

/// Current question as the player sees it, without correctness flags.
pub async fn player_question(
    state: &SharedState,
    player_id: Uuid,
    position: usize,
) -> Result<PlayerQuestionView, ServiceError> {
    let runtime = state.lock_player_session(player_id).await?;
    ensure_player(&runtime, player_id)?;

    if matches!(
        runtime.state(),
        SessionState::Lobby | SessionState::End | SessionState::FinalResults
    ) {
        return Err(ServiceError::InvalidState(format!(
            "no question is shown while the session is {:?}",
            runtime.state()
        )));
    }

    let question = positioned_question(&runtime, position)?;
    Ok(PlayerQuestionView::from(question))
}

/// Result of the question at `position`, once it has closed.
pub async fn player_question_result(
    state: &SharedState,
    player_id: Uuid,
    position: usize,
) -> Result<QuestionResultView, ServiceError> {
    let runtime = state.lock_player_session(player_id).await?;
    ensure_player(&runtime, player_id)?;

    if runtime.state() != SessionState::QuestionClose {
        return Err(ServiceError::InvalidState(format!(
            "question results are only shown in QUESTION_CLOSE (session is {:?})",
            runtime.state()
        )));
    }

    let question = positioned_question(&runtime, position)?;
    let result = runtime.session.result_for(question.id).ok_or_else(|| {
        ServiceError::InvalidState(format!("question {position} has no result yet"))
    })?;
    Ok(QuestionResultView::new(result, &runtime.session.players))
}

/// Final standings of the player's session.
pub async fn player_final_results(
    state: &SharedState,
    player_id: Uuid,
) -> Result<FinalResultsView, ServiceError> {
    let runtime = state.lock_player_session(player_id).await?;
    ensure_player(&runtime, player_id)?;
    final_results_view(&runtime)
}

fn ensure_player(runtime: &SessionRuntime, player_id: Uuid) -> Result<(), ServiceError> {
    if !runtime.session.players.contains_key(&player_id) {
        return Err(ServiceError::NotFound(format!(
            "player `{player_id}` is not part of session `{}`",
            runtime.session.id
        )));
    }
    Ok(())
}

/// Zero-based index for `position` if the session is currently on that question.
fn current_index(runtime: &SessionRuntime, position: usize) -> Result<usize, String> {
    let count = runtime.session.questions.len();
    if position == 0 || position > count {
        return Err(format!(
            "question position {position} is outside 1..={count}"
        ));
    }

    let index = position - 1;
    if runtime.machine.question_index() != Some(index) {
        return Err(format!("session is not on question {position}"));
    }
    Ok(index)
}

fn positioned_question(
    runtime: &SessionRuntime,
    position: usize,
) -> Result<&QuestionSnapshot, ServiceError> {
    let index = current_index(runtime, position).map_err(ServiceError::InvalidState)?;
    runtime
        .session
        .question(index)
        .ok_or_else(|| ServiceError::NotFound(format!("question {position} does not exist")))
}
