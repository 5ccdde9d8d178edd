//! Session orchestration: host operations and timer-driven transitions.
//!
//! Every operation takes the session lock first, so host actions and timer
//! fires of one session are applied one at a time.

use std::sync::Weak;

use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::SessionStateEntity,
    dto::{
        results::FinalResultsView,
        session::{CreateSessionRequest, SessionCreated, SessionList, SessionView},
    },
    error::ServiceError,
    services::session_events::{broadcast_final_results, broadcast_question_result},
    state::{
        AppState, Plan, SessionRuntime, SharedState,
        game::{GameSession, QuestionSnapshot},
        results::{aggregate, final_results},
        state_machine::{SessionEvent, SessionState},
        timers::{TimerFired, TimerKind},
        transitions::run_transition,
    },
};

/// Open a new session of `quiz_id` in LOBBY.
pub async fn create_session(
    state: &SharedState,
    caller: Uuid,
    quiz_id: Uuid,
    request: CreateSessionRequest,
) -> Result<SessionCreated, ServiceError> {
    let config = state.config();
    let quiz = state
        .store()
        .find_quiz(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))?;

    if quiz.owner_id != caller {
        return Err(ServiceError::Unauthorised(format!(
            "user `{caller}` does not own quiz `{quiz_id}`"
        )));
    }

    if request.auto_start_num > config.max_auto_start_num() {
        return Err(ServiceError::InvalidInput(format!(
            "auto start number must be at most {}",
            config.max_auto_start_num()
        )));
    }

    if quiz.questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a session needs a quiz with at least one question".into(),
        ));
    }

    let creation_lock = state.creation_lock(quiz_id);
    let _creating = creation_lock.lock().await;
    let active = count_active_sessions(state, quiz_id).await;
    if active >= config.max_active_sessions_per_quiz() {
        return Err(ServiceError::InvalidInput(format!(
            "quiz `{quiz_id}` already has {active} active sessions"
        )));
    }

    let runtime = SessionRuntime::new(GameSession::from_quiz(&quiz, request.auto_start_num));
    let session_id = runtime.session.id;
    state.persist(&runtime).await?;
    state.insert_session(runtime);

    info!(
        %session_id,
        %quiz_id,
        auto_start_num = request.auto_start_num,
        "session created"
    );
    Ok(SessionCreated { session_id })
}

/// Leave the lobby and count down to the first question.
pub async fn start(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    host_action(state, session_id, caller, |_| SessionEvent::Start).await
}

/// Move on from a closed question: next countdown, or final results after the last one.
pub async fn advance_to_next_question(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    host_action(state, session_id, caller, |runtime| {
        if runtime.state() == SessionState::QuestionClose && runtime.machine.on_last_question() {
            SessionEvent::ShowFinalResults
        } else {
            SessionEvent::NextQuestion
        }
    })
    .await
}

/// Close the open question before its duration elapses.
pub async fn force_close_question(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    host_action(state, session_id, caller, |_| SessionEvent::GoToAnswer).await
}

/// Show final standings once the last question has closed.
pub async fn show_final_results(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    host_action(state, session_id, caller, |_| SessionEvent::ShowFinalResults).await
}

/// End the session from any state but END.
pub async fn end(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    host_action(state, session_id, caller, |_| SessionEvent::End).await
}

/// Read-only snapshot of a session.
pub async fn get_session_view(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionView, ServiceError> {
    let runtime = state.lock_session(session_id).await?;
    Ok(SessionView::from(&*runtime))
}

/// Session view restricted to the session owner.
pub async fn host_session_view(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<SessionView, ServiceError> {
    let runtime = state.lock_session(session_id).await?;
    ensure_owner(&runtime, caller)?;
    Ok(SessionView::from(&*runtime))
}

/// Final standings, available while the session shows them.
pub async fn final_results_for_host(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
) -> Result<FinalResultsView, ServiceError> {
    let runtime = state.lock_session(session_id).await?;
    ensure_owner(&runtime, caller)?;
    final_results_view(&runtime)
}

pub(crate) fn final_results_view(runtime: &SessionRuntime) -> Result<FinalResultsView, ServiceError> {
    if runtime.state() != SessionState::FinalResults {
        return Err(ServiceError::InvalidState(format!(
            "final results are only shown in FINAL_RESULTS (session is {:?})",
            runtime.state()
        )));
    }

    let results = runtime.session.final_results.as_ref().ok_or_else(|| {
        ServiceError::InvalidState("final results have not been computed".into())
    })?;
    Ok(FinalResultsView::new(results, &runtime.session.players))
}

/// Sessions of a quiz, split into active and ended ones.
pub async fn list_sessions(
    state: &SharedState,
    caller: Uuid,
    quiz_id: Uuid,
) -> Result<SessionList, ServiceError> {
    let quiz = state
        .store()
        .find_quiz(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))?;
    if quiz.owner_id != caller {
        return Err(ServiceError::Unauthorised(format!(
            "user `{caller}` does not own quiz `{quiz_id}`"
        )));
    }

    let mut active_sessions = Vec::new();
    let mut inactive_sessions = Vec::new();
    for handle in state.session_handles() {
        let runtime = handle.lock().await;
        if runtime.discarded || runtime.session.quiz_id != quiz_id {
            continue;
        }
        if runtime.state() == SessionState::End {
            inactive_sessions.push(runtime.session.id);
        } else {
            active_sessions.push(runtime.session.id);
        }
    }
    active_sessions.sort();
    inactive_sessions.sort();

    Ok(SessionList {
        active_sessions,
        inactive_sessions,
    })
}

/// Drop every session, cancel every timer and empty the store.
///
/// Each session is marked discarded under its lock first, so work already
/// running finishes its write before the store is emptied and work still
/// waiting on the lock gives up.
pub async fn clear(state: &SharedState) -> Result<(), ServiceError> {
    let handles = state.session_handles();
    for handle in &handles {
        handle.lock().await.discarded = true;
    }
    state.timers().cancel_all();
    state.clear_sessions();
    state.store().clear().await?;
    info!(sessions = handles.len(), "all sessions cleared");
    Ok(())
}

/// Load the sessions kept by the store back into memory.
///
/// Timers do not survive a restart, so sessions that were still running come
/// back ended and are saved again in that state.
pub async fn restore_sessions(state: &SharedState) -> Result<usize, ServiceError> {
    let entities = state.store().list_sessions().await?;
    let count = entities.len();

    for entity in entities {
        let session_id = entity.id;
        let was_running = entity.state != SessionStateEntity::End;
        let runtime = SessionRuntime::restored(entity);
        for player_id in runtime.session.players.keys() {
            state.register_player(*player_id, session_id);
        }
        if was_running {
            warn!(%session_id, "session was still running at shutdown; restoring it ended");
            state.persist(&runtime).await?;
        }
        state.insert_session(runtime);
    }

    info!(sessions = count, "sessions restored from store");
    Ok(count)
}

/// Forward timer notifications to [`handle_timer_fired`] until the state is dropped.
pub async fn run_timer_dispatcher(
    state: Weak<AppState>,
    mut fired_rx: mpsc::UnboundedReceiver<TimerFired>,
) {
    while let Some(fired) = fired_rx.recv().await {
        let Some(state) = state.upgrade() else {
            break;
        };
        tokio::spawn(async move {
            handle_timer_fired(&state, fired).await;
        });
    }
    debug!("timer dispatcher stopped");
}

/// Apply the transition of an elapsed timer, unless the timer went stale meanwhile.
pub async fn handle_timer_fired(state: &SharedState, fired: TimerFired) {
    let session_id = fired.session_id;
    let Ok(handle) = state.session(session_id) else {
        warn!(%session_id, kind = ?fired.kind, "timer fired for an unknown session");
        return;
    };

    let mut runtime = handle.lock().await;
    if runtime.discarded {
        debug!(%session_id, kind = ?fired.kind, "ignoring timer of a cleared session");
        return;
    }
    if !state.timers().claim(&fired) {
        debug!(%session_id, kind = ?fired.kind, "ignoring stale timer");
        return;
    }

    if runtime.state() == SessionState::End {
        warn!(
            %session_id,
            kind = ?fired.kind,
            "timer fired for an ended session; it should have been cancelled"
        );
        return;
    }

    let event = match fired.kind {
        TimerKind::Countdown => SessionEvent::CountdownElapsed,
        TimerKind::QuestionDuration => SessionEvent::QuestionElapsed,
    };
    if let Err(err) = apply_event(state, &mut runtime, event).await {
        warn!(%session_id, ?event, error = %err, "timer transition failed");
    }
}

async fn host_action<F>(
    state: &SharedState,
    session_id: Uuid,
    caller: Uuid,
    choose: F,
) -> Result<SessionView, ServiceError>
where
    F: FnOnce(&SessionRuntime) -> SessionEvent,
{
    let mut runtime = state.lock_session(session_id).await?;
    ensure_owner(&runtime, caller)?;

    let event = choose(&runtime);
    info!(%session_id, ?event, from = ?runtime.state(), "host action");
    apply_event(state, &mut runtime, event).await?;
    Ok(SessionView::from(&*runtime))
}

/// Apply `event` together with its side effects: timers, answer collection and scoring.
pub(crate) async fn apply_event(
    state: &SharedState,
    runtime: &mut SessionRuntime,
    event: SessionEvent,
) -> Result<SessionState, ServiceError> {
    let session_id = runtime.session.id;
    let timers = state.timers();

    let next = match event {
        SessionEvent::Start | SessionEvent::NextQuestion => {
            let countdown = state.config().countdown();
            let (_, next) = run_transition(state, runtime, event, |_, _| {
                timers.arm(session_id, countdown, TimerKind::Countdown);
                Ok(())
            })
            .await?;
            next
        }
        SessionEvent::CountdownElapsed => {
            let (_, next) = run_transition(state, runtime, event, |runtime, plan| {
                let question = planned_question(runtime, plan)?;
                let (question_id, duration) = (question.id, question.duration);
                runtime.collector.open(question_id, Instant::now());
                timers.arm(session_id, duration, TimerKind::QuestionDuration);
                Ok(())
            })
            .await?;
            next
        }
        SessionEvent::QuestionElapsed | SessionEvent::GoToAnswer => {
            let scaling = state.config().score_scaling();
            let (result, next) = run_transition(state, runtime, event, |runtime, plan| {
                let question = planned_question(runtime, plan)?.clone();
                let frozen = runtime.collector.close(question.id)?;
                timers.cancel(session_id);

                let roster: Vec<Uuid> = runtime.session.players.keys().copied().collect();
                let result = aggregate(&question, frozen, &roster, scaling);
                for outcome in &result.outcomes {
                    if let Some(player) = runtime.session.players.get_mut(&outcome.player_id) {
                        player.score += outcome.points;
                    }
                }
                runtime.session.results.push(result.clone());
                Ok(result)
            })
            .await?;

            info!(
                %session_id,
                question_id = %result.question_id,
                percent_correct = result.percent_correct,
                "question closed"
            );
            broadcast_question_result(state, runtime, &result);
            next
        }
        SessionEvent::ShowFinalResults => {
            let (results, next) = run_transition(state, runtime, event, |runtime, _| {
                timers.cancel(session_id);
                let results = final_results(&runtime.session.players, &runtime.session.results);
                runtime.session.final_results = Some(results.clone());
                Ok(results)
            })
            .await?;
            broadcast_final_results(state, runtime, &results);
            next
        }
        SessionEvent::End => {
            let (_, next) = run_transition(state, runtime, event, |runtime, _| {
                timers.cancel(session_id);
                runtime.collector.discard();
                if runtime.session.final_results.is_none() {
                    runtime.session.final_results = Some(final_results(
                        &runtime.session.players,
                        &runtime.session.results,
                    ));
                }
                Ok(())
            })
            .await?;
            info!(%session_id, "session ended");
            next
        }
    };

    Ok(next)
}

fn planned_question<'a>(
    runtime: &'a SessionRuntime,
    plan: &Plan,
) -> Result<&'a QuestionSnapshot, ServiceError> {
    plan.question_index
        .and_then(|index| runtime.session.question(index))
        .ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "session has no question at index {:?}",
                plan.question_index
            ))
        })
}

fn ensure_owner(runtime: &SessionRuntime, caller: Uuid) -> Result<(), ServiceError> {
    if runtime.session.owner_id != caller {
        return Err(ServiceError::Unauthorised(format!(
            "user `{caller}` does not own session `{}`",
            runtime.session.id
        )));
    }
    Ok(())
}

async fn count_active_sessions(state: &SharedState, quiz_id: Uuid) -> usize {
    let mut active = 0;
    for handle in state.session_handles() {
        let runtime = handle.lock().await;
        if !runtime.discarded
            && runtime.session.quiz_id == quiz_id
            && runtime.state() != SessionState::End
        {
            active += 1;
        }
    }
    active
}
