use std::time::SystemTime;

use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    services::session_events::broadcast_state_changed,
    state::{
        SessionRuntime, SharedState,
        state_machine::{Plan, SessionEvent, SessionState},
    },
};

/// Plan `event`, run `work` against the session, then apply, persist and broadcast.
///
/// When `work` fails the plan is aborted and the session keeps its state.
pub async fn run_transition<F, T>(
    state: &SharedState,
    runtime: &mut SessionRuntime,
    event: SessionEvent,
    work: F,
) -> Result<(T, SessionState), ServiceError>
where
    F: FnOnce(&mut SessionRuntime, &Plan) -> Result<T, ServiceError>,
{
    let plan = runtime.machine.plan(event)?;
    let session_id = runtime.session.id;

    match work(runtime, &plan) {
        Ok(value) => {
            let next = runtime.machine.apply(plan.id)?;
            runtime.session.updated_at = SystemTime::now();
            debug!(
                %session_id,
                from = ?plan.from,
                to = ?next,
                question_index = ?plan.question_index,
                pending_ms = plan.pending_since.elapsed().as_millis() as u64,
                "session transition applied"
            );
            state.persist(runtime).await?;
            broadcast_state_changed(state, runtime);
            Ok((value, next))
        }
        Err(err) => {
            if let Err(abort_err) = runtime.machine.abort(plan.id) {
                warn!(
                    %session_id,
                    event = ?event,
                    plan_id = %plan.id,
                    error = ?abort_err,
                    machine = ?runtime.machine.snapshot(),
                    "failed to abort transition after work error"
                );
            }
            Err(err)
        }
    }
}
