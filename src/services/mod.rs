use std::sync::Arc;

use crate::{config::AppConfig, dao::quiz_store::QuizStore, state::{AppState, SharedState}};

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player join, answers and player views.
pub mod player_service;
/// Server-Sent Events message generation.
pub mod session_events;
/// Session lifecycle orchestration and timer handling.
pub mod session_service;
/// Server-Sent Events streaming service.
pub mod sse_service;

/// Build the shared state and start the timer dispatcher on the current runtime.
pub fn launch(config: AppConfig, store: Arc<dyn QuizStore>) -> SharedState {
    let (state, fired_rx) = AppState::new(config, store);
    tokio::spawn(session_service::run_timer_dispatcher(
        Arc::downgrade(&state),
        fired_rx,
    ));
    state
}
