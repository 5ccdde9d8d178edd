use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        results::FinalResultsView,
        session::{CreateSessionRequest, SessionCreated, SessionList, SessionView},
    },
    error::AppError,
    routes::{Caller, require_caller},
    services::session_service,
    state::SharedState,
};

/// Host endpoints for creating and driving sessions, plus the global reset.
pub fn router() -> Router<SharedState> {
    let host = Router::new()
        .route(
            "/quizzes/{quiz_id}/sessions",
            get(list_sessions).post(create_session),
        )
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/next", post(next_question))
        .route("/sessions/{id}/close", post(close_question))
        .route(
            "/sessions/{id}/final-results",
            get(final_results).post(show_final_results),
        )
        .route("/sessions/{id}/end", post(end_session))
        .route_layer(middleware::from_fn(require_caller));

    host.route("/clear", delete(clear))
}

/// Open a new session of a quiz owned by the caller.
#[utoipa::path(
    post,
    path = "/quizzes/{quiz_id}/sessions",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("quiz_id" = Uuid, Path, description = "Quiz to run")),
    request_body = CreateSessionRequest,
    responses((status = 200, description = "Session created in LOBBY", body = SessionCreated))
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionCreated>, AppError> {
    payload.validate()?;
    Ok(Json(
        session_service::create_session(&state, caller, quiz_id, payload).await?,
    ))
}

/// List the active and ended sessions of a quiz.
#[utoipa::path(
    get,
    path = "/quizzes/{quiz_id}/sessions",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("quiz_id" = Uuid, Path, description = "Quiz whose sessions are listed")),
    responses((status = 200, description = "Sessions of the quiz", body = SessionList))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<SessionList>, AppError> {
    Ok(Json(
        session_service::list_sessions(&state, caller, quiz_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Current session view", body = SessionView))
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        session_service::host_session_view(&state, id, caller).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Countdown to the first question started", body = SessionView))
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::start(&state, id, caller).await?))
}

/// Advance from a closed question to the next one, or to final results after the last.
#[utoipa::path(
    post,
    path = "/sessions/{id}/next",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Session advanced", body = SessionView))
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        session_service::advance_to_next_question(&state, id, caller).await?,
    ))
}

/// Close the open question early.
#[utoipa::path(
    post,
    path = "/sessions/{id}/close",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Question closed and scored", body = SessionView))
)]
pub async fn close_question(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        session_service::force_close_question(&state, id, caller).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/final-results",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Final results shown", body = SessionView))
)]
pub async fn show_final_results(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        session_service::show_final_results(&state, id, caller).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/final-results",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Final standings", body = FinalResultsView))
)]
pub async fn final_results(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinalResultsView>, AppError> {
    Ok(Json(
        session_service::final_results_for_host(&state, id, caller).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    tag = "sessions",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
    ("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Session ended", body = SessionView))
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::end(&state, id, caller).await?))
}

/// Drop every session and empty the store.
#[utoipa::path(
    delete,
    path = "/clear",
    tag = "sessions",
    responses((status = 204, description = "Everything cleared"))
)]
pub async fn clear(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    session_service::clear(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}
