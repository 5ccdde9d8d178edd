use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        player::{
            JoinSessionRequest, PlayerJoined, PlayerQuestionView, PlayerStatus,
            SubmitAnswerRequest,
        },
        results::{FinalResultsView, QuestionResultView},
    },
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Player endpoints; players are identified by the id they received when joining.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/players", post(join_session))
        .route("/players/{player_id}", get(player_status))
        .route(
            "/players/{player_id}/questions/{position}",
            get(player_question),
        )
        .route(
            "/players/{player_id}/questions/{position}/answer",
            put(submit_answer),
        )
        .route(
            "/players/{player_id}/questions/{position}/results",
            get(player_question_result),
        )
        .route("/players/{player_id}/results", get(player_final_results))
}

/// Join a session lobby.
#[utoipa::path(
    post,
    path = "/sessions/{id}/players",
    tag = "players",
    params(("id" = Uuid, Path, description = "Session to join")),
    request_body = JoinSessionRequest,
    responses((status = 200, description = "Player joined", body = PlayerJoined))
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<Json<PlayerJoined>, AppError> {
    payload.validate()?;
    Ok(Json(player_service::join(&state, id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/players/{player_id}",
    tag = "players",
    params(("player_id" = Uuid, Path, description = "Player identifier")),
    responses((status = 200, description = "Session status seen by the player", body = PlayerStatus))
)]
pub async fn player_status(
    State(state): State<SharedState>,
    Path(player_id): Path<Uuid>,
) -> Result<Json<PlayerStatus>, AppError> {
    Ok(Json(player_service::player_status(&state, player_id).await?))
}

#[utoipa::path(
    get,
    path = "/players/{player_id}/questions/{position}",
    tag = "players",
    params(("player_id" = Uuid, Path, description = "Player identifier"),
    ("position" = usize, Path, description = "1-based question position")),
    responses((status = 200, description = "Current question", body = PlayerQuestionView))
)]
pub async fn player_question(
    State(state): State<SharedState>,
    Path((player_id, position)): Path<(Uuid, usize)>,
) -> Result<Json<PlayerQuestionView>, AppError> {
    Ok(Json(
        player_service::player_question(&state, player_id, position).await?,
    ))
}

/// Submit or replace the player's answer to the open question.
#[utoipa::path(
    put,
    path = "/players/{player_id}/questions/{position}/answer",
    tag = "players",
    params(("player_id" = Uuid, Path, description = "Player identifier"),
    ("position" = usize, Path, description = "1-based question position")),
    request_body = SubmitAnswerRequest,
    responses((status = 204, description = "Answer recorded"))
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path((player_id, position)): Path<(Uuid, usize)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    player_service::submit_answer(&state, player_id, position, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/players/{player_id}/questions/{position}/results",
    tag = "players",
    params(("player_id" = Uuid, Path, description = "Player identifier"),
    ("position" = usize, Path, description = "1-based question position")),
    responses((status = 200, description = "Result of the closed question", body = QuestionResultView))
)]
pub async fn player_question_result(
    State(state): State<SharedState>,
    Path((player_id, position)): Path<(Uuid, usize)>,
) -> Result<Json<QuestionResultView>, AppError> {
    Ok(Json(
        player_service::player_question_result(&state, player_id, position).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/players/{player_id}/results",
    tag = "players",
    params(("player_id" = Uuid, Path, description = "Player identifier")),
    responses((status = 200, description = "Final standings", body = FinalResultsView))
)]
pub async fn player_final_results(
    State(state): State<SharedState>,
    Path(player_id): Path<Uuid>,
) -> Result<Json<FinalResultsView>, AppError> {
    Ok(Json(
        player_service::player_final_results(&state, player_id).await?,
    ))
}
