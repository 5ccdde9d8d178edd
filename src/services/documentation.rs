use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz session backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::session_stream,
        crate::routes::session::create_session,
        crate::routes::session::list_sessions,
        crate::routes::session::get_session,
        crate::routes::session::start_session,
        crate::routes::session::next_question,
        crate::routes::session::close_question,
        crate::routes::session::show_final_results,
        crate::routes::session::end_session,
        crate::routes::session::final_results,
        crate::routes::session::clear,
        crate::routes::player::join_session,
        crate::routes::player::player_status,
        crate::routes::player::player_question,
        crate::routes::player::submit_answer,
        crate::routes::player::player_question_result,
        crate::routes::player::player_final_results,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::phase::VisibleSessionState,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionCreated,
            crate::dto::session::SessionList,
            crate::dto::session::SessionView,
            crate::dto::player::JoinSessionRequest,
            crate::dto::player::PlayerJoined,
            crate::dto::player::SubmitAnswerRequest,
            crate::dto::player::PlayerSummary,
            crate::dto::player::PlayerStatus,
            crate::dto::player::PlayerQuestionView,
            crate::dto::player::PlayerAnswerView,
            crate::dto::results::QuestionResultView,
            crate::dto::results::PlayerOutcomeView,
            crate::dto::results::FinalResultsView,
            crate::dto::results::StandingView,
            crate::dto::sse::Handshake,
            crate::dto::sse::StateChangedEvent,
            crate::dto::sse::PlayerJoinedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "sessions", description = "Host operations on quiz sessions"),
        (name = "players", description = "Player operations"),
    )
)]
pub struct ApiDoc;
