use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        phase::VisibleSessionState,
        player::PlayerSummary,
        results::{FinalResultsView, QuestionResultView},
    },
    state::SessionRuntime,
};

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
/// Payload used by a quiz owner to open a new session.
pub struct CreateSessionRequest {
    /// Player count that starts the session automatically; 0 disables auto start.
    #[serde(default)]
    pub auto_start_num: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sessions of a quiz split by whether they have ended.
pub struct SessionList {
    pub active_sessions: Vec<Uuid>,
    pub inactive_sessions: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Host view of a session.
pub struct SessionView {
    pub session_id: Uuid,
    pub quiz_id: Uuid,
    pub state: VisibleSessionState,
    /// 1-based position of the current question, 0 before the first one.
    pub at_question: usize,
    pub num_questions: usize,
    pub auto_start_num: u32,
    pub players: Vec<PlayerSummary>,
    pub created_at: String,
    pub updated_at: String,
    /// Result of the current question once it has closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_result: Option<QuestionResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_results: Option<FinalResultsView>,
}

impl From<&SessionRuntime> for SessionView {
    fn from(runtime: &SessionRuntime) -> Self {
        let session = &runtime.session;
        let latest_result = runtime
            .current_question()
            .and_then(|question| session.result_for(question.id))
            .map(|result| QuestionResultView::new(result, &session.players));

        Self {
            session_id: session.id,
            quiz_id: session.quiz_id,
            state: runtime.state().into(),
            at_question: runtime.machine.question_index().map_or(0, |index| index + 1),
            num_questions: session.questions.len(),
            auto_start_num: session.auto_start_num,
            players: session.players.values().map(Into::into).collect(),
            created_at: format_system_time(session.created_at),
            updated_at: format_system_time(session.updated_at),
            latest_result,
            final_results: session
                .final_results
                .as_ref()
                .map(|results| FinalResultsView::new(results, &session.players)),
        }
    }
}
