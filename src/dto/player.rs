use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::phase::VisibleSessionState,
    state::game::{Player, QuestionSnapshot},
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
/// Payload used by a player to join a session lobby.
pub struct JoinSessionRequest {
    /// Display name; leave blank to get a generated one.
    #[serde(default)]
    #[validate(custom(function = "crate::dto::validation::validate_player_name"))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Identifier handed back to a player after joining.
pub struct PlayerJoined {
    pub player_id: Uuid,
    /// Final display name, generated when the request left it blank.
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
/// Answers selected by a player for the open question.
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1))]
    pub answer_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Player entry of a session roster.
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub name: String,
    pub score: f64,
}

impl From<&Player> for PlayerSummary {
    fn from(value: &Player) -> Self {
        Self {
            player_id: value.id,
            name: value.name.clone(),
            score: value.score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Where the player's session currently is.
pub struct PlayerStatus {
    pub state: VisibleSessionState,
    pub num_questions: usize,
    /// 1-based position of the current question, 0 before the first one.
    pub at_question: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Answer option as shown to players, without its correctness flag.
pub struct PlayerAnswerView {
    pub answer_id: u32,
    pub answer: String,
    pub colour: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Question as shown to players.
pub struct PlayerQuestionView {
    pub question_id: Uuid,
    pub question: String,
    pub duration_secs: u64,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub answers: Vec<PlayerAnswerView>,
}

impl From<&QuestionSnapshot> for PlayerQuestionView {
    fn from(value: &QuestionSnapshot) -> Self {
        Self {
            question_id: value.id,
            question: value.prompt.clone(),
            duration_secs: value.duration.as_secs(),
            points: value.points,
            thumbnail_url: value.thumbnail_url.clone(),
            answers: value
                .answers
                .iter()
                .map(|answer| PlayerAnswerView {
                    answer_id: answer.id,
                    answer: answer.text.clone(),
                    colour: answer.colour.clone(),
                })
                .collect(),
        }
    }
}
