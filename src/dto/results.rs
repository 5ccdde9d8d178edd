use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::Player,
    results::{FinalResults, PlayerOutcome, QuestionResult, Standing},
};

/// One player's line of a question result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerOutcomeView {
    pub player_id: Uuid,
    pub name: String,
    pub correct: bool,
    /// Milliseconds between the question opening and the last submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub points: f64,
}

/// Result of a closed question.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionResultView {
    pub question_id: Uuid,
    /// Names of the players who answered correctly, fastest first.
    pub players_correct: Vec<String>,
    /// Fraction of players who answered correctly, in `[0, 1]`.
    pub percent_correct: f64,
    pub average_answer_time_ms: f64,
    pub outcomes: Vec<PlayerOutcomeView>,
}

impl QuestionResultView {
    /// Resolve player names against the session roster.
    pub fn new(result: &QuestionResult, players: &IndexMap<Uuid, Player>) -> Self {
        let name_of = |id: Uuid| {
            players
                .get(&id)
                .map(|player| player.name.clone())
                .unwrap_or_default()
        };

        Self {
            question_id: result.question_id,
            players_correct: result.players_correct().into_iter().map(name_of).collect(),
            percent_correct: result.percent_correct,
            average_answer_time_ms: result.average_answer_time_ms,
            outcomes: result
                .outcomes
                .iter()
                .map(|outcome| PlayerOutcomeView::new(outcome, name_of(outcome.player_id)))
                .collect(),
        }
    }
}

impl PlayerOutcomeView {
    fn new(outcome: &PlayerOutcome, name: String) -> Self {
        Self {
            player_id: outcome.player_id,
            name,
            correct: outcome.correct,
            answer_time_ms: outcome.answer_time_ms,
            rank: outcome.rank,
            points: outcome.points,
        }
    }
}

/// Player line of the final standings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StandingView {
    pub player_id: Uuid,
    pub name: String,
    pub score: f64,
    pub rank: usize,
}

impl From<&Standing> for StandingView {
    fn from(value: &Standing) -> Self {
        Self {
            player_id: value.player_id,
            name: value.name.clone(),
            score: value.score,
            rank: value.rank,
        }
    }
}

/// Final standings together with every question result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinalResultsView {
    pub standings: Vec<StandingView>,
    pub question_results: Vec<QuestionResultView>,
}

impl FinalResultsView {
    pub fn new(results: &FinalResults, players: &IndexMap<Uuid, Player>) -> Self {
        Self {
            standings: results.standings.iter().map(Into::into).collect(),
            question_results: results
                .questions
                .iter()
                .map(|result| QuestionResultView::new(result, players))
                .collect(),
        }
    }
}
