//! Scoring of closed questions and final standings.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerOutcomeEntity, QuestionResultEntity},
    state::{
        collector::FrozenSubmissions,
        game::{Player, QuestionSnapshot},
    },
};

/// How a question's points are split between correct players by rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScaling {
    /// `points / rank`: the fastest correct player takes full points, the second half, ...
    #[default]
    Reciprocal,
    /// Every correct player takes full points.
    Flat,
}

impl ScoreScaling {
    /// Points earned by the correct player at 1-based `rank`.
    pub fn points(self, base: u32, rank: usize) -> f64 {
        match self {
            ScoreScaling::Reciprocal => f64::from(base) / rank.max(1) as f64,
            ScoreScaling::Flat => f64::from(base),
        }
    }
}

/// One player's line in a question result.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutcome {
    pub player_id: Uuid,
    pub correct: bool,
    /// Time between the question opening and the player's last submission.
    pub answer_time_ms: Option<u64>,
    /// Position among correct players, fastest first.
    pub rank: Option<usize>,
    pub points: f64,
}

/// Result of a closed question. Never mutated once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question_id: Uuid,
    /// One outcome per session player, in roster order.
    pub outcomes: Vec<PlayerOutcome>,
    /// Fraction of session players who answered correctly, in `[0, 1]`.
    pub percent_correct: f64,
    /// Mean answer time over players who submitted anything.
    pub average_answer_time_ms: f64,
}

impl QuestionResult {
    /// Players who answered correctly, fastest first.
    pub fn players_correct(&self) -> Vec<Uuid> {
        let mut ranked: Vec<&PlayerOutcome> = self
            .outcomes
            .iter()
            .filter(|outcome| outcome.rank.is_some())
            .collect();
        ranked.sort_by_key(|outcome| outcome.rank);
        ranked.into_iter().map(|outcome| outcome.player_id).collect()
    }

    pub fn outcome_for(&self, player_id: Uuid) -> Option<&PlayerOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.player_id == player_id)
    }
}

/// Score a closed question for every player in `roster`.
///
/// A submission is correct iff its answer set equals the question's correct set.
pub fn aggregate(
    question: &QuestionSnapshot,
    frozen: FrozenSubmissions,
    roster: &[Uuid],
    scaling: ScoreScaling,
) -> QuestionResult {
    let correct_ids = question.correct_answer_ids();
    let opened_at = frozen.opened_at;

    let submitted: HashMap<Uuid, (bool, u64)> = frozen
        .submissions
        .into_iter()
        .map(|submission| {
            let selected: BTreeSet<_> = submission.answer_ids.iter().copied().collect();
            let elapsed = submission
                .submitted_at
                .saturating_duration_since(opened_at)
                .as_millis() as u64;
            (submission.player_id, (selected == correct_ids, elapsed))
        })
        .collect();

    // Stable sort keeps roster order between equal answer times.
    let mut correct_players: Vec<(Uuid, u64)> = roster
        .iter()
        .filter_map(|id| match submitted.get(id) {
            Some((true, elapsed)) => Some((*id, *elapsed)),
            _ => None,
        })
        .collect();
    correct_players.sort_by_key(|(_, elapsed)| *elapsed);
    let ranks: HashMap<Uuid, usize> = correct_players
        .iter()
        .enumerate()
        .map(|(position, (id, _))| (*id, position + 1))
        .collect();

    let outcomes: Vec<PlayerOutcome> = roster
        .iter()
        .map(|id| {
            let rank = ranks.get(id).copied();
            PlayerOutcome {
                player_id: *id,
                correct: rank.is_some(),
                answer_time_ms: submitted.get(id).map(|(_, elapsed)| *elapsed),
                rank,
                points: rank.map_or(0.0, |rank| scaling.points(question.points, rank)),
            }
        })
        .collect();

    let percent_correct = if roster.is_empty() {
        0.0
    } else {
        correct_players.len() as f64 / roster.len() as f64
    };

    let times: Vec<u64> = outcomes
        .iter()
        .filter_map(|outcome| outcome.answer_time_ms)
        .collect();
    let average_answer_time_ms = if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<u64>() as f64 / times.len() as f64
    };

    QuestionResult {
        question_id: question.id,
        outcomes,
        percent_correct,
        average_answer_time_ms,
    }
}

/// Player position in the final standings.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub player_id: Uuid,
    pub name: String,
    pub score: f64,
    pub rank: usize,
}

/// Final standings plus every question result of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResults {
    pub standings: Vec<Standing>,
    pub questions: Vec<QuestionResult>,
}

/// Rank players by total score (highest first, ties by name).
pub fn final_results(players: &IndexMap<Uuid, Player>, results: &[QuestionResult]) -> FinalResults {
    let mut ordered: Vec<&Player> = players.values().collect();
    ordered.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
    });

    let standings = ordered
        .into_iter()
        .enumerate()
        .map(|(position, player)| Standing {
            player_id: player.id,
            name: player.name.clone(),
            score: player.score,
            rank: position + 1,
        })
        .collect();

    FinalResults {
        standings,
        questions: results.to_vec(),
    }
}

impl From<PlayerOutcome> for PlayerOutcomeEntity {
    fn from(value: PlayerOutcome) -> Self {
        Self {
            player_id: value.player_id,
            correct: value.correct,
            answer_time_ms: value.answer_time_ms,
            rank: value.rank,
            points: value.points,
        }
    }
}

impl From<QuestionResult> for QuestionResultEntity {
    fn from(value: QuestionResult) -> Self {
        Self {
            question_id: value.question_id,
            outcomes: value.outcomes.into_iter().map(Into::into).collect(),
            percent_correct: value.percent_correct,
            average_answer_time_ms: value.average_answer_time_ms,
        }
    }
}

impl From<PlayerOutcomeEntity> for PlayerOutcome {
    fn from(value: PlayerOutcomeEntity) -> Self {
        Self {
            player_id: value.player_id,
            correct: value.correct,
            answer_time_ms: value.answer_time_ms,
            rank: value.rank,
            points: value.points,
        }
    }
}

impl From<QuestionResultEntity> for QuestionResult {
    fn from(value: QuestionResultEntity) -> Self {
        Self {
            question_id: value.question_id,
            outcomes: value.outcomes.into_iter().map(Into::into).collect(),
            percent_correct: value.percent_correct,
            average_answer_time_ms: value.average_answer_time_ms,
        }
    }
}
