use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Quiz definition owned by a user, as handed over by the quiz CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizEntity {
    /// Stable identifier for the quiz.
    pub id: Uuid,
    /// User that owns the quiz and may host sessions from it.
    pub owner_id: Uuid,
    /// Human readable quiz name.
    pub name: String,
    /// Ordered questions of the quiz.
    pub questions: Vec<QuestionEntity>,
}

/// Question entry inside a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Question text shown to players.
    pub question: String,
    /// Time (seconds) players have to answer once the question opens.
    pub duration_secs: u64,
    /// Points awarded to the fastest correct player.
    pub points: u32,
    /// Optional illustration for the question.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Candidate answers.
    pub answers: Vec<AnswerEntity>,
}

/// Candidate answer of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerEntity {
    /// Identifier of the answer, unique within its question.
    pub id: u32,
    /// Answer text.
    pub answer: String,
    /// Display colour picked when the answer was created.
    pub colour: String,
    /// Whether selecting this answer is required for a correct submission.
    pub correct: bool,
}

/// Lifecycle state of a session as stored on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStateEntity {
    Lobby,
    QuestionCountdown,
    QuestionOpen,
    QuestionClose,
    FinalResults,
    End,
}

/// Persisted snapshot of a game session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEntity {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub owner_id: Uuid,
    pub state: SessionStateEntity,
    /// Zero-based index of the current question, absent before the session starts.
    pub question_index: Option<usize>,
    pub auto_start_num: u32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Questions copied from the quiz when the session was created.
    pub questions: Vec<QuestionEntity>,
    pub players: Vec<PlayerEntity>,
    pub results: Vec<QuestionResultEntity>,
}

/// Player registered in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    pub id: Uuid,
    pub name: String,
    pub score: f64,
}

/// Computed outcome of a closed question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResultEntity {
    pub question_id: Uuid,
    pub outcomes: Vec<PlayerOutcomeEntity>,
    pub percent_correct: f64,
    pub average_answer_time_ms: f64,
}

/// Per-player line of a question result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerOutcomeEntity {
    pub player_id: Uuid,
    pub correct: bool,
    pub answer_time_ms: Option<u64>,
    pub rank: Option<usize>,
    pub points: f64,
}
