use std::{collections::BTreeSet, time::Duration, time::SystemTime};

use indexmap::IndexMap;
use rand::{rng, seq::SliceRandom};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, PlayerEntity, QuestionEntity, QuizEntity, SessionEntity},
    state::results::{FinalResults, QuestionResult, final_results},
};

/// Identifier of an answer, unique within its question.
pub type AnswerId = u32;

const GENERATED_NAME_LETTERS: usize = 5;
const GENERATED_NAME_DIGITS: usize = 3;

/// Candidate answer copied from the quiz at session creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOption {
    pub id: AnswerId,
    pub text: String,
    pub colour: String,
    pub correct: bool,
}

/// Immutable copy of a quiz question taken when the session was created.
///
/// Editing or deleting the quiz afterwards never reaches a running session.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSnapshot {
    pub id: Uuid,
    pub prompt: String,
    pub duration: Duration,
    pub points: u32,
    pub thumbnail_url: Option<String>,
    pub answers: Vec<AnswerOption>,
}

impl QuestionSnapshot {
    /// Set of answer ids a submission must select to be correct.
    pub fn correct_answer_ids(&self) -> BTreeSet<AnswerId> {
        self.answers
            .iter()
            .filter(|answer| answer.correct)
            .map(|answer| answer.id)
            .collect()
    }

    /// Whether `id` names one of this question's answers.
    pub fn has_answer(&self, id: AnswerId) -> bool {
        self.answers.iter().any(|answer| answer.id == id)
    }
}

/// Player registered in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    /// Sum of the points earned across closed questions.
    pub score: f64,
}

/// Reasons a player cannot be added to a session roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// Another player already uses this display name.
    DuplicateName(String),
}

/// Session data independent of the state machine: questions, roster and results.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: Uuid,
    pub quiz_id: Uuid,
    /// Owner of the quiz when the session was created; the only user allowed to host it.
    pub owner_id: Uuid,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Player count that starts the session automatically (0 disables it).
    pub auto_start_num: u32,
    pub questions: Vec<QuestionSnapshot>,
    pub players: IndexMap<Uuid, Player>,
    /// Results of closed questions, in question order.
    pub results: Vec<QuestionResult>,
    /// Standings computed when the session reaches final results or ends.
    pub final_results: Option<FinalResults>,
}

impl GameSession {
    /// Build a fresh session from a quiz, copying its questions.
    pub fn from_quiz(quiz: &QuizEntity, auto_start_num: u32) -> Self {
        let timestamp = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            owner_id: quiz.owner_id,
            created_at: timestamp,
            updated_at: timestamp,
            auto_start_num,
            questions: quiz.questions.iter().cloned().map(Into::into).collect(),
            players: IndexMap::new(),
            results: Vec::new(),
            final_results: None,
        }
    }

    /// Rebuild a session from its stored snapshot, standings included.
    pub fn from_entity(entity: SessionEntity) -> Self {
        let players: IndexMap<Uuid, Player> = entity
            .players
            .into_iter()
            .map(|player| (player.id, Player::from(player)))
            .collect();
        let results: Vec<QuestionResult> = entity.results.into_iter().map(Into::into).collect();
        let standings = final_results(&players, &results);

        Self {
            id: entity.id,
            quiz_id: entity.quiz_id,
            owner_id: entity.owner_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            auto_start_num: entity.auto_start_num,
            questions: entity.questions.into_iter().map(Into::into).collect(),
            players,
            results,
            final_results: Some(standings),
        }
    }

    /// Question at a zero-based index.
    pub fn question(&self, index: usize) -> Option<&QuestionSnapshot> {
        self.questions.get(index)
    }

    /// Register a new player, generating a name when `name` is blank.
    pub fn add_player(&mut self, name: &str) -> Result<Player, RosterError> {
        let name = name.trim();
        let name = if name.is_empty() {
            self.unused_generated_name()
        } else {
            if self.players.values().any(|player| player.name == name) {
                return Err(RosterError::DuplicateName(name.to_string()));
            }
            name.to_string()
        };

        let player = Player {
            id: Uuid::new_v4(),
            name,
            score: 0.0,
        };
        self.players.insert(player.id, player.clone());
        self.updated_at = SystemTime::now();
        Ok(player)
    }

    /// Undo [`GameSession::add_player`] for a join that could not be saved.
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Player> {
        self.players.shift_remove(&player_id)
    }

    /// Whether the roster has reached the auto-start threshold.
    pub fn auto_start_reached(&self) -> bool {
        self.auto_start_num > 0 && self.players.len() >= self.auto_start_num as usize
    }

    /// Most recently computed question result.
    pub fn latest_result(&self) -> Option<&QuestionResult> {
        self.results.last()
    }

    /// Result computed for the question with the given id.
    pub fn result_for(&self, question_id: Uuid) -> Option<&QuestionResult> {
        self.results
            .iter()
            .find(|result| result.question_id == question_id)
    }

    fn unused_generated_name(&self) -> String {
        loop {
            let candidate = generate_player_name();
            if self.players.values().all(|player| player.name != candidate) {
                return candidate;
            }
        }
    }
}

/// Random name made of distinct lowercase letters followed by distinct digits (e.g. `qwert123`).
pub fn generate_player_name() -> String {
    let mut rng = rng();
    let mut letters: Vec<char> = ('a'..='z').collect();
    letters.shuffle(&mut rng);
    let mut digits: Vec<char> = ('0'..='9').collect();
    digits.shuffle(&mut rng);

    letters
        .into_iter()
        .take(GENERATED_NAME_LETTERS)
        .chain(digits.into_iter().take(GENERATED_NAME_DIGITS))
        .collect()
}

impl From<AnswerEntity> for AnswerOption {
    fn from(value: AnswerEntity) -> Self {
        Self {
            id: value.id,
            text: value.answer,
            colour: value.colour,
            correct: value.correct,
        }
    }
}

impl From<AnswerOption> for AnswerEntity {
    fn from(value: AnswerOption) -> Self {
        Self {
            id: value.id,
            answer: value.text,
            colour: value.colour,
            correct: value.correct,
        }
    }
}

impl From<QuestionEntity> for QuestionSnapshot {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.question,
            duration: Duration::from_secs(value.duration_secs),
            points: value.points,
            thumbnail_url: value.thumbnail_url,
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QuestionSnapshot> for QuestionEntity {
    fn from(value: QuestionSnapshot) -> Self {
        Self {
            id: value.id,
            question: value.prompt,
            duration_secs: value.duration.as_secs(),
            points: value.points,
            thumbnail_url: value.thumbnail_url,
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz() -> QuizEntity {
        QuizEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "capitals".into(),
            questions: vec![QuestionEntity {
                id: Uuid::new_v4(),
                question: "Capital of France?".into(),
                duration_secs: 10,
                points: 5,
                thumbnail_url: None,
                answers: vec![
                    AnswerEntity {
                        id: 1,
                        answer: "Paris".into(),
                        colour: "red".into(),
                        correct: true,
                    },
                    AnswerEntity {
                        id: 2,
                        answer: "Lyon".into(),
                        colour: "blue".into(),
                        correct: false,
                    },
                ],
            }],
        }
    }

    #[test]
    fn session_copies_quiz_questions() {
        let mut quiz = quiz();
        let session = GameSession::from_quiz(&quiz, 0);
        quiz.questions[0].question = "edited".into();

        assert_eq!(session.owner_id, quiz.owner_id);
        assert_eq!(session.questions[0].prompt, "Capital of France?");
        assert_eq!(session.questions[0].duration, Duration::from_secs(10));
        assert_eq!(
            session.questions[0].correct_answer_ids(),
            BTreeSet::from([1])
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut session = GameSession::from_quiz(&quiz(), 0);
        session.add_player("alice").unwrap();
        assert_eq!(
            session.add_player(" alice ").unwrap_err(),
            RosterError::DuplicateName("alice".into())
        );
    }

    #[test]
    fn blank_name_gets_generated() {
        let mut session = GameSession::from_quiz(&quiz(), 0);
        let player = session.add_player("   ").unwrap();

        assert_eq!(player.name.len(), 8);
        let (letters, digits) = player.name.split_at(5);
        assert!(letters.chars().all(|c| c.is_ascii_lowercase()));
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        let unique: BTreeSet<char> = player.name.chars().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn auto_start_threshold() {
        let mut session = GameSession::from_quiz(&quiz(), 2);
        session.add_player("a").unwrap();
        assert!(!session.auto_start_reached());
        session.add_player("b").unwrap();
        assert!(session.auto_start_reached());

        let mut disabled = GameSession::from_quiz(&quiz(), 0);
        disabled.add_player("a").unwrap();
        assert!(!disabled.auto_start_reached());
    }

    #[test]
    fn removed_player_frees_the_name() {
        let mut session = GameSession::from_quiz(&quiz(), 0);
        let alice = session.add_player("alice").unwrap();
        assert_eq!(session.remove_player(alice.id), Some(alice));
        assert!(session.players.is_empty());
        assert!(session.add_player("alice").is_ok());
    }

    #[test]
    fn stored_session_comes_back_with_standings() {
        let mut session = GameSession::from_quiz(&quiz(), 3);
        let alice = session.add_player("alice").unwrap();
        let bob = session.add_player("bob").unwrap();
        let entity = SessionEntity {
            id: session.id,
            quiz_id: session.quiz_id,
            owner_id: session.owner_id,
            state: crate::dao::models::SessionStateEntity::QuestionOpen,
            question_index: Some(0),
            auto_start_num: session.auto_start_num,
            created_at: session.created_at,
            updated_at: session.updated_at,
            questions: session.questions.iter().cloned().map(Into::into).collect(),
            players: vec![
                PlayerEntity {
                    id: alice.id,
                    name: alice.name.clone(),
                    score: 2.0,
                },
                PlayerEntity {
                    id: bob.id,
                    name: bob.name.clone(),
                    score: 5.0,
                },
            ],
            results: Vec::new(),
        };

        let restored = GameSession::from_entity(entity);
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.auto_start_num, 3);
        assert_eq!(restored.questions, session.questions);
        assert_eq!(restored.players[&bob.id].score, 5.0);
        let standings = restored.final_results.unwrap().standings;
        assert_eq!(standings[0].player_id, bob.id);
        assert_eq!(standings[1].player_id, alice.id);
    }
}
