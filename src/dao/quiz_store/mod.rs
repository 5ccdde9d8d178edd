pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{QuizEntity, SessionEntity},
    storage::StorageResult,
};

pub use self::memory::MemoryQuizStore;

/// Abstraction over where quizzes and session snapshots live.
///
/// Quizzes are owned by the quiz CRUD layer; sessions only read them and save
/// their own snapshots after every state change.
pub trait QuizStore: Send + Sync {
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every stored session snapshot, in the order they were first saved.
    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>>;
    /// Drop every quiz and session.
    fn clear(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
