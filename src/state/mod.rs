pub mod collector;
pub mod game;
pub mod results;
mod sse;
pub mod state_machine;
pub mod timers;
pub mod transitions;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{models::SessionEntity, quiz_store::QuizStore},
    error::ServiceError,
    state::{
        collector::AnswerCollector,
        game::{GameSession, QuestionSnapshot},
        state_machine::{SessionState, SessionStateMachine},
        timers::{TimerFired, TimerRegistry},
    },
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

pub type SharedState = Arc<AppState>;
/// Per-session lock; host operations and timer transitions of one session serialise on it.
pub type SessionHandle = Arc<Mutex<SessionRuntime>>;

const SSE_CAPACITY: usize = 64;

/// Live data of one session guarded by its [`SessionHandle`].
pub struct SessionRuntime {
    pub session: GameSession,
    pub machine: SessionStateMachine,
    pub collector: AnswerCollector,
    /// Set by `clear` under the lock; work still queued on the lock must not touch the session.
    pub discarded: bool,
}

impl SessionRuntime {
    pub fn new(session: GameSession) -> Self {
        let machine = SessionStateMachine::new(session.questions.len());
        Self {
            session,
            machine,
            collector: AnswerCollector::new(),
            discarded: false,
        }
    }

    /// Session loaded back from the store, ended since its timers are gone.
    pub fn restored(entity: SessionEntity) -> Self {
        let question_index = entity.question_index;
        let session = GameSession::from_entity(entity);
        let machine = SessionStateMachine::ended(session.questions.len(), question_index);
        Self {
            session,
            machine,
            collector: AnswerCollector::new(),
            discarded: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Question the session is currently on, if it has started.
    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        self.machine
            .question_index()
            .and_then(|index| self.session.question(index))
    }

    /// Persistable snapshot of the session.
    pub fn to_entity(&self) -> SessionEntity {
        let session = &self.session;
        SessionEntity {
            id: session.id,
            quiz_id: session.quiz_id,
            owner_id: session.owner_id,
            state: self.state().into(),
            question_index: self.machine.question_index(),
            auto_start_num: session.auto_start_num,
            created_at: session.created_at,
            updated_at: session.updated_at,
            questions: session.questions.iter().cloned().map(Into::into).collect(),
            players: session.players.values().cloned().map(Into::into).collect(),
            results: session.results.iter().cloned().map(Into::into).collect(),
        }
    }
}

/// Process-wide state: live sessions, timers, the store collaborator and event hub.
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<dyn QuizStore>,
    sessions: DashMap<Uuid, SessionHandle>,
    /// Player id to the session the player joined.
    players: DashMap<Uuid, Uuid>,
    /// Per-quiz guard held while a session is counted against the active limit and inserted.
    creation_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timers: TimerRegistry,
    sse: SseHub,
}

impl AppState {
    /// Construct the shared state along with the receiver of timer notifications.
    ///
    /// The receiver must be handed to the timer dispatcher, otherwise timers never
    /// drive any transition.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn QuizStore>,
    ) -> (SharedState, mpsc::UnboundedReceiver<TimerFired>) {
        let (timers, fired_rx) = TimerRegistry::new();
        let state = Arc::new(Self {
            config: Arc::new(config),
            store,
            sessions: DashMap::new(),
            players: DashMap::new(),
            creation_locks: DashMap::new(),
            timers,
            sse: SseHub::new(SSE_CAPACITY),
        });
        (state, fired_rx)
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Store collaborator used for quizzes and session snapshots.
    pub fn store(&self) -> Arc<dyn QuizStore> {
        self.store.clone()
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Broadcast hub used for the session SSE streams.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Lock handle of a live session.
    pub fn session(&self, session_id: Uuid) -> Result<SessionHandle, ServiceError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
    }

    /// Lock handle of the session a player belongs to.
    pub fn session_for_player(&self, player_id: Uuid) -> Result<SessionHandle, ServiceError> {
        let session_id = self
            .players
            .get(&player_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
        self.session(session_id)
    }

    /// Lock a live session, refusing one that was cleared while the caller waited.
    pub async fn lock_session(
        &self,
        session_id: Uuid,
    ) -> Result<OwnedMutexGuard<SessionRuntime>, ServiceError> {
        let runtime = self.session(session_id)?.lock_owned().await;
        if runtime.discarded {
            return Err(discarded(session_id));
        }
        Ok(runtime)
    }

    /// Lock the session a player belongs to.
    pub async fn lock_player_session(
        &self,
        player_id: Uuid,
    ) -> Result<OwnedMutexGuard<SessionRuntime>, ServiceError> {
        let runtime = self.session_for_player(player_id)?.lock_owned().await;
        if runtime.discarded {
            return Err(discarded(runtime.session.id));
        }
        Ok(runtime)
    }

    /// Register a freshly created session and return its handle.
    pub fn insert_session(&self, runtime: SessionRuntime) -> SessionHandle {
        let session_id = runtime.session.id;
        let handle = Arc::new(Mutex::new(runtime));
        self.sessions.insert(session_id, handle.clone());
        handle
    }

    pub fn register_player(&self, player_id: Uuid, session_id: Uuid) {
        self.players.insert(player_id, session_id);
    }

    pub fn unregister_player(&self, player_id: Uuid) {
        self.players.remove(&player_id);
    }

    /// Guard serialising session creation for `quiz_id`.
    pub fn creation_lock(&self, quiz_id: Uuid) -> Arc<Mutex<()>> {
        self.creation_locks.entry(quiz_id).or_default().clone()
    }

    /// Handles of every live session; cloned so no map guard outlives the call.
    pub fn session_handles(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Forget every session and player. Timers must be cancelled beforehand.
    pub fn clear_sessions(&self) {
        self.sessions.clear();
        self.players.clear();
        self.creation_locks.clear();
    }

    /// Save the session snapshot through the store collaborator.
    ///
    /// A discarded session is never written, so a cleared store stays clear.
    pub async fn persist(&self, runtime: &SessionRuntime) -> Result<(), ServiceError> {
        if runtime.discarded {
            return Err(discarded(runtime.session.id));
        }
        self.store.save_session(runtime.to_entity()).await?;
        Ok(())
    }
}

/// Error returned to work that reached a session after it was cleared.
pub fn discarded(session_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("session `{session_id}` has been cleared"))
}
