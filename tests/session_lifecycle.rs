use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::future::{BoxFuture, join_all};

use quiz_game_back::{
    config::AppConfig,
    dao::{
        models::{AnswerEntity, QuestionEntity, QuizEntity, SessionEntity, SessionStateEntity},
        quiz_store::{MemoryQuizStore, QuizStore},
        storage::{StorageError, StorageResult},
    },
    dto::{
        phase::VisibleSessionState,
        player::{JoinSessionRequest, SubmitAnswerRequest},
        session::CreateSessionRequest,
    },
    error::ServiceError,
    services::{self, player_service, session_service},
    state::{SharedState, timers::TimerKind},
};
use tokio::{sync::Notify, time::sleep};
use uuid::Uuid;

const COUNTDOWN_MS: u64 = 3_000;

/// Memory store whose next session write can be held back or made to fail.
#[derive(Default)]
struct ControlledStore {
    inner: MemoryQuizStore,
    hold_next_save: AtomicBool,
    fail_next_save: AtomicBool,
    save_entered: Arc<Notify>,
    save_released: Arc<Notify>,
}

impl ControlledStore {
    /// Park the next `save_session` until [`ControlledStore::release_save`].
    fn hold_next_save(&self) {
        self.hold_next_save.store(true, Ordering::SeqCst);
    }

    /// Wait until a held write has started.
    async fn save_started(&self) {
        self.save_entered.notified().await;
    }

    fn release_save(&self) {
        self.save_released.notify_one();
    }

    fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    async fn find_session(&self, id: Uuid) -> StorageResult<Option<SessionEntity>> {
        let sessions = self.inner.list_sessions().await?;
        Ok(sessions.into_iter().find(|session| session.id == id))
    }
}

impl QuizStore for ControlledStore {
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        self.inner.find_quiz(id)
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_quiz(quiz)
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Box::pin(async {
                Err(StorageError::unavailable(
                    "disk full".into(),
                    io::Error::other("disk full"),
                ))
            });
        }

        let save = self.inner.save_session(session);
        if self.hold_next_save.swap(false, Ordering::SeqCst) {
            let entered = self.save_entered.clone();
            let released = self.save_released.clone();
            return Box::pin(async move {
                entered.notify_one();
                released.notified().await;
                save.await
            });
        }
        save
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        self.inner.list_sessions()
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.clear()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

struct Fixture {
    state: SharedState,
    store: Arc<ControlledStore>,
    owner: Uuid,
    quiz: QuizEntity,
}

fn question(duration_secs: u64, points: u32) -> QuestionEntity {
    QuestionEntity {
        id: Uuid::new_v4(),
        question: format!("Worth {points} points?"),
        duration_secs,
        points,
        thumbnail_url: None,
        answers: vec![
            AnswerEntity {
                id: 1,
                answer: "yes".into(),
                colour: "green".into(),
                correct: true,
            },
            AnswerEntity {
                id: 2,
                answer: "no".into(),
                colour: "red".into(),
                correct: false,
            },
        ],
    }
}

async fn fixture() -> Fixture {
    let store = Arc::new(ControlledStore::default());
    let owner = Uuid::new_v4();
    let quiz = QuizEntity {
        id: Uuid::new_v4(),
        owner_id: owner,
        name: "two questions".into(),
        questions: vec![question(10, 10), question(5, 4)],
    };
    store.save_quiz(quiz.clone()).await.unwrap();

    let config = AppConfig::default()
        .with_countdown(Duration::from_millis(COUNTDOWN_MS))
        .with_data_path(None);
    let state = services::launch(config, store.clone() as Arc<dyn QuizStore>);

    Fixture {
        state,
        store,
        owner,
        quiz,
    }
}

impl Fixture {
    async fn session(&self, auto_start_num: u32) -> Uuid {
        session_service::create_session(
            &self.state,
            self.owner,
            self.quiz.id,
            CreateSessionRequest { auto_start_num },
        )
        .await
        .unwrap()
        .session_id
    }

    async fn join(&self, session_id: Uuid, name: &str) -> Uuid {
        player_service::join(
            &self.state,
            session_id,
            JoinSessionRequest { name: name.into() },
        )
        .await
        .unwrap()
        .player_id
    }

    async fn submit(&self, player_id: Uuid, position: usize, answer_ids: &[u32]) {
        player_service::submit_answer(
            &self.state,
            player_id,
            position,
            SubmitAnswerRequest {
                answer_ids: answer_ids.to_vec(),
            },
        )
        .await
        .unwrap();
    }

    async fn state_of(&self, session_id: Uuid) -> VisibleSessionState {
        session_service::get_session_view(&self.state, session_id)
            .await
            .unwrap()
            .state
    }
}

/// Let the countdown timer elapse so the current question opens.
async fn wait_for_open() {
    sleep(Duration::from_millis(COUNTDOWN_MS + 50)).await;
}

#[tokio::test(start_paused = true)]
async fn two_questions_two_players_scenario() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    let alice = fx.join(session_id, "alice").await;
    let bob = fx.join(session_id, "bob").await;

    let view = session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(view.state, VisibleSessionState::QuestionCountdown);
    assert_eq!(view.at_question, 1);

    wait_for_open().await;
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::QuestionOpen);

    // Question opened at the 3s mark; answers land 1s and 2s after it.
    sleep(Duration::from_millis(950)).await;
    fx.submit(alice, 1, &[1]).await;
    sleep(Duration::from_millis(1_000)).await;
    fx.submit(bob, 1, &[2]).await;

    let view = session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(view.state, VisibleSessionState::QuestionClose);
    let result = view.latest_result.expect("closed question has a result");
    assert_eq!(result.percent_correct, 0.5);
    assert_eq!(result.players_correct, vec!["alice".to_string()]);
    assert_eq!(result.average_answer_time_ms, 1_500.0);
    let alice_line = result.outcomes.iter().find(|o| o.player_id == alice).unwrap();
    assert_eq!(alice_line.rank, Some(1));
    assert_eq!(alice_line.points, 10.0);
    assert_eq!(alice_line.answer_time_ms, Some(1_000));
    let bob_line = result.outcomes.iter().find(|o| o.player_id == bob).unwrap();
    assert_eq!(bob_line.rank, None);
    assert_eq!(bob_line.points, 0.0);

    // Second question closes on its own once its 5s duration elapses.
    let view = session_service::advance_to_next_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(view.state, VisibleSessionState::QuestionCountdown);
    assert_eq!(view.at_question, 2);
    assert!(view.latest_result.is_none());

    wait_for_open().await;
    fx.submit(alice, 2, &[1]).await;
    sleep(Duration::from_secs(6)).await;
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::QuestionClose);

    let view = session_service::advance_to_next_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(view.state, VisibleSessionState::FinalResults);

    let results = session_service::final_results_for_host(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(results.standings[0].player_id, alice);
    assert_eq!(results.standings[0].score, 14.0);
    assert_eq!(results.standings[1].player_id, bob);
    assert_eq!(results.standings[1].score, 0.0);
    assert_eq!(results.question_results.len(), 2);

    let view = session_service::end(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    assert_eq!(view.state, VisibleSessionState::End);
}

#[tokio::test(start_paused = true)]
async fn resubmission_keeps_only_the_latest_answer() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    let alice = fx.join(session_id, "alice").await;
    let bob = fx.join(session_id, "bob").await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    wait_for_open().await;

    sleep(Duration::from_millis(450)).await;
    fx.submit(alice, 1, &[1]).await;
    sleep(Duration::from_millis(500)).await;
    fx.submit(bob, 1, &[1]).await;
    sleep(Duration::from_millis(1_000)).await;
    // Same answer again; only this later submission time counts.
    fx.submit(alice, 1, &[1]).await;

    let view = session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    let result = view.latest_result.unwrap();
    assert_eq!(
        result.players_correct,
        vec!["bob".to_string(), "alice".to_string()]
    );
    let alice_line = result.outcomes.iter().find(|o| o.player_id == alice).unwrap();
    assert_eq!(alice_line.answer_time_ms, Some(2_000));
    assert_eq!(alice_line.points, 5.0);
}

#[tokio::test(start_paused = true)]
async fn late_submission_is_rejected_and_result_is_frozen() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    let alice = fx.join(session_id, "alice").await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    wait_for_open().await;
    fx.submit(alice, 1, &[2]).await;

    let before = session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap()
        .latest_result
        .unwrap();

    let err = player_service::submit_answer(
        &fx.state,
        alice,
        1,
        SubmitAnswerRequest {
            answer_ids: vec![1],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidSubmission(_)));

    let after = player_service::player_question_result(&fx.state, alice, 1)
        .await
        .unwrap();
    assert_eq!(after.percent_correct, before.percent_correct);
    assert_eq!(after.percent_correct, 0.0);
}

#[tokio::test(start_paused = true)]
async fn ending_cancels_pending_timers() {
    let fx = fixture().await;
    let during_countdown = fx.session(0).await;
    let during_question = fx.session(0).await;
    fx.join(during_question, "alice").await;

    session_service::start(&fx.state, during_question, fx.owner)
        .await
        .unwrap();
    wait_for_open().await;
    session_service::start(&fx.state, during_countdown, fx.owner)
        .await
        .unwrap();
    assert_eq!(
        fx.state.timers().pending(during_question),
        Some(TimerKind::QuestionDuration)
    );
    assert_eq!(
        fx.state.timers().pending(during_countdown),
        Some(TimerKind::Countdown)
    );

    session_service::end(&fx.state, during_question, fx.owner)
        .await
        .unwrap();
    session_service::end(&fx.state, during_countdown, fx.owner)
        .await
        .unwrap();

    sleep(Duration::from_secs(30)).await;

    for session_id in [during_countdown, during_question] {
        let view = session_service::get_session_view(&fx.state, session_id)
            .await
            .unwrap();
        assert_eq!(view.state, VisibleSessionState::End);
        assert!(view.latest_result.is_none());
        assert!(fx.state.timers().pending(session_id).is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn ending_before_countdown_elapses_keeps_session_ended() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();

    sleep(Duration::from_millis(1_000)).await;
    session_service::end(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    sleep(Duration::from_secs(20)).await;

    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::End);
    let stored = fx.store.find_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionStateEntity::End);
}

#[tokio::test(start_paused = true)]
async fn invalid_host_actions_fail_with_invalid_state() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;

    let err = session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    let err = session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    wait_for_open().await;
    let err = session_service::advance_to_next_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::QuestionOpen);

    session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    let err = session_service::show_final_results(&fx.state, session_id, fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::QuestionClose);
}

#[tokio::test(start_paused = true)]
async fn join_after_start_is_rejected() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    fx.join(session_id, "alice").await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();

    let err = player_service::join(
        &fx.state,
        session_id,
        JoinSessionRequest { name: "bob".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = player_service::join(
        &fx.state,
        Uuid::new_v4(),
        JoinSessionRequest { name: "carol".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn auto_start_when_threshold_is_reached() {
    let fx = fixture().await;
    let session_id = fx.session(2).await;

    fx.join(session_id, "alice").await;
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::Lobby);
    fx.join(session_id, "").await;
    assert_eq!(
        fx.state_of(session_id).await,
        VisibleSessionState::QuestionCountdown
    );

    wait_for_open().await;
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::QuestionOpen);
}

#[tokio::test(start_paused = true)]
async fn only_the_owner_may_host() {
    let fx = fixture().await;
    let stranger = Uuid::new_v4();

    let err = session_service::create_session(
        &fx.state,
        stranger,
        fx.quiz.id,
        CreateSessionRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorised(_)));

    let session_id = fx.session(0).await;
    let err = session_service::start(&fx.state, session_id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorised(_)));
    assert_eq!(fx.state_of(session_id).await, VisibleSessionState::Lobby);
}

#[tokio::test(start_paused = true)]
async fn session_creation_limits() {
    let fx = fixture().await;

    let err = session_service::create_session(
        &fx.state,
        fx.owner,
        Uuid::new_v4(),
        CreateSessionRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = session_service::create_session(
        &fx.state,
        fx.owner,
        fx.quiz.id,
        CreateSessionRequest {
            auto_start_num: 51,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let empty = QuizEntity {
        id: Uuid::new_v4(),
        owner_id: fx.owner,
        name: "empty".into(),
        questions: Vec::new(),
    };
    fx.store.save_quiz(empty.clone()).await.unwrap();
    let err = session_service::create_session(
        &fx.state,
        fx.owner,
        empty.id,
        CreateSessionRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let mut sessions = Vec::new();
    for _ in 0..10 {
        sessions.push(fx.session(0).await);
    }
    let err = session_service::create_session(
        &fx.state,
        fx.owner,
        fx.quiz.id,
        CreateSessionRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    // Ended sessions no longer count against the limit.
    session_service::end(&fx.state, sessions[0], fx.owner)
        .await
        .unwrap();
    fx.session(0).await;

    let list = session_service::list_sessions(&fx.state, fx.owner, fx.quiz.id)
        .await
        .unwrap();
    assert_eq!(list.active_sessions.len(), 10);
    assert_eq!(list.inactive_sessions, vec![sessions[0]]);
}

#[tokio::test(start_paused = true)]
async fn player_views_follow_the_session() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    let alice = fx.join(session_id, "alice").await;

    let status = player_service::player_status(&fx.state, alice).await.unwrap();
    assert_eq!(status.state, VisibleSessionState::Lobby);
    assert_eq!(status.at_question, 0);
    assert_eq!(status.num_questions, 2);
    assert!(player_service::player_question(&fx.state, alice, 1)
        .await
        .is_err());

    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    wait_for_open().await;

    let question = player_service::player_question(&fx.state, alice, 1)
        .await
        .unwrap();
    assert_eq!(question.question_id, fx.quiz.questions[0].id);
    assert_eq!(question.answers.len(), 2);
    assert!(player_service::player_question(&fx.state, alice, 2)
        .await
        .is_err());
    assert!(player_service::player_question_result(&fx.state, alice, 1)
        .await
        .is_err());

    let err = player_service::submit_answer(
        &fx.state,
        alice,
        2,
        SubmitAnswerRequest {
            answer_ids: vec![1],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidSubmission(_)));

    let err = player_service::submit_answer(
        &fx.state,
        alice,
        1,
        SubmitAnswerRequest {
            answer_ids: vec![1, 1],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidSubmission(_)));

    fx.submit(alice, 1, &[1]).await;
    // Let the 10s question duration run out.
    sleep(Duration::from_secs(11)).await;

    let result = player_service::player_question_result(&fx.state, alice, 1)
        .await
        .unwrap();
    assert_eq!(result.players_correct, vec!["alice".to_string()]);
    assert!(player_service::player_final_results(&fx.state, alice)
        .await
        .is_err());

    let stored = fx.store.find_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionStateEntity::QuestionClose);
    assert_eq!(stored.results.len(), 1);
    assert_eq!(stored.players[0].score, 10.0);
}

#[tokio::test(start_paused = true)]
async fn clear_drops_sessions_and_timers() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();

    session_service::clear(&fx.state).await.unwrap();
    sleep(Duration::from_secs(20)).await;

    let err = session_service::get_session_view(&fx.state, session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(fx.state.timers().pending(session_id).is_none());
    assert!(fx.store.find_quiz(fx.quiz.id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn clear_waits_for_in_flight_writes() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;

    fx.store.hold_next_save();
    let start = tokio::spawn({
        let state = fx.state.clone();
        let owner = fx.owner;
        async move { session_service::start(&state, session_id, owner).await }
    });
    fx.store.save_started().await;

    let clear = tokio::spawn({
        let state = fx.state.clone();
        async move { session_service::clear(&state).await }
    });
    tokio::task::yield_now().await;
    // Queued behind `clear` on the session lock.
    let end = tokio::spawn({
        let state = fx.state.clone();
        let owner = fx.owner;
        async move { session_service::end(&state, session_id, owner).await }
    });
    tokio::task::yield_now().await;

    fx.store.release_save();
    start.await.unwrap().unwrap();
    clear.await.unwrap().unwrap();
    let err = end.await.unwrap().unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    sleep(Duration::from_secs(20)).await;
    assert!(fx.store.find_session(session_id).await.unwrap().is_none());
    assert!(fx.store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_join_can_be_retried() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;

    fx.store.fail_next_save();
    let err = player_service::join(
        &fx.state,
        session_id,
        JoinSessionRequest {
            name: "alice".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    let view = session_service::get_session_view(&fx.state, session_id)
        .await
        .unwrap();
    assert!(view.players.is_empty());

    let alice = fx.join(session_id, "alice").await;
    let view = session_service::get_session_view(&fx.state, session_id)
        .await
        .unwrap();
    assert_eq!(view.players.len(), 1);
    assert_eq!(view.players[0].player_id, alice);
}

#[tokio::test(start_paused = true)]
async fn stored_sessions_are_restored_ended() {
    let fx = fixture().await;
    let finished = fx.session(0).await;
    session_service::end(&fx.state, finished, fx.owner)
        .await
        .unwrap();

    let running = fx.session(0).await;
    let alice = fx.join(running, "alice").await;
    session_service::start(&fx.state, running, fx.owner)
        .await
        .unwrap();
    wait_for_open().await;
    fx.submit(alice, 1, &[1]).await;
    // The old process goes away with its timers.
    fx.state.timers().cancel_all();

    let config = AppConfig::default().with_data_path(None);
    let restarted = services::launch(config, fx.store.clone() as Arc<dyn QuizStore>);
    let restored = session_service::restore_sessions(&restarted).await.unwrap();
    assert_eq!(restored, 2);

    for session_id in [finished, running] {
        let view = session_service::get_session_view(&restarted, session_id)
            .await
            .unwrap();
        assert_eq!(view.state, VisibleSessionState::End);
        assert!(view.final_results.is_some());
    }
    let stored = fx.store.find_session(running).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionStateEntity::End);

    let status = player_service::player_status(&restarted, alice).await.unwrap();
    assert_eq!(status.state, VisibleSessionState::End);
    assert_eq!(status.at_question, 1);

    let list = session_service::list_sessions(&restarted, fx.owner, fx.quiz.id)
        .await
        .unwrap();
    assert!(list.active_sessions.is_empty());
    assert_eq!(list.inactive_sessions.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn answer_time_counts_from_the_opening() {
    let fx = fixture().await;
    let session_id = fx.session(0).await;
    let alice = fx.join(session_id, "alice").await;
    session_service::start(&fx.state, session_id, fx.owner)
        .await
        .unwrap();

    // Keep the session busy across the countdown deadline.
    sleep(Duration::from_millis(COUNTDOWN_MS - 100)).await;
    let handle = fx.state.session(session_id).unwrap();
    let guard = handle.lock().await;
    sleep(Duration::from_millis(150)).await;

    // The opening transition is queued first; this answer waits behind it.
    fx.store.hold_next_save();
    let early = tokio::spawn({
        let state = fx.state.clone();
        async move {
            player_service::submit_answer(
                &state,
                alice,
                1,
                SubmitAnswerRequest {
                    answer_ids: vec![1],
                },
            )
            .await
        }
    });
    sleep(Duration::from_millis(350)).await;

    drop(guard);
    fx.store.save_started().await;
    sleep(Duration::from_millis(200)).await;
    fx.store.release_save();
    early.await.unwrap().unwrap();

    let view = session_service::force_close_question(&fx.state, session_id, fx.owner)
        .await
        .unwrap();
    let result = view.latest_result.unwrap();
    let line = result.outcomes.iter().find(|o| o.player_id == alice).unwrap();
    assert_eq!(line.answer_time_ms, Some(200));
}

#[tokio::test(start_paused = true)]
async fn concurrent_creation_respects_the_active_limit() {
    let fx = fixture().await;
    let limit = AppConfig::default().max_active_sessions_per_quiz();

    let attempts = (0..limit + 3).map(|_| {
        let state = fx.state.clone();
        let owner = fx.owner;
        let quiz_id = fx.quiz.id;
        tokio::spawn(async move {
            session_service::create_session(&state, owner, quiz_id, CreateSessionRequest::default())
                .await
        })
    });
    let created = join_all(attempts)
        .await
        .into_iter()
        .filter(|outcome| matches!(outcome, Ok(Ok(_))))
        .count();
    assert_eq!(created, limit);

    let list = session_service::list_sessions(&fx.state, fx.owner, fx.quiz.id)
        .await
        .unwrap();
    assert_eq!(list.active_sessions.len(), limit);
}
