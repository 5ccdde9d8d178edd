//! Process-wide registry of pending session timers.
//!
//! A timer never touches session data itself: when it elapses it sends a
//! [`TimerFired`] message, and the dispatcher applies the matching transition
//! under the session lock. Every armed timer carries a fresh generation id so
//! a message that was already in flight when its timer got replaced or
//! cancelled can be recognised and dropped.

use std::time::Duration;

use dashmap::DashMap;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use uuid::Uuid;

/// What a timer was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Delay between a question being selected and it opening.
    Countdown,
    /// Time players have to answer the open question.
    QuestionDuration,
}

/// Message emitted when a timer elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub session_id: Uuid,
    pub generation: Uuid,
    pub kind: TimerKind,
}

struct TimerHandle {
    generation: Uuid,
    kind: TimerKind,
    task: JoinHandle<()>,
}

/// At most one live timer per session.
pub struct TimerRegistry {
    timers: DashMap<Uuid, TimerHandle>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TimerRegistry {
    /// Create a registry together with the receiving end of its fire notifications.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let registry = Self {
            timers: DashMap::new(),
            fired_tx,
        };
        (registry, fired_rx)
    }

    /// Schedule a one-shot timer for `session_id`, cancelling any timer already pending for it.
    ///
    /// Returns the generation id the eventual [`TimerFired`] will carry.
    pub fn arm(&self, session_id: Uuid, delay: Duration, kind: TimerKind) -> Uuid {
        let generation = Uuid::new_v4();
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(TimerFired {
                session_id,
                generation,
                kind,
            });
        });

        let handle = TimerHandle {
            generation,
            kind,
            task,
        };
        if let Some(previous) = self.timers.insert(session_id, handle) {
            previous.task.abort();
        }

        generation
    }

    /// Cancel the pending timer of `session_id`. Returns whether one was pending.
    pub fn cancel(&self, session_id: Uuid) -> bool {
        match self.timers.remove(&session_id) {
            Some((_, handle)) => {
                handle.task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&self) {
        self.timers.retain(|_, handle| {
            handle.task.abort();
            false
        });
    }

    /// Consume the registry entry matching a fired timer.
    ///
    /// Returns `false` when the timer was cancelled or replaced after it fired.
    pub fn claim(&self, fired: &TimerFired) -> bool {
        self.timers
            .remove_if(&fired.session_id, |_, handle| {
                handle.generation == fired.generation && handle.kind == fired.kind
            })
            .is_some()
    }

    /// Kind of the timer pending for `session_id`, if any.
    pub fn pending(&self, session_id: Uuid) -> Option<TimerKind> {
        self.timers.get(&session_id).map(|handle| handle.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (registry, mut rx) = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        let generation = registry.arm(session_id, Duration::from_secs(3), TimerKind::Countdown);

        sleep(Duration::from_millis(2_900)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.session_id, session_id);
        assert_eq!(fired.generation, generation);
        assert!(registry.claim(&fired));
        assert!(!registry.claim(&fired));
        assert_eq!(registry.pending(session_id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let (registry, mut rx) = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        registry.arm(session_id, Duration::from_secs(1), TimerKind::Countdown);
        let second = registry.arm(
            session_id,
            Duration::from_secs(5),
            TimerKind::QuestionDuration,
        );

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.generation, second);
        assert_eq!(fired.kind, TimerKind::QuestionDuration);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (registry, mut rx) = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        registry.arm(session_id, Duration::from_secs(1), TimerKind::Countdown);

        assert!(registry.cancel(session_id));
        assert!(!registry.cancel(session_id));

        sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_clears_every_session() {
        let (registry, mut rx) = TimerRegistry::new();
        let sessions: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for session_id in &sessions {
            registry.arm(*session_id, Duration::from_secs(2), TimerKind::Countdown);
        }

        registry.cancel_all();

        sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
        assert!(sessions.iter().all(|id| registry.pending(*id).is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fire_cannot_be_claimed() {
        let (registry, mut rx) = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        registry.arm(session_id, Duration::from_secs(1), TimerKind::Countdown);

        let fired = rx.recv().await.unwrap();
        registry.arm(session_id, Duration::from_secs(10), TimerKind::QuestionDuration);

        assert!(!registry.claim(&fired));
        assert_eq!(
            registry.pending(session_id),
            Some(TimerKind::QuestionDuration)
        );
    }
}
