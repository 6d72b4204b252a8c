//! Contest lifecycle orchestration.
//!
//! The [`Engine`] drives every contest through its statuses:
//!
//! ```text
//! manual-selection:  collecting ──► awaiting_decision ──► ended   (operator picks)
//! random-draw:       collecting ──► awaiting_decision ──► ended   (runner draws)
//! activity-count:    collecting ──► running ───────────► ended   (top tally wins)
//!                         └──────────────┴── any non-terminal ──► ended
//! ```
//!
//! Each timed phase is a background task registered with the [`Supervisor`].
//! Status changes are compare-and-set calls on the [`Store`]; whoever applies
//! a change performs the follow-up work (publishing, spawning the next
//! runner), and whoever loses does nothing. Callers that need a phase to stop
//! before they act (forced close, cancellation, winner selection) cancel its
//! runner through the supervisor and await its exit first.
//!
//! # Submodules
//!
//! - `collection`: registration-window runner and the closing handoff
//! - `decision`: manual countdown and random draw
//! - `activity`: activity window and leaderboard
//! - `registration`: admission of one participant
//! - `operator`: create, force start, cancel, select winners
//! - `routing`: inbound channel messages
//! - `recovery`: re-spawning runners at startup

mod activity;
mod collection;
mod decision;
mod operator;
mod recovery;
mod registration;
mod routing;
pub mod supervisor;
pub mod timing;


use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::store::{Store, StoreError, Transition};
use crate::transport::{Destination, Transport};
use crate::types::{
    Contest, ContestId, ContestKind, ContestStatus, InvalidContest, MessageRef, UserId, Winner,
};

pub use recovery::RecoveryReport;
pub use registration::{Candidate, Registration, Rejection};
pub use routing::{ChannelMessage, Routed};
pub use supervisor::{Phase, PhaseKey, PhaseLease, SpawnError, Supervisor};
pub use timing::{LifecycleConfig, ZeroActivityPolicy};

/// Capacity of the lifecycle event channel. Slow subscribers miss events
/// rather than block the engine.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Published on every admission, status change and winner record.
///
/// Achievement evaluation and other observers subscribe via
/// [`Engine::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Admitted {
        contest: ContestId,
        user: UserId,
        position: u32,
    },
    StatusChanged {
        contest: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    },
    WinnersRecorded {
        contest: ContestId,
        winners: Vec<Winner>,
    },
}

/// Errors returned to the operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("invalid contest: {0}")]
    Invalid(#[from] InvalidContest),

    #[error("contest {0} not found")]
    NotFound(ContestId),

    #[error("contest {contest} is {status}")]
    WrongStatus {
        contest: ContestId,
        status: ContestStatus,
    },

    #[error("contest {contest} is a {kind} contest")]
    WrongKind { contest: ContestId, kind: ContestKind },

    #[error("contest {0} has no participants")]
    NoParticipants(ContestId),

    #[error("contest {contest} has no participant at position {position}")]
    UnknownPosition { contest: ContestId, position: u32 },

    #[error("no winner positions given")]
    NoPositions,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Spawn(#[from] SpawnError),
}

/// Result type for operator operations.
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Owns the collaborators and the runner registry.
///
/// Always held in an `Arc`: runners keep the engine alive while they run.
pub struct Engine<S, T> {
    store: S,
    transport: T,
    config: LifecycleConfig,
    supervisor: Supervisor,
    events: broadcast::Sender<LifecycleEvent>,
}

impl<S: Store, T: Transport> Engine<S, T> {
    pub fn new(store: S, transport: T, config: LifecycleConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Engine {
            store,
            transport,
            config,
            supervisor: Supervisor::new(),
            events,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Cancels and awaits every runner. Persisted state is left as is for
    /// recovery on the next start.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Emits the events for an applied transition and returns the contest.
    async fn applied(&self, transition: Transition) -> Option<Contest> {
        match transition {
            Transition::Applied { from, contest } => {
                self.emit(LifecycleEvent::StatusChanged {
                    contest: contest.id,
                    from,
                    to: contest.status,
                });
                if contest.status.is_terminal() {
                    match self.store.winners(contest.id).await {
                        Ok(winners) if !winners.is_empty() => {
                            self.emit(LifecycleEvent::WinnersRecorded {
                                contest: contest.id,
                                winners,
                            });
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(contest = %contest.id, error = %e, "could not read recorded winners")
                        }
                    }
                }
                Some(contest)
            }
            Transition::Lost { .. } => None,
        }
    }

    /// Runs a store call until it succeeds, backing off between failures.
    /// Returns `None` once the runner is cancelled.
    async fn retry<R, F, Fut>(&self, lease: &PhaseLease, what: &str, mut call: F) -> Option<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<R, StoreError>>,
    {
        loop {
            if lease.is_cancelled() {
                return None;
            }
            match call().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    warn!(phase = %lease.key(), error = %e, "{} failed, backing off", what);
                    if !lease.sleep(self.config.store_backoff).await {
                        return None;
                    }
                }
            }
        }
    }

    // ─── Best-effort transport calls ───

    async fn post(&self, to: Destination, text: String) -> Option<MessageRef> {
        match self.transport.send(to, text).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(to = %to, error = %e, "send failed");
                None
            }
        }
    }

    async fn notify_operator(&self, text: String) {
        self.post(Destination::Operator, text).await;
    }

    async fn reply(&self, message: MessageRef, text: String) {
        if let Err(e) = self.transport.reply(message, text).await {
            warn!(message = %message, error = %e, "reply failed");
        }
    }

    async fn edit(&self, message: MessageRef, text: String) {
        if let Err(e) = self.transport.edit(message, text).await {
            warn!(message = %message, error = %e, "edit failed");
        }
    }

    /// Deletes the contest's live post and clears the stored reference.
    async fn clear_announcement(&self, contest: &Contest) {
        let Some(message) = contest.announcement else {
            return;
        };
        if let Err(e) = self.transport.delete(message).await {
            warn!(contest = %contest.id, message = %message, error = %e, "delete failed");
        }
        if let Err(e) = self.store.set_announcement(contest.id, None).await {
            warn!(contest = %contest.id, error = %e, "could not clear announcement");
        }
    }

    /// Replaces the contest's live post with a new channel message.
    async fn replace_announcement(&self, contest: &Contest, text: String) -> Option<MessageRef> {
        self.clear_announcement(contest).await;
        let message = self.post(Destination::Channel, text).await?;
        if let Err(e) = self.store.set_announcement(contest.id, Some(message)).await {
            warn!(contest = %contest.id, error = %e, "could not record announcement");
        }
        Some(message)
    }
}
