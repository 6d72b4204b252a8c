//! Durable contest, participant, tally and winner records.
//!
//! The lifecycle engine talks to storage only through the [`Store`] trait.
//! Every method is one atomic step: status changes are compare-and-set,
//! participant inserts assign position and marker under the same lock that
//! checks uniqueness, and finishing a contest writes its winners together with
//! the terminal status.
//!
//! [`SnapshotStore`] is the implementation the binary uses: all tables in
//! memory, rewritten to a JSON snapshot after each mutation.

pub mod fsync;
pub mod memory;
pub mod snapshot;

use std::future::Future;
use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{
    Contest, ContestId, ContestKind, ContestStatus, DisplayName, MessageRef, NewContest,
    Participant, TallyEntry, UserId, UserStats, Winner,
};

pub use memory::SnapshotStore;
pub use snapshot::{SCHEMA_VERSION, StoreSnapshot, load_snapshot, save_snapshot_atomic};

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("contest {0} not found")]
    NotFound(ContestId),

    #[error("{kind} contest {contest} cannot move from {from} to {to}")]
    InvalidTransition {
        contest: ContestId,
        kind: ContestKind,
        from: ContestStatus,
        to: ContestStatus,
    },

    #[error("user {user} is not a participant of contest {contest}")]
    NotParticipant { contest: ContestId, user: UserId },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of a compare-and-set status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The change applied; carries the prior status and the updated contest.
    Applied {
        from: ContestStatus,
        contest: Contest,
    },

    /// The contest was not in the expected status. Nothing changed.
    Lost { current: ContestStatus },
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// A registration about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub contest: ContestId,
    pub user: UserId,
    pub name: DisplayName,

    /// Random draw used to pick the marker inside the insert.
    pub marker_seed: u64,

    pub joined_at: DateTime<Utc>,
}

/// Outcome of a participant insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Participant),
    AlreadyRegistered,

    /// The participant cap is reached.
    Full,

    /// The contest is no longer collecting.
    Closed { status: ContestStatus },
}

/// Storage consumed by the lifecycle engine.
///
/// Implementations must make each call atomic with respect to every other
/// call on the same contest.
pub trait Store: Send + Sync + 'static {
    fn create_contest(&self, new: NewContest) -> impl Future<Output = Result<Contest>> + Send;

    fn contest(&self, id: ContestId) -> impl Future<Output = Result<Option<Contest>>> + Send;

    /// Every contest whose status is not `Ended`.
    fn active_contests(&self) -> impl Future<Output = Result<Vec<Contest>>> + Send;

    /// Compare-and-set on the status, stamping the phase start (and the end
    /// time when `to` is terminal).
    fn transition(
        &self,
        id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> impl Future<Output = Result<Transition>> + Send;

    fn set_announcement(
        &self,
        id: ContestId,
        message: Option<MessageRef>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn insert_participant(
        &self,
        new: NewParticipant,
    ) -> impl Future<Output = Result<InsertOutcome>> + Send;

    fn participant_count(&self, id: ContestId) -> impl Future<Output = Result<u32>> + Send;

    /// Participants in position order.
    fn participants(&self, id: ContestId) -> impl Future<Output = Result<Vec<Participant>>> + Send;

    fn participant_by_position(
        &self,
        id: ContestId,
        position: u32,
    ) -> impl Future<Output = Result<Option<Participant>>> + Send;

    fn init_tallies(&self, id: ContestId) -> impl Future<Output = Result<()>> + Send;

    /// Returns false if `user` has no counter in this contest.
    fn increment_tally(
        &self,
        id: ContestId,
        user: UserId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Count descending, ties broken by ascending participant position.
    fn leaderboard(&self, id: ContestId) -> impl Future<Output = Result<Vec<TallyEntry>>> + Send;

    /// Moves the contest to `Ended` and records `winners`, all in one step.
    ///
    /// `from: None` accepts any non-terminal status.
    fn finish(
        &self,
        id: ContestId,
        from: Option<ContestStatus>,
        winners: Vec<UserId>,
    ) -> impl Future<Output = Result<Transition>> + Send;

    fn winners(&self, id: ContestId) -> impl Future<Output = Result<Vec<Winner>>> + Send;

    /// Winners of the most recently ended contest of `kind` that had any.
    fn latest_winners(
        &self,
        kind: ContestKind,
    ) -> impl Future<Output = Result<Vec<Winner>>> + Send;

    fn user_stats(&self, user: UserId) -> impl Future<Output = Result<UserStats>> + Send;

    /// Counts one more contest entered by `user`.
    fn record_participation(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<UserStats>> + Send;

    /// Counts one more referred subscriber for `user`.
    ///
    /// Write side of the referral count. Tracking who referred whom happens
    /// outside this crate; whatever does it records each referral here, and
    /// registration reads the total through [`Store::user_stats`] for the
    /// `min_referrals` rule.
    fn add_referral(&self, user: UserId) -> impl Future<Output = Result<UserStats>> + Send;
}
