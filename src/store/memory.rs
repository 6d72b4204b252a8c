//! Snapshot-backed [`Store`].

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info};

use super::snapshot::{StoreSnapshot, save_snapshot_atomic, try_load_snapshot};
use super::{InsertOutcome, NewParticipant, Result, Store, Transition};
use crate::types::{
    Contest, ContestId, ContestKind, ContestStatus, MessageRef, NewContest, Participant,
    TallyEntry, UserId, UserStats, Winner,
};

/// All tables behind one async mutex, optionally mirrored to a file.
///
/// Mutations run against a copy of the tables; the copy replaces the live
/// state only after it has been written, so a failed write leaves both memory
/// and disk at the previous state. Writes run on the blocking pool while the
/// mutex is held, so snapshots reach the disk in mutation order.
#[derive(Debug)]
pub struct SnapshotStore {
    state: Mutex<StoreSnapshot>,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        SnapshotStore::from_snapshot(StoreSnapshot::new(), None)
    }

    /// Opens the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match try_load_snapshot(&path)? {
            Some(snapshot) => {
                info!(
                    path = %path.display(),
                    contests = snapshot.contests.len(),
                    "loaded store snapshot"
                );
                snapshot
            }
            None => {
                info!(path = %path.display(), "no store snapshot, starting empty");
                StoreSnapshot::new()
            }
        };
        Ok(SnapshotStore::from_snapshot(snapshot, Some(path)))
    }

    pub fn from_snapshot(snapshot: StoreSnapshot, path: Option<PathBuf>) -> Self {
        SnapshotStore {
            state: Mutex::new(snapshot),
            path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of every table.
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.clone()
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreSnapshot) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut StoreSnapshot) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next)?;
        next.touch(Utc::now());

        *state = match &self.path {
            Some(path) => persist(path.clone(), next).await?,
            None => next,
        };
        Ok(out)
    }
}

/// Writes `snapshot` off the async workers and hands it back.
async fn persist(path: PathBuf, snapshot: StoreSnapshot) -> Result<StoreSnapshot> {
    let (snapshot, saved) = task::spawn_blocking(move || {
        let saved = save_snapshot_atomic(&path, &snapshot);
        if saved.is_ok() {
            debug!(path = %path.display(), "persisted store snapshot");
        }
        (snapshot, saved)
    })
    .await
    .map_err(io::Error::from)?;
    saved?;
    Ok(snapshot)
}

impl Store for SnapshotStore {
    async fn create_contest(&self, new: NewContest) -> Result<Contest> {
        self.mutate(|s| Ok(s.create_contest(new, Utc::now()))).await
    }

    async fn contest(&self, id: ContestId) -> Result<Option<Contest>> {
        Ok(self.read(|s| s.contest(id).cloned()).await)
    }

    async fn active_contests(&self) -> Result<Vec<Contest>> {
        Ok(self.read(StoreSnapshot::active_contests).await)
    }

    async fn transition(
        &self,
        id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> Result<Transition> {
        self.mutate(|s| s.transition(id, from, to, Utc::now()))
            .await
    }

    async fn set_announcement(&self, id: ContestId, message: Option<MessageRef>) -> Result<()> {
        self.mutate(|s| s.set_announcement(id, message)).await
    }

    async fn insert_participant(&self, new: NewParticipant) -> Result<InsertOutcome> {
        self.mutate(|s| s.insert_participant(new)).await
    }

    async fn participant_count(&self, id: ContestId) -> Result<u32> {
        self.read(|s| s.participant_count(id)).await
    }

    async fn participants(&self, id: ContestId) -> Result<Vec<Participant>> {
        self.read(|s| s.participants(id)).await
    }

    async fn participant_by_position(
        &self,
        id: ContestId,
        position: u32,
    ) -> Result<Option<Participant>> {
        self.read(|s| s.participant_by_position(id, position)).await
    }

    async fn init_tallies(&self, id: ContestId) -> Result<()> {
        self.mutate(|s| s.init_tallies(id)).await
    }

    async fn increment_tally(&self, id: ContestId, user: UserId) -> Result<bool> {
        self.mutate(|s| s.increment_tally(id, user)).await
    }

    async fn leaderboard(&self, id: ContestId) -> Result<Vec<TallyEntry>> {
        self.read(|s| s.leaderboard(id)).await
    }

    async fn finish(
        &self,
        id: ContestId,
        from: Option<ContestStatus>,
        winners: Vec<UserId>,
    ) -> Result<Transition> {
        self.mutate(|s| s.finish(id, from, &winners, Utc::now()))
            .await
    }

    async fn winners(&self, id: ContestId) -> Result<Vec<Winner>> {
        Ok(self.read(|s| s.winners(id)).await)
    }

    async fn latest_winners(&self, kind: ContestKind) -> Result<Vec<Winner>> {
        Ok(self.read(|s| s.latest_winners(kind)).await)
    }

    async fn user_stats(&self, user: UserId) -> Result<UserStats> {
        Ok(self.read(|s| s.user_stats(user)).await)
    }

    async fn record_participation(&self, user: UserId) -> Result<UserStats> {
        self.mutate(|s| Ok(s.record_participation(user))).await
    }

    async fn add_referral(&self, user: UserId) -> Result<UserStats> {
        self.mutate(|s| Ok(s.add_referral(user))).await
    }
}
