//! Registry of running phase tasks.
//!
//! Every background phase of a contest runs as one tokio task registered
//! under a [`PhaseKey`]. The registry guarantees at most one task per key:
//! a spawn for a key that is already present is refused.
//!
//! # Entry Lifecycle
//!
//! - **Added** when a runner is spawned (creation, forced close, recovery,
//!   or a runner handing off to the next phase).
//! - **Removed by the task itself** when it finishes. A guard owned by the
//!   spawned task removes the entry on drop, which also covers panics and
//!   aborts.
//! - **Removed by cancellation**: [`Supervisor::cancel`] removes the entry,
//!   cancels its token and awaits the task before returning.
//! - **Removed at shutdown**: [`Supervisor::shutdown`] cancels and awaits
//!   every task.
//!
//! Generation numbers keep a finished task from removing a newer entry
//! registered under the same key.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::types::ContestId;

/// The background phases a contest can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Registration window (all kinds).
    Collection,

    /// Manual countdown or random draw.
    Decision,

    /// Activity window of an activity contest.
    Activity,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Collection, Phase::Decision, Phase::Activity];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Collection => "collection",
            Phase::Decision => "decision",
            Phase::Activity => "activity",
        }
    }
}

/// Registry key: one contest, one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseKey {
    pub contest: ContestId,
    pub phase: Phase,
}

impl PhaseKey {
    pub fn new(contest: ContestId, phase: Phase) -> Self {
        PhaseKey { contest, phase }
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contest, self.phase.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("a runner for {0} is already registered")]
    AlreadyRunning(PhaseKey),

    #[error("supervisor is shutting down")]
    ShuttingDown,
}

struct Entry {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

type Entries = Arc<Mutex<HashMap<PhaseKey, Entry>>>;

fn lock(entries: &Mutex<HashMap<PhaseKey, Entry>>) -> MutexGuard<'_, HashMap<PhaseKey, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handed to each runner: its key and cancellation token.
#[derive(Debug, Clone)]
pub struct PhaseLease {
    key: PhaseKey,
    token: CancellationToken,
}

impl PhaseLease {
    pub fn key(&self) -> PhaseKey {
        self.key
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleeps for `duration`. Returns false if cancelled first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(Instant::now() + duration).await
    }

    /// Sleeps until `deadline`. Returns false if cancelled first.
    pub async fn sleep_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }
}

/// Owned by the spawned task; removes the task's entry on drop, including
/// when the runner panics.
struct EntryGuard {
    key: PhaseKey,
    generation: u64,
    entries: Entries,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        let mut entries = lock(&self.entries);
        if entries
            .get(&self.key)
            .is_some_and(|e| e.generation == self.generation)
        {
            entries.remove(&self.key);
            trace!(phase = %self.key, "runner released its entry");
        }
    }
}

/// Process-wide table of running phases.
pub struct Supervisor {
    entries: Entries,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawns `runner` under `key` unless a task for `key` is registered.
    pub fn spawn<F, Fut>(&self, key: PhaseKey, runner: F) -> Result<(), SpawnError>
    where
        F: FnOnce(PhaseLease) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(SpawnError::ShuttingDown);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let guard = EntryGuard {
            key,
            generation,
            entries: Arc::clone(&self.entries),
        };
        let future = runner(PhaseLease {
            key,
            token: token.clone(),
        });

        let mut entries = lock(&self.entries);
        if entries.contains_key(&key) {
            drop(entries);
            return Err(SpawnError::AlreadyRunning(key));
        }

        // The guard's drop takes the same lock, so the task cannot release
        // its entry before the insert below.
        let task = tokio::spawn(async move {
            let _guard = guard;
            future.await;
        });
        entries.insert(
            key,
            Entry {
                generation,
                token,
                task,
            },
        );
        debug!(phase = %key, generation, "spawned runner");
        Ok(())
    }

    /// Cancels the task under `key` and waits for it to exit.
    ///
    /// Returns false if nothing was registered.
    pub async fn cancel(&self, key: PhaseKey) -> bool {
        let entry = lock(&self.entries).remove(&key);
        match entry {
            Some(entry) => {
                entry.token.cancel();
                join(key, entry.task).await;
                debug!(phase = %key, "cancelled runner");
                true
            }
            None => false,
        }
    }

    /// Cancels every phase of `contest`, waiting for each to exit.
    pub async fn cancel_contest(&self, contest: ContestId) -> usize {
        let mut cancelled = 0;
        for phase in Phase::ALL {
            if self.cancel(PhaseKey::new(contest, phase)).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_running(&self, key: PhaseKey) -> bool {
        lock(&self.entries).contains_key(&key)
    }

    /// Registered keys in sorted order.
    pub fn running(&self) -> Vec<PhaseKey> {
        let mut keys: Vec<PhaseKey> = lock(&self.entries).keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuses new spawns, then cancels and awaits every task.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<(PhaseKey, Entry)> = lock(&self.entries).drain().collect();
        info!(runners = drained.len(), "shutting down phase runners");
        for (key, entry) in drained {
            entry.token.cancel();
            join(key, entry.task).await;
        }
    }
}

async fn join(key: PhaseKey, task: JoinHandle<()>) {
    if let Err(e) = task.await
        && e.is_panic()
    {
        error!(phase = %key, "runner panicked");
    }
}
