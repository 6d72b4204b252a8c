//! Startup recovery.
//!
//! Runners live only in memory, so after a restart every non-terminal
//! contest needs exactly one runner again. The runner is chosen strictly
//! from the persisted status and kind; each runner measures its remaining
//! window from the persisted phase start.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{Engine, SpawnError};
use crate::store::{Store, StoreError};
use crate::transport::Transport;
use crate::types::{ContestId, ContestKind, ContestStatus};

/// Which runners recovery started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub collection: Vec<ContestId>,
    pub countdown: Vec<ContestId>,

    /// Random draws found mid-decision and drawn again.
    pub redrawn: Vec<ContestId>,

    pub activity: Vec<ContestId>,

    /// Contests whose status is not on their kind's path; ended.
    pub ended: Vec<ContestId>,

    /// Contests whose runner could not be spawned.
    pub failed: Vec<ContestId>,
}

impl RecoveryReport {
    pub fn spawned(&self) -> usize {
        self.collection.len() + self.countdown.len() + self.redrawn.len() + self.activity.len()
    }
}

impl<S: Store, T: Transport> Engine<S, T> {
    /// Spawns one runner per non-terminal contest.
    #[instrument(skip(self))]
    pub async fn recover(self: &Arc<Self>) -> Result<RecoveryReport, StoreError> {
        let contests = self.store.active_contests().await?;
        info!(active = contests.len(), "recovering active contests");

        let mut report = RecoveryReport::default();
        for contest in contests {
            let id = contest.id;
            let (spawned, bucket): (Result<(), SpawnError>, &mut Vec<ContestId>) =
                match (contest.status, contest.kind) {
                    (ContestStatus::Collecting, _) => {
                        (self.spawn_collection(id), &mut report.collection)
                    }
                    (ContestStatus::AwaitingDecision, ContestKind::ManualSelection) => {
                        (self.spawn_decision(id), &mut report.countdown)
                    }
                    (ContestStatus::AwaitingDecision, ContestKind::RandomDraw) => {
                        warn!(contest = %id, "random draw was interrupted, drawing again");
                        (self.spawn_decision(id), &mut report.redrawn)
                    }
                    (ContestStatus::Running, ContestKind::ActivityCount) => {
                        (self.spawn_activity(id), &mut report.activity)
                    }
                    (status, kind) => {
                        warn!(contest = %id, %status, %kind, "status is not on the kind's path, ending contest");
                        self.end_inconsistent(&contest).await;
                        report.ended.push(id);
                        continue;
                    }
                };

            match spawned {
                Ok(()) => bucket.push(id),
                Err(e) => {
                    warn!(contest = %id, error = %e, "recovery could not start runner");
                    report.failed.push(id);
                }
            }
        }

        info!(
            spawned = report.spawned(),
            ended = report.ended.len(),
            failed = report.failed.len(),
            "recovery complete"
        );
        Ok(report)
    }
}
