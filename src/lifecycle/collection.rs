//! Registration-window runner and the collection-closing handoff.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{Engine, Phase, PhaseKey, PhaseLease, SpawnError};
use super::timing::deadline_after;
use crate::announce;
use crate::store::{Store, StoreError};
use crate::transport::Transport;
use crate::types::{Contest, ContestId, ContestKind, ContestStatus};

impl<S: Store, T: Transport> Engine<S, T> {
    pub(crate) fn spawn_collection(self: &Arc<Self>, contest: ContestId) -> Result<(), SpawnError> {
        let engine = Arc::clone(self);
        self.supervisor
            .spawn(PhaseKey::new(contest, Phase::Collection), move |lease| {
                engine.run_collection(contest, lease)
            })
    }

    /// Polls until the target is reached or the window expires.
    ///
    /// The window is measured from the persisted phase start, so a runner
    /// spawned by recovery only waits for what is left of it.
    #[instrument(skip(self, lease), fields(contest = %id))]
    async fn run_collection(self: Arc<Self>, id: ContestId, lease: PhaseLease) {
        let Some(contest) = self.load_for_runner(id, &lease).await else {
            return;
        };
        if contest.status != ContestStatus::Collecting {
            debug!(status = %contest.status, "contest is not collecting, runner exits");
            return;
        }

        let remaining = contest
            .durations
            .collection
            .saturating_sub(contest.elapsed_in_phase(Utc::now()));
        let deadline = deadline_after(remaining);
        info!(remaining_secs = remaining.as_secs(), "collection runner started");

        loop {
            if lease.is_cancelled() {
                return;
            }
            match self.collection_tick(&contest, deadline).await {
                Ok(true) => return,
                Ok(false) => {
                    let next = (Instant::now() + self.config.poll_interval).min(deadline);
                    if !lease.sleep_until(next).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "collection tick failed, backing off");
                    if !lease.sleep(self.config.store_backoff).await {
                        return;
                    }
                }
            }
        }
    }

    /// One poll. Returns true when the runner is done.
    ///
    /// The count is checked before the deadline, so a contest that filled up
    /// exactly at expiry still closes normally.
    async fn collection_tick(
        self: &Arc<Self>,
        contest: &Contest,
        deadline: Instant,
    ) -> Result<bool, StoreError> {
        let Some(current) = self.store.contest(contest.id).await? else {
            return Ok(true);
        };
        if current.status != ContestStatus::Collecting {
            return Ok(true);
        }

        let count = self.store.participant_count(contest.id).await?;
        if count >= contest.target {
            info!(count, target = contest.target, "target reached");
            self.transition_and_hand_off(&current).await?;
            return Ok(true);
        }

        if Instant::now() >= deadline {
            if count == 0 {
                self.expire_empty(&current).await?;
            } else {
                info!(count, target = contest.target, "collection window expired");
                self.transition_and_hand_off(&current).await?;
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Ends a contest nobody joined.
    async fn expire_empty(&self, contest: &Contest) -> Result<(), StoreError> {
        let transition = self
            .store
            .finish(contest.id, Some(ContestStatus::Collecting), Vec::new())
            .await?;
        if let Some(ended) = self.applied(transition).await {
            info!(contest = %ended.id, "nobody registered, contest ended without a winner");
            self.clear_announcement(contest).await;
            self.notify_operator(announce::ended_without_winner(&ended, "nobody registered"))
                .await;
        }
        Ok(())
    }

    /// Closes collection from outside the runner: stops the runner, waits for
    /// it to exit, then attempts the transition.
    ///
    /// Returns the contest in its new status if this call applied the change.
    /// If the store fails, the runner is restarted so the window keeps being
    /// enforced.
    pub(crate) async fn close_collection(
        self: &Arc<Self>,
        id: ContestId,
    ) -> Result<Option<Contest>, StoreError> {
        self.supervisor
            .cancel(PhaseKey::new(id, Phase::Collection))
            .await;

        let result = match self.store.contest(id).await {
            Ok(Some(contest)) if contest.status == ContestStatus::Collecting => {
                self.transition_and_hand_off(&contest).await
            }
            Ok(Some(_)) => Ok(None),
            Ok(None) => Err(StoreError::NotFound(id)),
            Err(e) => Err(e),
        };

        if let Err(e) = &result
            && !matches!(e, StoreError::NotFound(_))
        {
            warn!(contest = %id, error = %e, "closing collection failed, restarting its runner");
            if let Err(e) = self.spawn_collection(id) {
                warn!(contest = %id, error = %e, "collection runner not restarted");
            }
        }
        result
    }

    /// Compare-and-set out of `Collecting`; the caller that applies it
    /// publishes the next phase and spawns its runner.
    async fn transition_and_hand_off(
        self: &Arc<Self>,
        contest: &Contest,
    ) -> Result<Option<Contest>, StoreError> {
        let transition = self
            .store
            .transition(
                contest.id,
                ContestStatus::Collecting,
                contest.kind.decision_status(),
            )
            .await?;
        let Some(next) = self.applied(transition).await else {
            debug!(contest = %contest.id, "collection already closed elsewhere");
            return Ok(None);
        };

        self.hand_off(&next).await;
        Ok(Some(next))
    }

    async fn hand_off(self: &Arc<Self>, contest: &Contest) {
        let spawned = match contest.kind {
            ContestKind::ManualSelection => {
                match self.store.participants(contest.id).await {
                    Ok(roster) => {
                        let window = contest.second_window_or(self.config.default_second_window);
                        self.replace_announcement(
                            contest,
                            announce::roster(contest, &roster, window),
                        )
                        .await;
                    }
                    Err(e) => warn!(contest = %contest.id, error = %e, "could not publish roster"),
                }
                self.spawn_decision(contest.id)
            }
            ContestKind::RandomDraw => self.spawn_decision(contest.id),
            ContestKind::ActivityCount => {
                if let Err(e) = self.store.init_tallies(contest.id).await {
                    warn!(contest = %contest.id, error = %e, "could not initialise tallies");
                }
                match self.store.leaderboard(contest.id).await {
                    Ok(board) => {
                        let window = contest.second_window_or(self.config.default_second_window);
                        self.replace_announcement(
                            contest,
                            announce::leaderboard(contest, &board, window),
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(contest = %contest.id, error = %e, "could not publish leaderboard")
                    }
                }
                self.spawn_activity(contest.id)
            }
        };

        if let Err(e) = spawned {
            warn!(contest = %contest.id, error = %e, "next phase runner not started");
        }
    }

    /// Fetches the runner's contest, retrying store failures until cancelled.
    pub(crate) async fn load_for_runner(
        &self,
        id: ContestId,
        lease: &PhaseLease,
    ) -> Option<Contest> {
        loop {
            if lease.is_cancelled() {
                return None;
            }
            match self.store.contest(id).await {
                Ok(Some(contest)) => return Some(contest),
                Ok(None) => {
                    warn!(contest = %id, "contest not found, runner exits");
                    return None;
                }
                Err(e) => {
                    warn!(contest = %id, error = %e, "could not load contest, backing off");
                    if !lease.sleep(self.config.store_backoff).await {
                        return None;
                    }
                }
            }
        }
    }
}
