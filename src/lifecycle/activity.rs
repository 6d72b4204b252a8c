//! Activity window: live leaderboard and the final count.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::{Engine, Phase, PhaseKey, PhaseLease, SpawnError, ZeroActivityPolicy};
use super::timing::deadline_after;
use crate::announce;
use crate::store::Store;
use crate::transport::{Destination, Transport};
use crate::types::{ContestId, ContestStatus, TallyEntry};

/// The winning leaderboard entry under `policy`, if any.
///
/// `board` must already be ordered (count descending, position ascending).
pub fn activity_winner(board: &[TallyEntry], policy: ZeroActivityPolicy) -> Option<&TallyEntry> {
    let top = board.first()?;
    match policy {
        ZeroActivityPolicy::DeclareTopRanked => Some(top),
        ZeroActivityPolicy::RequireActivity => (top.count > 0).then_some(top),
    }
}

impl<S: Store, T: Transport> Engine<S, T> {
    pub(crate) fn spawn_activity(self: &Arc<Self>, contest: ContestId) -> Result<(), SpawnError> {
        let engine = Arc::clone(self);
        self.supervisor
            .spawn(PhaseKey::new(contest, Phase::Activity), move |lease| {
                engine.run_activity(contest, lease)
            })
    }

    #[instrument(skip(self, lease), fields(contest = %id))]
    async fn run_activity(self: Arc<Self>, id: ContestId, lease: PhaseLease) {
        let Some(contest) = self.load_for_runner(id, &lease).await else {
            return;
        };
        if contest.status != ContestStatus::Running {
            return;
        }
        // Idempotent, so a recovered runner keeps the counts it finds.
        if self
            .retry(&lease, "tally initialisation", || self.store.init_tallies(id))
            .await
            .is_none()
        {
            return;
        }

        let window = contest.second_window_or(self.config.default_second_window);
        let remaining = window.saturating_sub(contest.elapsed_in_phase(Utc::now()));
        let deadline = deadline_after(remaining);
        info!(remaining_secs = remaining.as_secs(), "activity window started");

        loop {
            let next = (Instant::now() + self.config.leaderboard_refresh).min(deadline);
            if !lease.sleep_until(next).await {
                return;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            if !self.refresh_leaderboard(id, left).await {
                return;
            }
        }

        let Some(board) = self
            .retry(&lease, "leaderboard read", || self.store.leaderboard(id))
            .await
        else {
            return;
        };
        let winner = activity_winner(&board, self.config.zero_activity).cloned();
        let winners = winner.iter().map(|w| w.user).collect::<Vec<_>>();

        let Some(transition) = self
            .retry(&lease, "finishing the activity contest", || {
                self.store
                    .finish(id, Some(ContestStatus::Running), winners.clone())
            })
            .await
        else {
            return;
        };
        let Some(ended) = self.applied(transition).await else {
            info!("contest left the activity phase before it finished");
            return;
        };

        match &winner {
            Some(w) => info!(winner = %w.user, count = w.count, "activity contest complete"),
            None => info!("activity contest complete without a winner"),
        }
        self.clear_announcement(&ended).await;
        let text = announce::activity_result(&ended, &board, winner.as_ref());
        self.post(Destination::Channel, text.clone()).await;
        self.notify_operator(text).await;
    }

    /// Re-renders the leaderboard. Returns false once the contest is no
    /// longer running.
    async fn refresh_leaderboard(&self, id: ContestId, left: std::time::Duration) -> bool {
        let current = match self.store.contest(id).await {
            Ok(Some(current)) => current,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "could not refresh leaderboard");
                return true;
            }
        };
        if current.status != ContestStatus::Running {
            return false;
        }
        let Some(message) = current.announcement else {
            return true;
        };
        match self.store.leaderboard(id).await {
            Ok(board) => {
                self.edit(message, announce::leaderboard(&current, &board, left))
                    .await
            }
            Err(e) => warn!(error = %e, "could not read leaderboard"),
        }
        true
    }
}
