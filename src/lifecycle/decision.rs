//! Decision phase: manual countdown and random draw.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::{Engine, Phase, PhaseKey, PhaseLease, SpawnError};
use super::timing::deadline_after;
use crate::announce;
use crate::store::Store;
use crate::transport::{Destination, Transport};
use crate::types::{Contest, ContestId, ContestKind, ContestStatus, Participant};

/// Uniform pick. The thread-local generator never crosses an await.
fn pick_random(participants: &[Participant]) -> Option<&Participant> {
    participants.choose(&mut rand::thread_rng())
}

impl<S: Store, T: Transport> Engine<S, T> {
    pub(crate) fn spawn_decision(self: &Arc<Self>, contest: ContestId) -> Result<(), SpawnError> {
        let engine = Arc::clone(self);
        self.supervisor
            .spawn(PhaseKey::new(contest, Phase::Decision), move |lease| {
                engine.run_decision(contest, lease)
            })
    }

    #[instrument(skip(self, lease), fields(contest = %id))]
    async fn run_decision(self: Arc<Self>, id: ContestId, lease: PhaseLease) {
        let Some(contest) = self.load_for_runner(id, &lease).await else {
            return;
        };
        if contest.status != ContestStatus::AwaitingDecision {
            return;
        }
        let Some(participants) = self
            .retry(&lease, "participant listing", || self.store.participants(id))
            .await
        else {
            return;
        };

        if participants.is_empty() {
            warn!("decision phase reached with no participants, ending contest");
            self.end_inconsistent(&contest).await;
            return;
        }

        match contest.kind {
            ContestKind::ManualSelection => self.run_countdown(contest, participants, &lease).await,
            ContestKind::RandomDraw => self.draw(contest, participants, &lease).await,
            ContestKind::ActivityCount => {
                warn!("activity contest has no decision phase, runner exits");
            }
        }
    }

    /// Ends a contest whose decision phase cannot proceed.
    pub(crate) async fn end_inconsistent(&self, contest: &Contest) {
        match self.store.finish(contest.id, None, Vec::new()).await {
            Ok(transition) => {
                if let Some(ended) = self.applied(transition).await {
                    self.clear_announcement(&ended).await;
                    self.notify_operator(announce::ended_without_winner(
                        &ended,
                        "no participants were found",
                    ))
                    .await;
                }
            }
            Err(e) => warn!(contest = %contest.id, error = %e, "could not end contest"),
        }
    }

    /// Re-renders the roster every tick until the window expires, then hands
    /// the decision to the operator. The contest stays `AwaitingDecision`.
    async fn run_countdown(
        &self,
        contest: Contest,
        participants: Vec<Participant>,
        lease: &PhaseLease,
    ) {
        let window = contest.second_window_or(self.config.default_second_window);
        let remaining = window.saturating_sub(contest.elapsed_in_phase(Utc::now()));
        let deadline = deadline_after(remaining);
        info!(remaining_secs = remaining.as_secs(), "decision countdown started");

        loop {
            let next = (Instant::now() + self.config.countdown_tick).min(deadline);
            if !lease.sleep_until(next).await {
                return;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }

            match self.store.contest(contest.id).await {
                Ok(Some(current)) if current.status == ContestStatus::AwaitingDecision => {
                    if let Some(message) = current.announcement {
                        self.edit(message, announce::roster(&current, &participants, left))
                            .await;
                    }
                }
                Ok(_) => return,
                Err(e) => warn!(error = %e, "could not refresh countdown"),
            }
        }

        if lease.is_cancelled() {
            return;
        }
        info!("decision window expired, waiting for the operator");
        self.notify_operator(announce::decision_due(&contest, &participants))
            .await;
    }

    /// Draws one participant and finishes the contest with them.
    async fn draw(&self, contest: Contest, participants: Vec<Participant>, lease: &PhaseLease) {
        let Some(winner) = pick_random(&participants).cloned() else {
            return;
        };

        let Some(transition) = self
            .retry(lease, "finishing the draw", || {
                self.store.finish(
                    contest.id,
                    Some(ContestStatus::AwaitingDecision),
                    vec![winner.user],
                )
            })
            .await
        else {
            return;
        };
        let Some(ended) = self.applied(transition).await else {
            info!("contest left the decision phase before the draw finished");
            return;
        };

        info!(
            winner = %winner.user,
            position = winner.position,
            entrants = participants.len(),
            "random draw complete"
        );
        self.clear_announcement(&ended).await;
        let text = announce::draw_result(&ended, &winner, participants.len());
        self.post(Destination::Channel, text.clone()).await;
        self.notify_operator(text).await;
    }
}
