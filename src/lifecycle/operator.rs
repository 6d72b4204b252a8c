//! Operator operations: create, force start, cancel, select winners.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{Engine, OperatorError, Phase, PhaseKey, Result};
use crate::announce;
use crate::store::{Store, StoreError, Transition};
use crate::transport::{Destination, Transport};
use crate::types::{Contest, ContestId, ContestKind, ContestStatus, NewContest, Participant};

impl<S: Store, T: Transport> Engine<S, T> {
    async fn require_contest(&self, id: ContestId) -> Result<Contest> {
        self.store
            .contest(id)
            .await?
            .ok_or(OperatorError::NotFound(id))
    }

    /// Validates, persists and announces a contest, then starts its
    /// collection runner.
    #[instrument(skip(self, new), fields(kind = %new.kind))]
    pub async fn create_contest(self: &Arc<Self>, new: NewContest) -> Result<Contest> {
        new.validate()?;
        let mut contest = self.store.create_contest(new).await?;

        if let Some(message) = self
            .post(Destination::Channel, announce::collection(&contest, 0))
            .await
        {
            match self.store.set_announcement(contest.id, Some(message)).await {
                Ok(()) => contest.announcement = Some(message),
                Err(e) => warn!(contest = %contest.id, error = %e, "could not record announcement"),
            }
        }

        self.spawn_collection(contest.id)?;
        info!(contest = %contest.id, target = contest.target, "contest created");
        Ok(contest)
    }

    /// Closes collection early. Requires at least one participant.
    #[instrument(skip(self))]
    pub async fn force_start(self: &Arc<Self>, id: ContestId) -> Result<Contest> {
        let contest = self.require_contest(id).await?;
        if contest.status != ContestStatus::Collecting {
            return Err(OperatorError::WrongStatus {
                contest: id,
                status: contest.status,
            });
        }
        if self.store.participant_count(id).await? == 0 {
            return Err(OperatorError::NoParticipants(id));
        }

        match self.close_collection(id).await? {
            Some(next) => {
                info!(contest = %id, status = %next.status, "collection closed by operator");
                Ok(next)
            }
            None => {
                let current = self.require_contest(id).await?;
                Err(OperatorError::WrongStatus {
                    contest: id,
                    status: current.status,
                })
            }
        }
    }

    /// Ends any non-terminal contest without a winner. Ending an already
    /// ended contest is a no-op that returns it unchanged.
    #[instrument(skip(self))]
    pub async fn cancel_contest(self: &Arc<Self>, id: ContestId) -> Result<Contest> {
        let contest = self.require_contest(id).await?;
        if contest.status.is_terminal() {
            return Ok(contest);
        }

        let stopped = self.supervisor.cancel_contest(id).await;
        let transition = self.store.finish(id, None, Vec::new()).await?;
        match self.applied(transition).await {
            Some(ended) => {
                info!(contest = %id, runners = stopped, "contest cancelled");
                self.clear_announcement(&ended).await;
                Ok(ended)
            }
            None => self.require_contest(id).await,
        }
    }

    /// Records the operator's pick for a manual contest and ends it.
    ///
    /// `positions` are participant positions; duplicates are ignored.
    #[instrument(skip(self))]
    pub async fn select_winners(
        self: &Arc<Self>,
        id: ContestId,
        positions: &[u32],
    ) -> Result<Vec<Participant>> {
        if positions.is_empty() {
            return Err(OperatorError::NoPositions);
        }
        let contest = self.require_contest(id).await?;
        if contest.kind != ContestKind::ManualSelection {
            return Err(OperatorError::WrongKind {
                contest: id,
                kind: contest.kind,
            });
        }
        if contest.status != ContestStatus::AwaitingDecision {
            return Err(OperatorError::WrongStatus {
                contest: id,
                status: contest.status,
            });
        }

        let mut winners: Vec<Participant> = Vec::with_capacity(positions.len());
        for &position in positions {
            if winners.iter().any(|w| w.position == position) {
                continue;
            }
            let participant = self
                .store
                .participant_by_position(id, position)
                .await?
                .ok_or(OperatorError::UnknownPosition {
                    contest: id,
                    position,
                })?;
            winners.push(participant);
        }

        self.supervisor
            .cancel(PhaseKey::new(id, Phase::Decision))
            .await;
        let users = winners.iter().map(|w| w.user).collect();
        let transition = match self
            .store
            .finish(id, Some(ContestStatus::AwaitingDecision), users)
            .await
        {
            Ok(transition) => transition,
            Err(e) => {
                self.resume_decision(id);
                return Err(e.into());
            }
        };

        match transition {
            Transition::Lost { current } => Err(OperatorError::WrongStatus {
                contest: id,
                status: current,
            }),
            applied => {
                if let Some(ended) = self.applied(applied).await {
                    info!(contest = %id, winners = winners.len(), "winners selected");
                    self.clear_announcement(&ended).await;
                    self.post(Destination::Channel, announce::winners(&ended, &winners))
                        .await;
                }
                Ok(winners)
            }
        }
    }

    fn resume_decision(self: &Arc<Self>, id: ContestId) {
        if let Err(e) = self.spawn_decision(id) {
            warn!(contest = %id, error = %e, "could not resume decision countdown");
        }
    }

    /// Every non-terminal contest.
    pub async fn active_contests(&self) -> std::result::Result<Vec<Contest>, StoreError> {
        self.store.active_contests().await
    }
}
