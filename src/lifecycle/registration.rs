//! Admission of one participant into one collecting contest.
//!
//! Checks run in a fixed order, cheapest rejection first:
//! 1. the message predates the contest (ignored silently)
//! 2. channel membership; a failed lookup counts as not subscribed
//! 3. entry rules against the user's live stats
//! 4. the user won the most recent finished contest of the same kind
//!
//! The store insert is the uniqueness gate. It assigns the position and the
//! marker, and refuses when the cap is reached or collection has closed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::{Engine, LifecycleEvent};
use crate::announce;
use crate::eligibility::{self, RuleViolation};
use crate::store::{InsertOutcome, NewParticipant, Store, StoreError};
use crate::transport::Transport;
use crate::types::{Contest, DisplayName, Participant, UserId};

/// Someone asking to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user: UserId,
    pub name: DisplayName,

    /// When their message was sent.
    pub sent_at: DateTime<Utc>,
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotSubscribed,
    Ineligible(RuleViolation),
    RecentWinner,
    Full,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotSubscribed => f.write_str("not subscribed to the channel"),
            Rejection::Ineligible(violation) => write!(f, "{}", violation),
            Rejection::RecentWinner => f.write_str("won the previous contest of this kind"),
            Rejection::Full => f.write_str("the contest is full"),
        }
    }
}

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Admitted(Participant),
    Rejected(Rejection),
    AlreadyRegistered,

    /// Stale message, or the contest stopped collecting.
    Ignored,
}

impl<S: Store, T: Transport> Engine<S, T> {
    /// Attempts to admit `candidate` into `contest`.
    ///
    /// On admission the participant's contest count is bumped, an
    /// [`LifecycleEvent::Admitted`] is published, and reaching the target
    /// closes collection immediately instead of waiting for the next poll.
    #[instrument(skip(self, contest, candidate), fields(contest = %contest.id, user = %candidate.user))]
    pub async fn register(
        self: &Arc<Self>,
        contest: &Contest,
        candidate: Candidate,
    ) -> Result<Registration, StoreError> {
        if candidate.sent_at < contest.created_at {
            debug!("message predates the contest, ignored");
            return Ok(Registration::Ignored);
        }

        match self.transport.membership(candidate.user).await {
            Ok(status) if status.is_subscribed() => {}
            Ok(status) => {
                debug!(?status, "not subscribed");
                return Ok(Registration::Rejected(Rejection::NotSubscribed));
            }
            Err(e) => {
                warn!(error = %e, "membership lookup failed, treating as not subscribed");
                return Ok(Registration::Rejected(Rejection::NotSubscribed));
            }
        }

        let stats = self.store.user_stats(candidate.user).await?;
        if let Err(violation) = eligibility::evaluate(&stats, &contest.rules) {
            debug!(rule = violation.rule.name(), "entry rule not met");
            return Ok(Registration::Rejected(Rejection::Ineligible(violation)));
        }

        let recent = self.store.latest_winners(contest.kind).await?;
        if recent.iter().any(|w| w.user == candidate.user) {
            debug!("won the previous contest of this kind");
            return Ok(Registration::Rejected(Rejection::RecentWinner));
        }

        let outcome = self
            .store
            .insert_participant(NewParticipant {
                contest: contest.id,
                user: candidate.user,
                name: candidate.name,
                marker_seed: rand::random(),
                joined_at: candidate.sent_at,
            })
            .await?;

        let participant = match outcome {
            InsertOutcome::Inserted(participant) => participant,
            InsertOutcome::AlreadyRegistered => return Ok(Registration::AlreadyRegistered),
            InsertOutcome::Full => return Ok(Registration::Rejected(Rejection::Full)),
            InsertOutcome::Closed { status } => {
                debug!(%status, "collection closed before insert");
                return Ok(Registration::Ignored);
            }
        };

        if let Err(e) = self.store.record_participation(candidate.user).await {
            warn!(error = %e, "could not record participation");
        }
        self.emit(LifecycleEvent::Admitted {
            contest: contest.id,
            user: participant.user,
            position: participant.position,
        });
        info!(
            position = participant.position,
            marker = %participant.marker,
            "participant admitted"
        );

        let count = self.store.participant_count(contest.id).await?;
        if count >= contest.target {
            self.close_collection(contest.id).await?;
        } else if let Some(message) = contest.announcement {
            self.edit(message, announce::collection(contest, count))
                .await;
        }

        Ok(Registration::Admitted(participant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::Rule;

    #[test]
    fn rejection_reasons_read_as_sentences() {
        assert_eq!(
            Rejection::NotSubscribed.to_string(),
            "not subscribed to the channel"
        );
        let violation = RuleViolation {
            rule: Rule::MaxContests,
            required: 0,
            observed: 2,
        };
        assert_eq!(
            Rejection::Ineligible(violation).to_string(),
            "at most 0 previous contests are allowed, you have 2"
        );
    }
}
