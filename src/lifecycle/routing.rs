//! Inbound channel messages.
//!
//! Every message is offered to each active contest: collecting contests treat
//! it as a registration attempt, running activity contests count it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{Candidate, Engine, Registration};
use crate::announce;
use crate::store::{Store, StoreError};
use crate::transport::Transport;
use crate::types::{ContestId, ContestKind, ContestStatus, DisplayName, MessageRef, UserId};

/// A message posted under the channel by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// The comment itself; rejections are sent as replies to it.
    pub message: MessageRef,
    pub sender: UserId,
    pub name: DisplayName,
    pub sent_at: DateTime<Utc>,
}

/// What one message did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routed {
    pub registrations: Vec<(ContestId, Registration)>,

    /// Activity contests whose tally for the sender was bumped.
    pub tallied: Vec<ContestId>,
}

impl<S: Store, T: Transport> Engine<S, T> {
    /// Routes one channel message to every collecting contest and every
    /// running activity contest.
    ///
    /// A rejected registration is answered with the reason. Per-contest
    /// failures are logged and do not stop the other contests.
    pub async fn on_channel_message(
        self: &Arc<Self>,
        message: ChannelMessage,
    ) -> Result<Routed, StoreError> {
        let mut routed = Routed::default();

        for contest in self.store.active_contests().await? {
            match (contest.status, contest.kind) {
                (ContestStatus::Collecting, _) => {
                    let candidate = Candidate {
                        user: message.sender,
                        name: message.name.clone(),
                        sent_at: message.sent_at,
                    };
                    match self.register(&contest, candidate).await {
                        Ok(outcome) => {
                            if let Registration::Rejected(rejection) = &outcome {
                                self.reply(message.message, announce::rejected(&contest, rejection))
                                    .await;
                            }
                            routed.registrations.push((contest.id, outcome));
                        }
                        Err(e) => warn!(contest = %contest.id, error = %e, "registration failed"),
                    }
                }
                (ContestStatus::Running, ContestKind::ActivityCount) => {
                    if message.sent_at < contest.phase_started_at {
                        debug!(contest = %contest.id, "message predates the activity window");
                        continue;
                    }
                    match self.store.increment_tally(contest.id, message.sender).await {
                        Ok(true) => routed.tallied.push(contest.id),
                        Ok(false) => {}
                        Err(e) => warn!(contest = %contest.id, error = %e, "tally failed"),
                    }
                }
                _ => {}
            }
        }

        Ok(routed)
    }
}
