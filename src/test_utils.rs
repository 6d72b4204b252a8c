//! Shared fixtures, a recording transport and a store that fails on demand.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::store::{self, InsertOutcome, NewParticipant, Store, StoreError, Transition};
use crate::transport::{Destination, Membership, Result, Transport, TransportError};
use crate::types::{
    ChatId, Contest, ContestId, ContestKind, ContestStatus, DisplayName, EntryRules, MessageId,
    MessageRef, NewContest, Participant, PhaseDurations, TallyEntry, UserId, UserStats, Winner,
};

pub const COLLECTION_WINDOW: Duration = Duration::from_secs(600);
pub const SECOND_WINDOW: Duration = Duration::from_secs(300);

/// Creation parameters with open rules and the default windows.
pub fn new_contest(kind: ContestKind, target: u32) -> NewContest {
    NewContest {
        kind,
        prize: "100 stars".to_string(),
        rules: EntryRules::default(),
        target,
        durations: PhaseDurations::new(
            COLLECTION_WINDOW,
            kind.has_second_window().then_some(SECOND_WINDOW),
        ),
    }
}

pub fn display_name(user: i64) -> DisplayName {
    DisplayName::new(Some(format!("user{user}")), format!("User {user}"))
}

pub fn new_participant(contest: ContestId, user: i64) -> NewParticipant {
    NewParticipant {
        contest,
        user: UserId(user),
        name: display_name(user),
        marker_seed: user as u64,
        joined_at: Utc::now(),
    }
}

/// A collecting contest record that was never stored.
pub fn contest_record(kind: ContestKind, target: u32) -> Contest {
    let params = new_contest(kind, target);
    let now = Utc::now();
    Contest {
        id: ContestId(1),
        kind,
        status: ContestStatus::Collecting,
        prize: params.prize,
        rules: params.rules,
        target,
        durations: params.durations,
        announcement: None,
        created_at: now,
        phase_started_at: now,
        ended_at: None,
    }
}

pub fn participant(contest: ContestId, position: u32, user: i64) -> Participant {
    Participant {
        contest,
        user: UserId(user),
        name: display_name(user),
        marker: "😈".to_string(),
        position,
        joined_at: Utc::now(),
    }
}

/// One outbound call seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send {
        to: Destination,
        message: MessageRef,
        text: String,
    },
    Reply {
        to: MessageRef,
        text: String,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Delete {
        message: MessageRef,
    },
}

/// Records every call. Users are members unless configured otherwise.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    memberships: Mutex<HashMap<UserId, Membership>>,
    failing_lookups: Mutex<HashSet<UserId>>,
    next_message: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport::default()
    }

    pub fn set_membership(&self, user: UserId, membership: Membership) {
        self.memberships.lock().unwrap().insert(user, membership);
    }

    /// Makes membership lookups for `user` fail.
    pub fn fail_lookup(&self, user: UserId) {
        self.failing_lookups.lock().unwrap().insert(user);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts sent to `to`, in order.
    pub fn sent_to(&self, to: Destination) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { to: dest, text, .. } if dest == to => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Replies as (answered message, text), in order.
    pub fn replies(&self) -> Vec<(MessageRef, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Reply { to, text } => Some((to, text)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, to: Destination, text: String) -> Result<MessageRef> {
        let id = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        let chat = match to {
            Destination::Channel => ChatId(-100),
            Destination::Operator => ChatId(1),
        };
        let message = MessageRef::new(chat, MessageId(id));
        self.calls
            .lock()
            .unwrap()
            .push(Call::Send { to, message, text });
        Ok(message)
    }

    async fn reply(&self, to: MessageRef, text: String) -> Result<MessageRef> {
        let id = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        self.calls.lock().unwrap().push(Call::Reply { to, text });
        Ok(MessageRef::new(to.chat, MessageId(id)))
    }

    async fn edit(&self, message: MessageRef, text: String) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Edit { message, text });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete { message });
        Ok(())
    }

    async fn membership(&self, user: UserId) -> Result<Membership> {
        if self.failing_lookups.lock().unwrap().contains(&user) {
            return Err(TransportError::Unavailable("lookup failed".to_string()));
        }
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .get(&user)
            .copied()
            .unwrap_or(Membership::Member))
    }
}

/// Wraps a store and fails the next N calls of chosen methods with an IO
/// error. Every other call goes straight through.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failures: Mutex<HashMap<&'static str, u32>>,
}

impl<S: Store> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        FlakyStore {
            inner,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Makes the next `times` calls of `method` fail.
    pub fn fail_next(&self, method: &'static str, times: u32) {
        self.failures.lock().unwrap().insert(method, times);
    }

    /// Failures still queued for `method`.
    pub fn pending(&self, method: &'static str) -> u32 {
        self.failures
            .lock()
            .unwrap()
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn trip(&self, method: &'static str) -> store::Result<()> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(method) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(StoreError::Io(io::Error::other(format!(
                    "injected {method} failure"
                ))))
            }
            _ => Ok(()),
        }
    }
}

impl<S: Store> Store for FlakyStore<S> {
    async fn create_contest(&self, new: NewContest) -> store::Result<Contest> {
        self.trip("create_contest")?;
        self.inner.create_contest(new).await
    }

    async fn contest(&self, id: ContestId) -> store::Result<Option<Contest>> {
        self.trip("contest")?;
        self.inner.contest(id).await
    }

    async fn active_contests(&self) -> store::Result<Vec<Contest>> {
        self.trip("active_contests")?;
        self.inner.active_contests().await
    }

    async fn transition(
        &self,
        id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> store::Result<Transition> {
        self.trip("transition")?;
        self.inner.transition(id, from, to).await
    }

    async fn set_announcement(
        &self,
        id: ContestId,
        message: Option<MessageRef>,
    ) -> store::Result<()> {
        self.trip("set_announcement")?;
        self.inner.set_announcement(id, message).await
    }

    async fn insert_participant(&self, new: NewParticipant) -> store::Result<InsertOutcome> {
        self.trip("insert_participant")?;
        self.inner.insert_participant(new).await
    }

    async fn participant_count(&self, id: ContestId) -> store::Result<u32> {
        self.trip("participant_count")?;
        self.inner.participant_count(id).await
    }

    async fn participants(&self, id: ContestId) -> store::Result<Vec<Participant>> {
        self.trip("participants")?;
        self.inner.participants(id).await
    }

    async fn participant_by_position(
        &self,
        id: ContestId,
        position: u32,
    ) -> store::Result<Option<Participant>> {
        self.trip("participant_by_position")?;
        self.inner.participant_by_position(id, position).await
    }

    async fn init_tallies(&self, id: ContestId) -> store::Result<()> {
        self.trip("init_tallies")?;
        self.inner.init_tallies(id).await
    }

    async fn increment_tally(&self, id: ContestId, user: UserId) -> store::Result<bool> {
        self.trip("increment_tally")?;
        self.inner.increment_tally(id, user).await
    }

    async fn leaderboard(&self, id: ContestId) -> store::Result<Vec<TallyEntry>> {
        self.trip("leaderboard")?;
        self.inner.leaderboard(id).await
    }

    async fn finish(
        &self,
        id: ContestId,
        from: Option<ContestStatus>,
        winners: Vec<UserId>,
    ) -> store::Result<Transition> {
        self.trip("finish")?;
        self.inner.finish(id, from, winners).await
    }

    async fn winners(&self, id: ContestId) -> store::Result<Vec<Winner>> {
        self.trip("winners")?;
        self.inner.winners(id).await
    }

    async fn latest_winners(&self, kind: ContestKind) -> store::Result<Vec<Winner>> {
        self.trip("latest_winners")?;
        self.inner.latest_winners(kind).await
    }

    async fn user_stats(&self, user: UserId) -> store::Result<UserStats> {
        self.trip("user_stats")?;
        self.inner.user_stats(user).await
    }

    async fn record_participation(&self, user: UserId) -> store::Result<UserStats> {
        self.trip("record_participation")?;
        self.inner.record_participation(user).await
    }

    async fn add_referral(&self, user: UserId) -> store::Result<UserStats> {
        self.trip("add_referral")?;
        self.inner.add_referral(user).await
    }
}
