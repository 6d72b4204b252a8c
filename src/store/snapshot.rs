//! The contest tables and their on-disk snapshot.
//!
//! All store state lives in one [`StoreSnapshot`]. The table operations here
//! are synchronous and pure over `&mut self`; [`super::SnapshotStore`] wraps
//! them in a mutex so each one is a single atomic step, then persists.
//!
//! # Atomic Writes
//!
//! The snapshot is rewritten in full after every mutation:
//! 1. Write to `<path>.tmp`
//! 2. fsync the file
//! 3. Rename over `<path>`
//! 4. fsync the directory
//!
//! A reader therefore sees the previous or the next state, never a torn one.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fsync::{fsync_dir, fsync_file};
use super::{InsertOutcome, NewParticipant, Result, StoreError, Transition};
use crate::types::{
    Contest, ContestId, ContestKind, ContestStatus, MessageRef, NewContest, Participant,
    TallyEntry, UserId, UserStats, Winner, pick_marker,
};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Every persisted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,

    /// When this snapshot was last written.
    pub snapshot_at: DateTime<Utc>,

    /// Id handed to the next created contest.
    pub next_contest_id: u64,

    pub contests: BTreeMap<ContestId, Contest>,

    /// Participants per contest, in position order.
    pub participants: BTreeMap<ContestId, Vec<Participant>>,

    /// Activity counters per contest. Present only once initialised.
    pub tallies: BTreeMap<ContestId, BTreeMap<UserId, u32>>,

    pub winners: BTreeMap<ContestId, Vec<Winner>>,

    pub user_stats: BTreeMap<UserId, UserStats>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        StoreSnapshot::new()
    }
}

impl StoreSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        StoreSnapshot {
            schema_version: SCHEMA_VERSION,
            snapshot_at: Utc::now(),
            next_contest_id: 1,
            contests: BTreeMap::new(),
            participants: BTreeMap::new(),
            tallies: BTreeMap::new(),
            winners: BTreeMap::new(),
            user_stats: BTreeMap::new(),
        }
    }

    /// Updates the `snapshot_at` timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.snapshot_at = now;
    }

    // ─── Contests ───

    pub fn create_contest(&mut self, new: NewContest, now: DateTime<Utc>) -> Contest {
        let id = ContestId(self.next_contest_id);
        self.next_contest_id += 1;

        let contest = Contest {
            id,
            kind: new.kind,
            status: ContestStatus::Collecting,
            prize: new.prize,
            rules: new.rules,
            target: new.target,
            durations: new.durations,
            announcement: None,
            created_at: now,
            phase_started_at: now,
            ended_at: None,
        };
        self.contests.insert(id, contest.clone());
        self.participants.insert(id, Vec::new());
        contest
    }

    pub fn contest(&self, id: ContestId) -> Option<&Contest> {
        self.contests.get(&id)
    }

    fn contest_mut(&mut self, id: ContestId) -> Result<&mut Contest> {
        self.contests.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    /// Non-terminal contests in id order.
    pub fn active_contests(&self) -> Vec<Contest> {
        self.contests
            .values()
            .filter(|c| c.status.is_active())
            .cloned()
            .collect()
    }

    /// Compare-and-set on the status.
    ///
    /// Errors if the contest is unknown or `from -> to` is not on the kind's
    /// path. Returns [`Transition::Lost`] if the current status is not `from`.
    pub fn transition(
        &mut self,
        id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let contest = self.contest_mut(id)?;
        if !ContestStatus::can_transition(contest.kind, from, to) {
            return Err(StoreError::InvalidTransition {
                contest: id,
                kind: contest.kind,
                from,
                to,
            });
        }
        if contest.status != from {
            return Ok(Transition::Lost {
                current: contest.status,
            });
        }

        contest.status = to;
        contest.phase_started_at = now;
        if to.is_terminal() {
            contest.ended_at = Some(now);
        }
        Ok(Transition::Applied {
            from,
            contest: contest.clone(),
        })
    }

    pub fn set_announcement(&mut self, id: ContestId, message: Option<MessageRef>) -> Result<()> {
        self.contest_mut(id)?.announcement = message;
        Ok(())
    }

    /// Moves a contest to `Ended` and records its winners in one step.
    ///
    /// With `from` set, the move only applies from that status; with `None`
    /// it applies from any non-terminal status. Every winner must be a
    /// participant. Each winner's win count is bumped.
    pub fn finish(
        &mut self,
        id: ContestId,
        from: Option<ContestStatus>,
        winners: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let contest = self.contests.get(&id).ok_or(StoreError::NotFound(id))?;
        let current = contest.status;
        let expected_matches = match from {
            Some(expected) => expected == current,
            None => true,
        };
        if current.is_terminal() || !expected_matches {
            return Ok(Transition::Lost { current });
        }

        let roster = self.participants.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let mut rows = Vec::with_capacity(winners.len());
        for user in winners {
            let participant = roster
                .iter()
                .find(|p| p.user == *user)
                .ok_or(StoreError::NotParticipant {
                    contest: id,
                    user: *user,
                })?;
            if rows.iter().any(|w: &Winner| w.user == *user) {
                continue;
            }
            rows.push(Winner {
                contest: id,
                user: *user,
                position: participant.position,
                won_at: now,
            });
        }

        for row in &rows {
            self.user_stats.entry(row.user).or_default().wins += 1;
        }
        if !rows.is_empty() {
            self.winners.insert(id, rows);
        }

        let contest = self.contest_mut(id)?;
        contest.status = ContestStatus::Ended;
        contest.phase_started_at = now;
        contest.ended_at = Some(now);
        Ok(Transition::Applied {
            from: current,
            contest: contest.clone(),
        })
    }

    pub fn winners(&self, id: ContestId) -> Vec<Winner> {
        self.winners.get(&id).cloned().unwrap_or_default()
    }

    /// Winners of the most recently ended contest of `kind` that had any.
    pub fn latest_winners(&self, kind: ContestKind) -> Vec<Winner> {
        self.contests
            .values()
            .filter(|c| c.kind == kind && c.status.is_terminal())
            .filter(|c| self.winners.get(&c.id).is_some_and(|w| !w.is_empty()))
            .max_by_key(|c| (c.ended_at, c.id))
            .map(|c| self.winners(c.id))
            .unwrap_or_default()
    }

    // ─── Participants ───

    /// Admits a participant, assigning the next position and a marker.
    pub fn insert_participant(&mut self, new: NewParticipant) -> Result<InsertOutcome> {
        let contest = self
            .contests
            .get(&new.contest)
            .ok_or(StoreError::NotFound(new.contest))?;
        if contest.status != ContestStatus::Collecting {
            return Ok(InsertOutcome::Closed {
                status: contest.status,
            });
        }
        let cap = contest.rules.cap;

        let roster = self.participants.entry(new.contest).or_default();
        if roster.iter().any(|p| p.user == new.user) {
            return Ok(InsertOutcome::AlreadyRegistered);
        }
        if let Some(cap) = cap
            && roster.len() as u32 >= cap
        {
            return Ok(InsertOutcome::Full);
        }

        let position = roster.iter().map(|p| p.position).max().unwrap_or(0) + 1;
        let marker = pick_marker(roster.iter().map(|p| p.marker.as_str()), new.marker_seed);
        let participant = Participant {
            contest: new.contest,
            user: new.user,
            name: new.name,
            marker,
            position,
            joined_at: new.joined_at,
        };
        roster.push(participant.clone());
        Ok(InsertOutcome::Inserted(participant))
    }

    fn roster(&self, id: ContestId) -> Result<&[Participant]> {
        if !self.contests.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        Ok(self.participants.get(&id).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn participant_count(&self, id: ContestId) -> Result<u32> {
        Ok(self.roster(id)?.len() as u32)
    }

    /// Participants in position order.
    pub fn participants(&self, id: ContestId) -> Result<Vec<Participant>> {
        let mut roster = self.roster(id)?.to_vec();
        roster.sort_by_key(|p| p.position);
        Ok(roster)
    }

    pub fn participant_by_position(
        &self,
        id: ContestId,
        position: u32,
    ) -> Result<Option<Participant>> {
        Ok(self
            .roster(id)?
            .iter()
            .find(|p| p.position == position)
            .cloned())
    }

    // ─── Activity tallies ───

    /// Creates a zero counter for every participant. Existing counters are
    /// kept, so re-initialising after a restart loses nothing.
    pub fn init_tallies(&mut self, id: ContestId) -> Result<()> {
        let users: Vec<UserId> = self.roster(id)?.iter().map(|p| p.user).collect();
        let tallies = self.tallies.entry(id).or_default();
        for user in users {
            tallies.entry(user).or_insert(0);
        }
        Ok(())
    }

    /// Bumps a participant's counter. Returns false if no counter exists.
    pub fn increment_tally(&mut self, id: ContestId, user: UserId) -> Result<bool> {
        if !self.contests.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        match self.tallies.get_mut(&id).and_then(|t| t.get_mut(&user)) {
            Some(count) => {
                *count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Counters joined with participants, count descending, ties by
    /// ascending position.
    pub fn leaderboard(&self, id: ContestId) -> Result<Vec<TallyEntry>> {
        let roster = self.roster(id)?;
        let Some(tallies) = self.tallies.get(&id) else {
            return Ok(Vec::new());
        };

        let mut board: Vec<TallyEntry> = roster
            .iter()
            .filter_map(|p| {
                tallies.get(&p.user).map(|count| TallyEntry {
                    user: p.user,
                    position: p.position,
                    marker: p.marker.clone(),
                    name: p.name.clone(),
                    count: *count,
                })
            })
            .collect();
        board.sort_by(|a, b| b.count.cmp(&a.count).then(a.position.cmp(&b.position)));
        Ok(board)
    }

    // ─── User stats ───

    pub fn user_stats(&self, user: UserId) -> UserStats {
        self.user_stats.get(&user).copied().unwrap_or_default()
    }

    pub fn record_participation(&mut self, user: UserId) -> UserStats {
        let stats = self.user_stats.entry(user).or_default();
        stats.contests += 1;
        *stats
    }

    pub fn add_referral(&mut self, user: UserId) -> UserStats {
        let stats = self.user_stats.entry(user).or_default();
        stats.referrals += 1;
        *stats
    }
}

/// Saves a snapshot atomically to disk.
///
/// # Errors
///
/// Returns an error if any IO operation or serialization fails.
pub fn save_snapshot_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Loads a snapshot, rejecting other schema versions.
pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot> {
    let bytes = std::fs::read(path)?;
    let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;

    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: snapshot.schema_version,
        });
    }

    Ok(snapshot)
}

/// Like [`load_snapshot`], but a missing file is `Ok(None)`.
pub fn try_load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    match load_snapshot(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{new_contest, new_participant};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn with_contest(kind: ContestKind, target: u32) -> (StoreSnapshot, ContestId) {
        let mut snapshot = StoreSnapshot::new();
        let contest = snapshot.create_contest(new_contest(kind, target), at(0));
        (snapshot, contest.id)
    }

    fn admit(snapshot: &mut StoreSnapshot, id: ContestId, user: i64) -> Participant {
        match snapshot
            .insert_participant(new_participant(id, user))
            .unwrap()
        {
            InsertOutcome::Inserted(p) => p,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    // ─── Contests ───

    #[test]
    fn ids_are_sequential_from_one() {
        let mut snapshot = StoreSnapshot::new();
        let a = snapshot.create_contest(new_contest(ContestKind::RandomDraw, 2), at(0));
        let b = snapshot.create_contest(new_contest(ContestKind::RandomDraw, 2), at(0));
        assert_eq!(a.id, ContestId(1));
        assert_eq!(b.id, ContestId(2));
        assert_eq!(a.status, ContestStatus::Collecting);
    }

    #[test]
    fn transition_is_compare_and_set() {
        let (mut snapshot, id) = with_contest(ContestKind::ManualSelection, 3);

        let first = snapshot
            .transition(id, ContestStatus::Collecting, ContestStatus::AwaitingDecision, at(5))
            .unwrap();
        let Transition::Applied { contest, from } = first else {
            panic!("first transition should apply");
        };
        assert_eq!(from, ContestStatus::Collecting);
        assert_eq!(contest.phase_started_at, at(5));

        let second = snapshot
            .transition(id, ContestStatus::Collecting, ContestStatus::AwaitingDecision, at(6))
            .unwrap();
        assert_eq!(
            second,
            Transition::Lost {
                current: ContestStatus::AwaitingDecision
            }
        );
    }

    #[test]
    fn transition_rejects_paths_outside_the_kind() {
        let (mut snapshot, id) = with_contest(ContestKind::ActivityCount, 3);
        let err = snapshot
            .transition(id, ContestStatus::Collecting, ContestStatus::AwaitingDecision, at(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn transition_on_unknown_contest_is_not_found() {
        let mut snapshot = StoreSnapshot::new();
        let err = snapshot
            .transition(
                ContestId(9),
                ContestStatus::Collecting,
                ContestStatus::Ended,
                at(0),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ContestId(9))));
    }

    #[test]
    fn finish_records_winners_and_bumps_wins() {
        let (mut snapshot, id) = with_contest(ContestKind::RandomDraw, 3);
        admit(&mut snapshot, id, 10);
        let p = admit(&mut snapshot, id, 11);

        let result = snapshot.finish(id, None, &[UserId(11)], at(9)).unwrap();
        let Transition::Applied { contest, .. } = result else {
            panic!("finish should apply");
        };
        assert_eq!(contest.status, ContestStatus::Ended);
        assert_eq!(contest.ended_at, Some(at(9)));

        let winners = snapshot.winners(id);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].position, p.position);
        assert_eq!(snapshot.user_stats(UserId(11)).wins, 1);

        // Second finish loses and records nothing more.
        let again = snapshot.finish(id, None, &[UserId(10)], at(10)).unwrap();
        assert_eq!(
            again,
            Transition::Lost {
                current: ContestStatus::Ended
            }
        );
        assert_eq!(snapshot.winners(id).len(), 1);
        assert_eq!(snapshot.user_stats(UserId(10)).wins, 0);
    }

    #[test]
    fn finish_with_expected_status_respects_it() {
        let (mut snapshot, id) = with_contest(ContestKind::RandomDraw, 3);
        admit(&mut snapshot, id, 10);
        let result = snapshot
            .finish(id, Some(ContestStatus::AwaitingDecision), &[UserId(10)], at(1))
            .unwrap();
        assert_eq!(
            result,
            Transition::Lost {
                current: ContestStatus::Collecting
            }
        );
        assert!(snapshot.winners(id).is_empty());
    }

    #[test]
    fn finish_rejects_non_participants_without_mutating() {
        let (mut snapshot, id) = with_contest(ContestKind::ManualSelection, 3);
        admit(&mut snapshot, id, 10);
        let err = snapshot
            .finish(id, None, &[UserId(10), UserId(99)], at(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotParticipant { .. }));
        assert_eq!(
            snapshot.contest(id).unwrap().status,
            ContestStatus::Collecting
        );
        assert_eq!(snapshot.user_stats(UserId(10)).wins, 0);
    }

    #[test]
    fn latest_winners_tracks_most_recent_contest_of_kind() {
        let mut snapshot = StoreSnapshot::new();
        let first = snapshot
            .create_contest(new_contest(ContestKind::RandomDraw, 1), at(0))
            .id;
        let other_kind = snapshot
            .create_contest(new_contest(ContestKind::ManualSelection, 1), at(0))
            .id;
        let second = snapshot
            .create_contest(new_contest(ContestKind::RandomDraw, 1), at(0))
            .id;
        let empty = snapshot
            .create_contest(new_contest(ContestKind::RandomDraw, 1), at(0))
            .id;

        admit(&mut snapshot, first, 1);
        admit(&mut snapshot, other_kind, 2);
        admit(&mut snapshot, second, 3);

        snapshot.finish(first, None, &[UserId(1)], at(10)).unwrap();
        snapshot.finish(second, None, &[UserId(3)], at(20)).unwrap();
        snapshot.finish(other_kind, None, &[UserId(2)], at(30)).unwrap();
        snapshot.finish(empty, None, &[], at(40)).unwrap();

        let latest = snapshot.latest_winners(ContestKind::RandomDraw);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].user, UserId(3));
        assert!(snapshot.latest_winners(ContestKind::ActivityCount).is_empty());
    }

    // ─── Participants ───

    #[test]
    fn insert_assigns_positions_and_refuses_duplicates() {
        let (mut snapshot, id) = with_contest(ContestKind::RandomDraw, 5);
        assert_eq!(admit(&mut snapshot, id, 1).position, 1);
        assert_eq!(admit(&mut snapshot, id, 2).position, 2);
        assert_eq!(
            snapshot.insert_participant(new_participant(id, 1)).unwrap(),
            InsertOutcome::AlreadyRegistered
        );
        assert_eq!(snapshot.participant_count(id).unwrap(), 2);
    }

    #[test]
    fn insert_respects_cap_and_status() {
        let mut snapshot = StoreSnapshot::new();
        let mut params = new_contest(ContestKind::RandomDraw, 5);
        params.rules.cap = Some(1);
        let id = snapshot.create_contest(params, at(0)).id;

        admit(&mut snapshot, id, 1);
        assert_eq!(
            snapshot.insert_participant(new_participant(id, 2)).unwrap(),
            InsertOutcome::Full
        );

        snapshot
            .transition(id, ContestStatus::Collecting, ContestStatus::AwaitingDecision, at(1))
            .unwrap();
        assert_eq!(
            snapshot.insert_participant(new_participant(id, 3)).unwrap(),
            InsertOutcome::Closed {
                status: ContestStatus::AwaitingDecision
            }
        );
    }

    #[test]
    fn participant_lookup_by_position() {
        let (mut snapshot, id) = with_contest(ContestKind::ManualSelection, 5);
        admit(&mut snapshot, id, 7);
        admit(&mut snapshot, id, 8);
        let found = snapshot.participant_by_position(id, 2).unwrap().unwrap();
        assert_eq!(found.user, UserId(8));
        assert!(snapshot.participant_by_position(id, 3).unwrap().is_none());
    }

    // ─── Activity tallies ───

    #[test]
    fn tallies_only_count_participants() {
        let (mut snapshot, id) = with_contest(ContestKind::ActivityCount, 2);
        admit(&mut snapshot, id, 1);
        assert!(!snapshot.increment_tally(id, UserId(1)).unwrap());

        snapshot.init_tallies(id).unwrap();
        assert!(snapshot.increment_tally(id, UserId(1)).unwrap());
        assert!(!snapshot.increment_tally(id, UserId(2)).unwrap());
    }

    #[test]
    fn init_tallies_keeps_existing_counts() {
        let (mut snapshot, id) = with_contest(ContestKind::ActivityCount, 2);
        admit(&mut snapshot, id, 1);
        snapshot.init_tallies(id).unwrap();
        snapshot.increment_tally(id, UserId(1)).unwrap();
        snapshot.init_tallies(id).unwrap();
        assert_eq!(snapshot.leaderboard(id).unwrap()[0].count, 1);
    }

    #[test]
    fn leaderboard_breaks_ties_by_position() {
        let (mut snapshot, id) = with_contest(ContestKind::ActivityCount, 3);
        for user in [1, 2, 3] {
            admit(&mut snapshot, id, user);
        }
        snapshot.init_tallies(id).unwrap();
        for user in [3, 3, 2, 2, 1] {
            snapshot.increment_tally(id, UserId(user)).unwrap();
        }

        let order: Vec<(i64, u32)> = snapshot
            .leaderboard(id)
            .unwrap()
            .iter()
            .map(|e| (e.user.0, e.count))
            .collect();
        assert_eq!(order, vec![(2, 2), (3, 2), (1, 1)]);
    }

    // ─── Files ───

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("contests.json");

        let (mut snapshot, id) = with_contest(ContestKind::ActivityCount, 2);
        admit(&mut snapshot, id, 1);
        snapshot.init_tallies(id).unwrap();
        snapshot.record_participation(UserId(1));

        save_snapshot_atomic(&path, &snapshot).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        assert!(
            try_load_snapshot(&dir.path().join("absent.json"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contests.json");
        let mut snapshot = StoreSnapshot::new();
        snapshot.schema_version = SCHEMA_VERSION + 1;
        save_snapshot_atomic(&path, &snapshot).unwrap();

        let err = try_load_snapshot(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaMismatch { expected, got } if expected == SCHEMA_VERSION && got == SCHEMA_VERSION + 1
        ));
    }

    proptest! {
        /// Positions stay gap-free under any mix of new and repeated users.
        #[test]
        fn positions_are_gap_free(users in prop::collection::vec(0i64..30, 1..60)) {
            let (mut snapshot, id) = with_contest(ContestKind::RandomDraw, 100);
            for user in &users {
                snapshot.insert_participant(new_participant(id, *user)).unwrap();
            }

            let roster = snapshot.participants(id).unwrap();
            let positions: Vec<u32> = roster.iter().map(|p| p.position).collect();
            let expected: Vec<u32> = (1..=roster.len() as u32).collect();
            prop_assert_eq!(positions, expected);

            let mut seen: Vec<i64> = roster.iter().map(|p| p.user.0).collect();
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), roster.len());
        }
    }
}
