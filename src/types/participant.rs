//! Participant, tally, winner and user-stat records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ContestId, UserId};

/// Palette of visual markers handed out to participants.
pub const MARKER_PALETTE: [&str; 15] = [
    "😈", "❤️", "💩", "🏆", "👻", "🔥", "💊", "💅", "🙈", "🕊", "👀", "😡", "🐳", "💯", "👍",
];

/// Picks a marker for a new participant given the markers already in use.
///
/// An unused palette entry is chosen when one remains; afterwards any entry may
/// repeat. `seed` is the caller's random draw so the choice itself stays pure
/// and can run inside the store's atomic insert.
pub fn pick_marker<'a>(used: impl IntoIterator<Item = &'a str>, seed: u64) -> String {
    let used: Vec<&str> = used.into_iter().collect();
    let unused: Vec<&str> = MARKER_PALETTE
        .iter()
        .copied()
        .filter(|m| !used.contains(m))
        .collect();

    let pool: &[&str] = if unused.is_empty() {
        &MARKER_PALETTE
    } else {
        &unused
    };
    pool[(seed % pool.len() as u64) as usize].to_string()
}

/// How a user is shown in announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName {
    pub username: Option<String>,
    pub full_name: String,
}

impl DisplayName {
    pub fn new(username: Option<String>, full_name: impl Into<String>) -> Self {
        DisplayName {
            username: username.filter(|u| !u.is_empty()),
            full_name: full_name.into(),
        }
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(username) => write!(f, "@{}", username),
            None => f.write_str(&self.full_name),
        }
    }
}

/// An admitted participant of one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub contest: ContestId,
    pub user: UserId,
    pub name: DisplayName,
    pub marker: String,

    /// 1-based admission order, gap-free within a contest.
    pub position: u32,

    pub joined_at: DateTime<Utc>,
}

/// One row of an activity leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub user: UserId,
    pub position: u32,
    pub marker: String,
    pub name: DisplayName,
    pub count: u32,
}

/// A recorded winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub contest: ContestId,
    pub user: UserId,

    /// The winner's participant position.
    pub position: u32,

    pub won_at: DateTime<Utc>,
}

/// Aggregate per-user counters read by the eligibility filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Contests entered.
    pub contests: u32,

    /// Contests won.
    pub wins: u32,

    /// Referred users who subscribed.
    pub referrals: u32,
}
