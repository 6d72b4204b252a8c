//! Contest record, kind and status types.
//!
//! The status machine is encoded here as pure data so both the store's
//! compare-and-set and the phase runners agree on which transitions exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::ids::{ContestId, MessageRef};

/// How a contest decides its winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestKind {
    /// The operator picks one or more winners from the published roster.
    ManualSelection,

    /// One participant is drawn uniformly at random.
    RandomDraw,

    /// Participants compete on message count during a second timed window.
    ActivityCount,
}

impl ContestKind {
    /// The status a contest of this kind enters when collection closes.
    pub fn decision_status(&self) -> ContestStatus {
        match self {
            ContestKind::ManualSelection | ContestKind::RandomDraw => {
                ContestStatus::AwaitingDecision
            }
            ContestKind::ActivityCount => ContestStatus::Running,
        }
    }

    /// Returns true if this kind runs a second timed window after collection.
    pub fn has_second_window(&self) -> bool {
        matches!(
            self,
            ContestKind::ManualSelection | ContestKind::ActivityCount
        )
    }

    /// Returns the name of this kind for logging/display.
    pub fn name(&self) -> &'static str {
        match self {
            ContestKind::ManualSelection => "manual",
            ContestKind::RandomDraw => "random",
            ContestKind::ActivityCount => "activity",
        }
    }
}

impl fmt::Display for ContestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a contest kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown contest kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ContestKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" | "voting" | "manual_selection" => Ok(ContestKind::ManualSelection),
            "random" | "random_draw" => Ok(ContestKind::RandomDraw),
            "activity" | "spam" | "activity_count" => Ok(ContestKind::ActivityCount),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Persisted lifecycle status of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    /// Registration window is open.
    Collecting,

    /// Roster is fixed; a winner is being decided (manual or random kinds).
    AwaitingDecision,

    /// Activity window is running (activity kind only).
    Running,

    /// Terminal.
    Ended,
}

impl ContestStatus {
    /// Returns true for every status except `Ended`.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContestStatus::Ended)
    }

    /// Returns the name of this status for logging/display.
    pub fn name(&self) -> &'static str {
        match self {
            ContestStatus::Collecting => "collecting",
            ContestStatus::AwaitingDecision => "awaiting_decision",
            ContestStatus::Running => "running",
            ContestStatus::Ended => "ended",
        }
    }

    /// Checks if a transition is on the path allowed for `kind`.
    ///
    /// Valid transitions:
    /// - Collecting -> the kind's decision status
    /// - any non-terminal status -> Ended
    pub fn can_transition(kind: ContestKind, from: ContestStatus, to: ContestStatus) -> bool {
        match (from, to) {
            (ContestStatus::Ended, _) => false,
            (_, ContestStatus::Ended) => true,
            (ContestStatus::Collecting, next) => next == kind.decision_status(),
            _ => false,
        }
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entry rules configured for a contest. Every rule is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRules {
    /// Maximum number of participants admitted.
    pub cap: Option<u32>,

    /// Minimum referral count.
    pub min_referrals: Option<u32>,

    /// Minimum number of contests previously entered.
    pub min_contests: Option<u32>,

    /// Maximum number of contests previously entered (e.g. newcomers only).
    pub max_contests: Option<u32>,
}

impl EntryRules {
    /// Returns true if no rule is configured.
    pub fn is_open(&self) -> bool {
        *self == EntryRules::default()
    }
}

/// The one or two timed windows of a contest, persisted at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    /// Registration window.
    pub collection: Duration,

    /// Decision countdown (manual) or activity window (activity).
    /// Unused by random draws.
    pub second: Option<Duration>,
}

/// Longest window either phase may run (30 days).
pub const MAX_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

impl PhaseDurations {
    pub fn new(collection: Duration, second: Option<Duration>) -> Self {
        PhaseDurations { collection, second }
    }
}

/// Parameters supplied by the operator when creating a contest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContest {
    pub kind: ContestKind,
    pub prize: String,
    pub rules: EntryRules,
    pub target: u32,
    pub durations: PhaseDurations,
}

/// Reasons a contest cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidContest {
    #[error("target participant count must be at least 1")]
    ZeroTarget,

    #[error("prize description is empty")]
    EmptyPrize,

    #[error("collection window must be longer than zero")]
    ZeroCollection,

    #[error("{kind} contests need a second window")]
    MissingSecondWindow { kind: ContestKind },

    #[error("participation range is empty: min {min} > max {max}")]
    EmptyParticipationRange { min: u32, max: u32 },

    #[error("windows may last at most {} days", .max.as_secs() / 86_400)]
    WindowTooLong { max: Duration },
}

impl NewContest {
    /// Validates the parameters without touching any state.
    pub fn validate(&self) -> Result<(), InvalidContest> {
        if self.target == 0 {
            return Err(InvalidContest::ZeroTarget);
        }
        if self.prize.trim().is_empty() {
            return Err(InvalidContest::EmptyPrize);
        }
        if self.durations.collection.is_zero() {
            return Err(InvalidContest::ZeroCollection);
        }
        if self.kind.has_second_window() && self.durations.second.is_none() {
            return Err(InvalidContest::MissingSecondWindow { kind: self.kind });
        }
        let second = self.durations.second.unwrap_or(Duration::ZERO);
        if self.durations.collection > MAX_WINDOW || second > MAX_WINDOW {
            return Err(InvalidContest::WindowTooLong { max: MAX_WINDOW });
        }
        if let (Some(min), Some(max)) = (self.rules.min_contests, self.rules.max_contests)
            && min > max
        {
            return Err(InvalidContest::EmptyParticipationRange { min, max });
        }
        Ok(())
    }
}

/// A persisted contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub kind: ContestKind,
    pub status: ContestStatus,
    pub prize: String,
    pub rules: EntryRules,
    pub target: u32,
    pub durations: PhaseDurations,

    /// The channel message currently displaying this contest, if any.
    pub announcement: Option<MessageRef>,

    pub created_at: DateTime<Utc>,

    /// When the current status was entered. Recovery measures remaining
    /// window time from here.
    pub phase_started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl Contest {
    /// Time spent in the current status as of `now`. Clock skew clamps to zero.
    pub fn elapsed_in_phase(&self, now: DateTime<Utc>) -> Duration {
        (now - self.phase_started_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// The second window, or `fallback` for records that never stored one.
    pub fn second_window_or(&self, fallback: Duration) -> Duration {
        self.durations.second.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [ContestKind; 3] = [
        ContestKind::ManualSelection,
        ContestKind::RandomDraw,
        ContestKind::ActivityCount,
    ];

    const STATUSES: [ContestStatus; 4] = [
        ContestStatus::Collecting,
        ContestStatus::AwaitingDecision,
        ContestStatus::Running,
        ContestStatus::Ended,
    ];

    fn new_contest(kind: ContestKind) -> NewContest {
        NewContest {
            kind,
            prize: "100 stars".to_string(),
            rules: EntryRules::default(),
            target: 3,
            durations: PhaseDurations::new(Duration::from_secs(60), Some(Duration::from_secs(60))),
        }
    }

    #[test]
    fn ended_is_terminal_for_every_kind() {
        for kind in KINDS {
            for to in STATUSES {
                assert!(!ContestStatus::can_transition(kind, ContestStatus::Ended, to));
            }
        }
    }

    #[test]
    fn collecting_moves_only_to_the_kinds_decision_status_or_ended() {
        for kind in KINDS {
            for to in STATUSES {
                let allowed = ContestStatus::can_transition(kind, ContestStatus::Collecting, to);
                let expected = to == kind.decision_status() || to == ContestStatus::Ended;
                assert_eq!(allowed, expected, "{kind}: collecting -> {to}");
            }
        }
    }

    #[test]
    fn decision_statuses_only_end() {
        assert!(ContestStatus::can_transition(
            ContestKind::ManualSelection,
            ContestStatus::AwaitingDecision,
            ContestStatus::Ended
        ));
        assert!(!ContestStatus::can_transition(
            ContestKind::ManualSelection,
            ContestStatus::AwaitingDecision,
            ContestStatus::Collecting
        ));
        assert!(!ContestStatus::can_transition(
            ContestKind::ActivityCount,
            ContestStatus::Running,
            ContestStatus::AwaitingDecision
        ));
    }

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("Manual".parse::<ContestKind>(), Ok(ContestKind::ManualSelection));
        assert_eq!("random".parse::<ContestKind>(), Ok(ContestKind::RandomDraw));
        assert_eq!("spam".parse::<ContestKind>(), Ok(ContestKind::ActivityCount));
        assert!("lottery".parse::<ContestKind>().is_err());
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let mut contest = new_contest(ContestKind::RandomDraw);
        contest.target = 0;
        assert_eq!(contest.validate(), Err(InvalidContest::ZeroTarget));

        let mut contest = new_contest(ContestKind::ActivityCount);
        contest.durations.second = None;
        assert_eq!(
            contest.validate(),
            Err(InvalidContest::MissingSecondWindow {
                kind: ContestKind::ActivityCount
            })
        );

        let mut contest = new_contest(ContestKind::ManualSelection);
        contest.rules.min_contests = Some(5);
        contest.rules.max_contests = Some(2);
        assert!(matches!(
            contest.validate(),
            Err(InvalidContest::EmptyParticipationRange { min: 5, max: 2 })
        ));
    }

    #[test]
    fn validate_caps_both_windows() {
        let mut contest = new_contest(ContestKind::RandomDraw);
        contest.durations.collection = MAX_WINDOW;
        assert_eq!(contest.validate(), Ok(()));

        contest.durations.collection = MAX_WINDOW + Duration::from_secs(1);
        assert_eq!(
            contest.validate(),
            Err(InvalidContest::WindowTooLong { max: MAX_WINDOW })
        );

        let mut contest = new_contest(ContestKind::ActivityCount);
        contest.durations.second = Some(Duration::from_secs(u64::MAX));
        let err = contest.validate().unwrap_err();
        assert_eq!(err.to_string(), "windows may last at most 30 days");
    }

    #[test]
    fn random_draw_needs_no_second_window() {
        let mut contest = new_contest(ContestKind::RandomDraw);
        contest.durations.second = None;
        assert_eq!(contest.validate(), Ok(()));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ContestStatus::AwaitingDecision).unwrap();
        assert_eq!(json, "\"awaiting_decision\"");
    }
}
