//! Core domain types for the giveaway bot.
//!
//! This module contains the fundamental records shared by the store, the
//! eligibility filter and the lifecycle engine.

pub mod contest;
pub mod ids;
pub mod participant;

// Re-export commonly used types at the module level
pub use contest::{
    Contest, ContestKind, ContestStatus, EntryRules, InvalidContest, MAX_WINDOW, NewContest,
    PhaseDurations, UnknownKind,
};
pub use ids::{ChatId, ContestId, MessageId, MessageRef, UserId};
pub use participant::{
    DisplayName, MARKER_PALETTE, Participant, TallyEntry, UserStats, Winner, pick_marker,
};
