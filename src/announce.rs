//! Plain-text renderings of contest state.
//!
//! Every function is pure; the lifecycle engine decides where the text goes.

use std::fmt::Write;
use std::time::Duration;

use crate::types::{Contest, ContestKind, EntryRules, Participant, TallyEntry};

/// Whole minutes left, rounded up so a running window never shows zero.
pub fn minutes_left(remaining: Duration) -> u64 {
    remaining.as_secs().div_ceil(60)
}

fn header(contest: &Contest) -> String {
    let title = match contest.kind {
        ContestKind::ManualSelection => "Giveaway: the operator picks the winner",
        ContestKind::RandomDraw => "Giveaway: random draw",
        ContestKind::ActivityCount => "Giveaway: most active participant wins",
    };
    format!("{} {}\nPrize: {}", title, contest.id, contest.prize)
}

fn rules_lines(rules: &EntryRules) -> String {
    let mut out = String::new();
    if let Some(cap) = rules.cap {
        let _ = writeln!(out, "At most {} participants", cap);
    }
    if let Some(refs) = rules.min_referrals {
        let _ = writeln!(out, "At least {} referrals", refs);
    }
    if let Some(min) = rules.min_contests {
        let _ = writeln!(out, "At least {} previous contests", min);
    }
    if let Some(max) = rules.max_contests {
        let _ = writeln!(out, "At most {} previous contests", max);
    }
    out
}

/// `position marker name` lines.
pub fn roster_lines(participants: &[Participant]) -> String {
    participants
        .iter()
        .map(|p| format!("{} {} {}", p.position, p.marker, p.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The collection-phase post.
pub fn collection(contest: &Contest, registered: u32) -> String {
    let mut text = header(contest);
    text.push_str("\n\nComment on this post to join.\n");
    text.push_str(&rules_lines(&contest.rules));
    let _ = write!(text, "Registered: {}/{}", registered, contest.target);
    text
}

/// The published roster of a manual contest, with the decision countdown.
pub fn roster(contest: &Contest, participants: &[Participant], remaining: Duration) -> String {
    format!(
        "{}\n\nRegistration closed. Participants:\n{}\n\nWinner announced in {} min.",
        header(contest),
        roster_lines(participants),
        minutes_left(remaining)
    )
}

/// Sent to the operator when the manual decision window expires.
pub fn decision_due(contest: &Contest, participants: &[Participant]) -> String {
    format!(
        "Contest {} is waiting for your decision.\n{}\n\nReply /win {} <position> [<position>...]",
        contest.id,
        roster_lines(participants),
        contest.id.0
    )
}

/// Final post naming the winners.
pub fn winners(contest: &Contest, winners: &[Participant]) -> String {
    let label = if winners.len() == 1 {
        "Winner"
    } else {
        "Winners"
    };
    format!(
        "{}\n\n{}:\n{}",
        header(contest),
        label,
        roster_lines(winners)
    )
}

/// Final post of a random draw.
pub fn draw_result(contest: &Contest, winner: &Participant, entrants: usize) -> String {
    format!(
        "{}\n\nDrawn from {} participants.\nWinner: {} {} {}",
        header(contest),
        entrants,
        winner.position,
        winner.marker,
        winner.name
    )
}

fn board_lines(board: &[TallyEntry]) -> String {
    board
        .iter()
        .enumerate()
        .map(|(rank, e)| format!("{}. {} {}: {}", rank + 1, e.marker, e.name, e.count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Live activity leaderboard.
pub fn leaderboard(contest: &Contest, board: &[TallyEntry], remaining: Duration) -> String {
    format!(
        "{}\n\nMessages so far:\n{}\n\n{} min left.",
        header(contest),
        board_lines(board),
        minutes_left(remaining)
    )
}

/// Final activity standings.
pub fn activity_result(contest: &Contest, board: &[TallyEntry], winner: Option<&TallyEntry>) -> String {
    let verdict = match winner {
        Some(w) => format!("Winner: {} {} with {} messages", w.marker, w.name, w.count),
        None => "Nobody posted, so there is no winner.".to_string(),
    };
    format!(
        "{}\n\nFinal standings:\n{}\n\n{}",
        header(contest),
        board_lines(board),
        verdict
    )
}

/// Answer to a commenter who was turned away.
pub fn rejected(contest: &Contest, reason: impl std::fmt::Display) -> String {
    format!("You can't join contest {}: {}.", contest.id, reason)
}

/// Operator notice for a contest that ended without a winner.
pub fn ended_without_winner(contest: &Contest, reason: &str) -> String {
    format!("Contest {} ended without a winner: {}.", contest.id, reason)
}
