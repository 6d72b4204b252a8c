//! Parser for operator commands.
//!
//! Pure: text in, [`Command`] out. Execution lives in [`super::execute`].

use std::str::FromStr;
use std::time::Duration;

use crate::types::{ContestId, ContestKind, EntryRules, NewContest, PhaseDurations};

use super::types::{Command, CommandError, Result};

/// Parses one operator message.
///
/// Returns `Ok(None)` for text that is not a command at all (no leading `/`).
///
/// # Parsing Rules
///
/// - Command names are case-insensitive
/// - A `@botname` suffix on the command word is ignored (`/start@giveaway_bot 3`)
/// - Arguments are separated by any whitespace
/// - `/new` options are `key=value` pairs before the prize; everything after
///   the first token without `=` is the prize text, kept verbatim
/// - Window options are whole minutes
///
/// # Examples
///
/// ```
/// use giveaway_train::commands::{parse_command, Command};
/// use giveaway_train::types::ContestId;
///
/// assert_eq!(parse_command("/start 3").unwrap(), Some(Command::Start(ContestId(3))));
/// assert_eq!(
///     parse_command("/WIN 3 1 4").unwrap(),
///     Some(Command::Win { contest: ContestId(3), positions: vec![1, 4] })
/// );
/// assert_eq!(parse_command("hello").unwrap(), None);
/// ```
pub fn parse_command(text: &str) -> Result<Option<Command>> {
    let Some(text) = text.trim().strip_prefix('/') else {
        return Ok(None);
    };
    let (word, rest) = split_first_word(text);
    let name = word.split('@').next().unwrap_or(word).to_ascii_lowercase();

    let command = match name.as_str() {
        "new" => Command::New(parse_new(rest)?),
        "start" => Command::Start(parse_contest_id(rest)?),
        "cancel" => Command::Cancel(parse_contest_id(rest)?),
        "win" => parse_win(rest)?,
        "active" => Command::Active,
        "help" => Command::Help,
        _ => return Err(CommandError::Unknown(name)),
    };
    Ok(Some(command))
}

fn parse_number<N: FromStr>(what: &'static str, value: &str) -> Result<N> {
    value.parse().map_err(|_| CommandError::InvalidNumber {
        what,
        value: value.to_string(),
    })
}

fn minutes(what: &'static str, value: &str) -> Result<Duration> {
    let mins: u64 = parse_number(what, value)?;
    let secs = mins.checked_mul(60).ok_or_else(|| CommandError::InvalidNumber {
        what,
        value: value.to_string(),
    })?;
    Ok(Duration::from_secs(secs))
}

fn parse_contest_id(text: &str) -> Result<ContestId> {
    let (word, _) = split_first_word(text.trim_start());
    if word.is_empty() {
        return Err(CommandError::Missing("contest id"));
    }
    let word = word.strip_prefix('#').unwrap_or(word);
    Ok(ContestId(parse_number("contest id", word)?))
}

/// `/win <id> <pos> [<pos>...]`
fn parse_win(text: &str) -> Result<Command> {
    let mut words = text.split_ascii_whitespace();
    let id = words.next().ok_or(CommandError::Missing("contest id"))?;
    let contest = parse_contest_id(id)?;

    let positions = words
        .map(|w| parse_number("position", w))
        .collect::<Result<Vec<u32>>>()?;
    if positions.is_empty() {
        return Err(CommandError::Missing("winner position"));
    }
    Ok(Command::Win { contest, positions })
}

/// `/new <kind> key=value... <prize>`
fn parse_new(text: &str) -> Result<NewContest> {
    let (kind, mut rest) = split_first_word(text.trim_start());
    if kind.is_empty() {
        return Err(CommandError::Missing("contest kind"));
    }
    let kind = ContestKind::from_str(kind)?;

    let mut target = None;
    let mut collection = None;
    let mut second = None;
    let mut rules = EntryRules::default();

    loop {
        let trimmed = rest.trim_start();
        let (word, after) = split_first_word(trimmed);
        let Some((key, value)) = word.split_once('=') else {
            rest = trimmed;
            break;
        };

        let key = key.to_ascii_lowercase();
        let slot_taken = match key.as_str() {
            "target" => target.replace(parse_number("target", value)?).is_some(),
            "collect" => collection.replace(minutes("collect", value)?).is_some(),
            "window" => second.replace(minutes("window", value)?).is_some(),
            "cap" => rules.cap.replace(parse_number("cap", value)?).is_some(),
            "refs" => rules
                .min_referrals
                .replace(parse_number("refs", value)?)
                .is_some(),
            "min" => rules
                .min_contests
                .replace(parse_number("min", value)?)
                .is_some(),
            "max" => rules
                .max_contests
                .replace(parse_number("max", value)?)
                .is_some(),
            _ => return Err(CommandError::UnknownOption(key)),
        };
        if slot_taken {
            return Err(CommandError::DuplicateOption(key));
        }
        rest = after;
    }

    let prize = rest.trim();
    if prize.is_empty() {
        return Err(CommandError::Missing("prize"));
    }

    Ok(NewContest {
        kind,
        prize: prize.to_string(),
        rules,
        target: target.ok_or(CommandError::Missing("target=N"))?,
        durations: PhaseDurations::new(
            collection.ok_or(CommandError::Missing("collect=MIN"))?,
            second,
        ),
    })
}

/// Splits text at the first whitespace, returning (word, rest).
/// If no whitespace, returns (text, "").
fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(|c: char| c.is_whitespace()) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(text: &str) -> Command {
        parse_command(text).unwrap().unwrap()
    }

    // ==================== Valid commands ====================

    #[test]
    fn new_parses_options_and_prize() {
        let Command::New(params) =
            parse("/new activity target=10 collect=30 window=15 refs=2 A  Telegram  Premium")
        else {
            panic!("expected /new");
        };
        assert_eq!(params.kind, ContestKind::ActivityCount);
        assert_eq!(params.target, 10);
        assert_eq!(params.durations.collection, Duration::from_secs(30 * 60));
        assert_eq!(params.durations.second, Some(Duration::from_secs(15 * 60)));
        assert_eq!(params.rules.min_referrals, Some(2));
        assert_eq!(params.rules.cap, None);
        assert_eq!(params.prize, "A  Telegram  Premium");
    }

    #[test]
    fn new_accepts_kind_aliases() {
        let Command::New(params) = parse("/new voting target=3 collect=5 window=5 Stars") else {
            panic!("expected /new");
        };
        assert_eq!(params.kind, ContestKind::ManualSelection);
    }

    #[test]
    fn command_word_is_case_insensitive_and_may_name_the_bot() {
        assert_eq!(parse("/Cancel #7"), Command::Cancel(ContestId(7)));
        assert_eq!(parse("/start@giveaway_bot 2"), Command::Start(ContestId(2)));
        assert_eq!(parse("  /ACTIVE  "), Command::Active);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("start 3").unwrap(), None);
        assert_eq!(parse_command("").unwrap(), None);
    }

    proptest! {
        #[test]
        fn win_parses_any_positions(id in 1u64..=u64::MAX, positions in prop::collection::vec(1u32..1000, 1..8)) {
            let text = format!(
                "/win {} {}",
                id,
                positions.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
            );
            prop_assert_eq!(
                parse_command(&text).unwrap(),
                Some(Command::Win { contest: ContestId(id), positions })
            );
        }

        #[test]
        fn parser_never_panics(text in "\\PC*") {
            let _ = parse_command(&text);
        }
    }

    // ==================== Errors ====================

    #[test]
    fn new_requires_target_collect_and_prize() {
        assert_eq!(
            parse_command("/new random collect=5 Stars").unwrap_err(),
            CommandError::Missing("target=N")
        );
        assert_eq!(
            parse_command("/new random target=5 Stars").unwrap_err(),
            CommandError::Missing("collect=MIN")
        );
        assert_eq!(
            parse_command("/new random target=5 collect=5").unwrap_err(),
            CommandError::Missing("prize")
        );
        assert_eq!(
            parse_command("/new").unwrap_err(),
            CommandError::Missing("contest kind")
        );
    }

    #[test]
    fn new_rejects_bad_options() {
        assert!(matches!(
            parse_command("/new lottery target=1 collect=1 x").unwrap_err(),
            CommandError::Kind(_)
        ));
        assert_eq!(
            parse_command("/new random colour=red target=1 collect=1 x").unwrap_err(),
            CommandError::UnknownOption("colour".to_string())
        );
        assert_eq!(
            parse_command("/new random target=1 target=2 collect=1 x").unwrap_err(),
            CommandError::DuplicateOption("target".to_string())
        );
        assert_eq!(
            parse_command("/new random target=many collect=1 x").unwrap_err(),
            CommandError::InvalidNumber {
                what: "target",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn new_rejects_minutes_that_overflow() {
        assert_eq!(
            parse_command("/new random target=3 collect=307445734561825860 Prize").unwrap_err(),
            CommandError::InvalidNumber {
                what: "collect",
                value: "307445734561825860".to_string()
            }
        );
    }

    #[test]
    fn win_requires_positions() {
        assert_eq!(
            parse_command("/win 3").unwrap_err(),
            CommandError::Missing("winner position")
        );
        assert_eq!(
            parse_command("/win").unwrap_err(),
            CommandError::Missing("contest id")
        );
        assert!(matches!(
            parse_command("/win 3 first").unwrap_err(),
            CommandError::InvalidNumber { what: "position", .. }
        ));
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert_eq!(
            parse_command("/draw 1").unwrap_err(),
            CommandError::Unknown("draw".to_string())
        );
    }
}
