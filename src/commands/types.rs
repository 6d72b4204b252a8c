//! Operator command types.

use thiserror::Error;

use crate::types::{ContestId, NewContest, UnknownKind};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/new <kind> target=N collect=MIN [window=MIN] [cap=N] [refs=N] [min=N] [max=N] <prize>`
    New(NewContest),

    /// `/start <id>`: close collection early.
    Start(ContestId),

    /// `/cancel <id>`: end without a winner.
    Cancel(ContestId),

    /// `/win <id> <pos> [<pos>...]`
    Win {
        contest: ContestId,
        positions: Vec<u32>,
    },

    /// `/active`
    Active,

    /// `/help`
    Help,
}

/// Why a command could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command /{0}")]
    Unknown(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("{what} must be a whole number, got {value:?}")]
    InvalidNumber { what: &'static str, value: String },

    #[error(transparent)]
    Kind(#[from] UnknownKind),

    #[error("unknown option {0:?}")]
    UnknownOption(String),

    #[error("option {0} given twice")]
    DuplicateOption(String),
}

/// Result type for command parsing.
pub type Result<T> = std::result::Result<T, CommandError>;
