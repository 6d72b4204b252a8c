//! Operator commands.
//!
//! The operator drives contests from a private chat with the bot.
//!
//! # Supported Commands
//!
//! - `/new <kind> target=N collect=MIN [window=MIN] [cap=N] [refs=N] [min=N] [max=N] <prize>`
//! - `/start <id>` - Closes registration early
//! - `/cancel <id>` - Ends the contest without a winner
//! - `/win <id> <pos> [<pos>...]` - Picks winners of a manual contest
//! - `/active` - Lists non-terminal contests
//! - `/help`
//!
//! # Example
//!
//! ```
//! use giveaway_train::commands::{parse_command, Command};
//! use giveaway_train::types::ContestId;
//!
//! assert_eq!(parse_command("/cancel 4").unwrap(), Some(Command::Cancel(ContestId(4))));
//! assert!(parse_command("/cancel").is_err());
//! ```

mod execute;
mod parser;
mod types;

pub use execute::{HELP, execute};
pub use parser::parse_command;
pub use types::{Command, CommandError};
