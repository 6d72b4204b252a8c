//! Giveaway Train - a Telegram channel bot that runs timed giveaways.
//!
//! Contests collect participants from channel comments, then decide a winner
//! by operator choice, random draw, or message count. Every phase survives a
//! restart: state lives in the store and runners are re-spawned from it.

pub mod announce;
pub mod commands;
pub mod config;
pub mod eligibility;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;
pub mod updates;

#[cfg(test)]
pub mod test_utils;
