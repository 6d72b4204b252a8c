//! Messaging transport.
//!
//! The lifecycle engine posts, edits and deletes announcements, answers
//! commenters, and checks channel membership through the [`Transport`] trait. Failures are reported
//! as [`TransportError`]; callers log them and skip the side effect.
//!
//! Implementations:
//! - [`TelegramClient`]: Bot API over HTTPS
//! - [`DryRunTransport`]: logs every call, used when no bot token is set

pub mod dry_run;
pub mod telegram;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{MessageRef, UserId};

pub use dry_run::DryRunTransport;
pub use telegram::TelegramClient;

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// The public channel hosting the contests.
    Channel,

    /// The operator's private chat.
    Operator,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel => f.write_str("channel"),
            Destination::Operator => f.write_str("operator"),
        }
    }
}

/// A user's standing in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl Membership {
    /// Only members, administrators and the creator count as subscribed.
    pub fn is_subscribed(&self) -> bool {
        matches!(
            self,
            Membership::Creator | Membership::Administrator | Membership::Member
        )
    }
}

/// Errors returned by transport calls.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    #[error("{method} returned no result")]
    EmptyResult { method: &'static str },

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transport calls.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Outbound messaging and membership lookups.
pub trait Transport: Send + Sync + 'static {
    /// Posts `text` and returns a reference to the new message.
    fn send(
        &self,
        to: Destination,
        text: String,
    ) -> impl Future<Output = Result<MessageRef>> + Send;

    /// Answers `message` in its own chat.
    fn reply(
        &self,
        message: MessageRef,
        text: String,
    ) -> impl Future<Output = Result<MessageRef>> + Send;

    fn edit(&self, message: MessageRef, text: String) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, message: MessageRef) -> impl Future<Output = Result<()>> + Send;

    /// The user's membership in the channel.
    fn membership(&self, user: UserId) -> impl Future<Output = Result<Membership>> + Send;
}
