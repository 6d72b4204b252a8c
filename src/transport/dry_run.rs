//! A transport that only logs.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::info;

use super::{Destination, Membership, Result, Transport};
use crate::types::{ChatId, MessageId, MessageRef, UserId};

/// Logs every outbound call instead of performing it.
///
/// Sent messages get sequential ids so later edits and deletes can be
/// correlated in the log. Everyone counts as a channel member.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    next_message: AtomicI64,
}

impl DryRunTransport {
    pub fn new() -> Self {
        DryRunTransport::default()
    }

    fn chat(to: Destination) -> ChatId {
        match to {
            Destination::Channel => ChatId(-1),
            Destination::Operator => ChatId(0),
        }
    }
}

impl Transport for DryRunTransport {
    async fn send(&self, to: Destination, text: String) -> Result<MessageRef> {
        let id = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        let message = MessageRef::new(Self::chat(to), MessageId(id));
        info!(to = %to, message = %message, "dry-run send:\n{}", text);
        Ok(message)
    }

    async fn reply(&self, message: MessageRef, text: String) -> Result<MessageRef> {
        let id = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        info!(reply_to = %message, "dry-run reply:\n{}", text);
        Ok(MessageRef::new(message.chat, MessageId(id)))
    }

    async fn edit(&self, message: MessageRef, text: String) -> Result<()> {
        info!(message = %message, "dry-run edit:\n{}", text);
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        info!(message = %message, "dry-run delete");
        Ok(())
    }

    async fn membership(&self, user: UserId) -> Result<Membership> {
        info!(user = %user, "dry-run membership check");
        Ok(Membership::Member)
    }
}
