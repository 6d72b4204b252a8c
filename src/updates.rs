//! Inbound Telegram updates.
//!
//! Comments in the channel's discussion group feed registration and activity
//! counting; private messages from the operator are commands. Everything else
//! is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{self, parse_command};
use crate::lifecycle::{ChannelMessage, Engine};
use crate::store::Store;
use crate::transport::telegram::{TelegramClient, TgMessage, Update};
use crate::transport::{Destination, Transport};
use crate::types::{ChatId, DisplayName, MessageId, MessageRef, UserId};

/// Wait after a failed `getUpdates` before polling again.
const UPDATE_BACKOFF: Duration = Duration::from_secs(5);

/// Where an update goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Channel(ChannelMessage),
    Operator(String),
    Ignored,
}

/// Chats the bot listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chats {
    pub discussion_group: ChatId,
    pub operator: ChatId,
}

/// Sorts one update. Pure.
pub fn classify(update: &Update, chats: Chats) -> Inbound {
    let Some(message) = &update.message else {
        return Inbound::Ignored;
    };
    let Some(from) = &message.from else {
        return Inbound::Ignored;
    };
    if from.is_bot {
        return Inbound::Ignored;
    }

    let chat = ChatId(message.chat.id);
    if chat == chats.discussion_group {
        return Inbound::Channel(ChannelMessage {
            message: MessageRef::new(chat, MessageId(message.message_id)),
            sender: UserId(from.id),
            name: DisplayName::new(from.username.clone(), from.full_name()),
            sent_at: sent_at(message),
        });
    }

    if chat == chats.operator && from.id == chats.operator.0 {
        return match &message.text {
            Some(text) => Inbound::Operator(text.clone()),
            None => Inbound::Ignored,
        };
    }

    Inbound::Ignored
}

fn sent_at(message: &TgMessage) -> DateTime<Utc> {
    DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now)
}

/// Acts on one classified update.
pub async fn dispatch<S: Store, T: Transport>(engine: &Arc<Engine<S, T>>, inbound: Inbound) {
    match inbound {
        Inbound::Channel(message) => {
            let sender = message.sender;
            match engine.on_channel_message(message).await {
                Ok(routed) => debug!(
                    user = %sender,
                    registrations = routed.registrations.len(),
                    tallied = routed.tallied.len(),
                    "channel message routed"
                ),
                Err(e) => warn!(user = %sender, error = %e, "could not route channel message"),
            }
        }
        Inbound::Operator(text) => {
            let reply = match parse_command(&text) {
                Ok(Some(command)) => commands::execute(engine, command).await,
                Ok(None) => return,
                Err(e) => format!("Error: {}\n\n{}", e, commands::HELP),
            };
            if let Err(e) = engine.transport().send(Destination::Operator, reply).await {
                warn!(error = %e, "could not reply to the operator");
            }
        }
        Inbound::Ignored => {}
    }
}

/// Long-polls `getUpdates` until `shutdown` fires.
///
/// Updates are handled one at a time in arrival order; the offset only
/// advances past an update once it has been dispatched.
pub async fn run_update_loop<S: Store, T: Transport>(
    engine: Arc<Engine<S, T>>,
    client: TelegramClient,
    chats: Chats,
    shutdown: CancellationToken,
) {
    info!(?chats, "update loop started");
    let mut offset = 0;

    loop {
        let updates = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = client.get_updates(offset) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatch(&engine, classify(&update, chats)).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(UPDATE_BACKOFF) => {}
                }
            }
        }
    }
    info!("update loop stopped");
}
