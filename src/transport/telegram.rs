//! Telegram Bot API client.
//!
//! Only the handful of methods the bot needs: `sendMessage`,
//! `editMessageText`, `deleteMessage`, `getChatMember` and `getUpdates`.
//! Every call is a JSON POST; the API wraps results in
//! `{"ok": bool, "result": ..., "description": ...}`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use super::{Destination, Membership, Result, Transport, TransportError};
use crate::types::{ChatId, MessageId, MessageRef, UserId};

const API_BASE: &str = "https://api.telegram.org";

/// Seconds the server holds a `getUpdates` request open.
pub const LONG_POLL_SECS: u64 = 30;

/// Envelope around every Bot API result.
#[derive(Debug, Deserialize)]
struct ApiResponse<R> {
    ok: bool,
    result: Option<R>,
    description: Option<String>,
}

impl<R> ApiResponse<R> {
    fn into_result(self, method: &'static str) -> Result<R> {
        if !self.ok {
            return Err(TransportError::Api {
                method,
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        self.result.ok_or(TransportError::EmptyResult { method })
    }
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,

    /// Unix seconds.
    pub date: i64,

    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TgUser {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: Membership,
}

/// Bot API client bound to one channel and one operator.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
    channel: ChatId,
    operator: ChatId,
}

impl TelegramClient {
    pub fn new(token: &str, channel: ChatId, operator: ChatId) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()?;
        Ok(TelegramClient {
            http,
            base: format!("{}/bot{}", API_BASE, token),
            channel,
            operator,
        })
    }

    fn chat(&self, to: Destination) -> ChatId {
        match to {
            Destination::Channel => self.channel,
            Destination::Operator => self.operator,
        }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<R> {
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        response.into_result(method)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": LONG_POLL_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

impl Transport for TelegramClient {
    #[instrument(skip(self, text))]
    async fn send(&self, to: Destination, text: String) -> Result<MessageRef> {
        let chat = self.chat(to);
        let sent: TgMessage = self
            .call("sendMessage", json!({ "chat_id": chat.0, "text": text }))
            .await?;
        debug!(message = sent.message_id, "sent");
        Ok(MessageRef::new(ChatId(sent.chat.id), MessageId(sent.message_id)))
    }

    #[instrument(skip(self, text))]
    async fn reply(&self, message: MessageRef, text: String) -> Result<MessageRef> {
        let sent: TgMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": message.chat.0,
                    "text": text,
                    "reply_parameters": {
                        "message_id": message.message.0,
                        "allow_sending_without_reply": true,
                    },
                }),
            )
            .await?;
        Ok(MessageRef::new(ChatId(sent.chat.id), MessageId(sent.message_id)))
    }

    async fn edit(&self, message: MessageRef, text: String) -> Result<()> {
        // Returns the edited message; only success matters.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": message.chat.0,
                    "message_id": message.message.0,
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": message.chat.0, "message_id": message.message.0 }),
            )
            .await?;
        Ok(())
    }

    async fn membership(&self, user: UserId) -> Result<Membership> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                json!({ "chat_id": self.channel.0, "user_id": user.0 }),
            )
            .await?;
        Ok(member.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_carries_description() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: message to delete not found"}"#,
        )
        .unwrap();
        let err = response.into_result("deleteMessage").unwrap_err();
        assert_eq!(
            err.to_string(),
            "deleteMessage rejected: Bad Request: message to delete not found"
        );
    }

    #[test]
    fn ok_envelope_without_result_is_an_error() {
        let response: ApiResponse<bool> = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(matches!(
            response.into_result("deleteMessage"),
            Err(TransportError::EmptyResult { .. })
        ));
    }

    #[test]
    fn chat_member_status_parses() {
        let response: ApiResponse<ChatMember> = serde_json::from_str(
            r#"{"ok": true, "result": {"status": "left", "user": {"id": 5, "is_bot": false, "first_name": "A"}}}"#,
        )
        .unwrap();
        let member = response.into_result("getChatMember").unwrap();
        assert_eq!(member.status, Membership::Left);
    }

    #[test]
    fn updates_parse_with_optional_fields() {
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": true, "result": [
                {"update_id": 10, "message": {"message_id": 3, "date": 1700000000,
                  "chat": {"id": -100123, "type": "supergroup"},
                  "from": {"id": 77, "is_bot": false, "first_name": "Ann", "last_name": "Lee"},
                  "text": "hello"}},
                {"update_id": 11}
            ]}"#,
        )
        .unwrap();
        let updates = response.into_result("getUpdates").unwrap();
        assert_eq!(updates.len(), 2);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.from.as_ref().unwrap().full_name(), "Ann Lee");
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert!(updates[1].message.is_none());
    }
}
