//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::lifecycle::LifecycleConfig;
use crate::types::ChatId;

pub const DEFAULT_STATE_PATH: &str = "./state/contests.json";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Errors in the process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set when BOT_TOKEN is set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bot API token. Without one the bot runs against the dry-run transport.
    pub bot_token: Option<String>,

    /// The channel hosting contests.
    pub channel: ChatId,

    /// The channel's linked discussion group, where comments arrive.
    /// Defaults to the channel itself.
    pub discussion_group: ChatId,

    /// The operator's private chat.
    pub operator: ChatId,

    pub state_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.lifecycle = LifecycleConfig::from_env();
        Ok(config)
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("BOT_TOKEN").filter(|t| !t.trim().is_empty());

        let chat = |key: &'static str| -> Result<Option<ChatId>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<i64>()
                        .map(ChatId)
                        .map_err(|_| ConfigError::Invalid { key, value })
                })
                .transpose()
        };
        let required = |key: &'static str| -> Result<ChatId, ConfigError> {
            match chat(key)? {
                Some(id) => Ok(id),
                None if bot_token.is_some() => Err(ConfigError::Missing(key)),
                None => Ok(ChatId(0)),
            }
        };

        let channel = required("CHANNEL_ID")?;
        let operator = required("ADMIN_ID")?;
        let discussion_group = chat("DISCUSSION_GROUP_ID")?.unwrap_or(channel);

        let state_path = lookup("GIVEAWAY_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));

        let listen = lookup("GIVEAWAY_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "GIVEAWAY_LISTEN_ADDR",
                value: listen.clone(),
            })?;

        Ok(AppConfig {
            bot_token,
            channel,
            discussion_group,
            operator,
            state_path,
            listen_addr,
            lifecycle: LifecycleConfig::new(),
        })
    }
}
