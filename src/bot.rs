//! Bot API delivery to one fixed chat, as an alternative to Saved Messages.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::BotSinkCfg;
use crate::notify::{NotificationSink, SendError};

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Error body of a failed Bot API call.
#[derive(Deserialize)]
struct ApiError {
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Wait advertised by a `429 Too Many Requests` body, if any.
fn retry_after(body: &str) -> Option<Duration> {
    let err: ApiError = serde_json::from_str(body).ok()?;
    err.parameters?.retry_after.map(Duration::from_secs)
}

/// Bot API chat id → the bare peer id the user client sees.
///
/// Supergroups and channels are `-100<id>`, basic groups `-<id>`, users and
/// bots positive.
fn bare_chat_id(bot_api_id: i64) -> i64 {
    const CHANNEL_OFFSET: i64 = 1_000_000_000_000;
    if bot_api_id >= 0 {
        bot_api_id
    } else if bot_api_id < -CHANNEL_OFFSET {
        -bot_api_id - CHANNEL_OFFSET
    } else {
        -bot_api_id
    }
}

/// The bot's own user id, the part of the token before `:`.
fn bot_user_id(token: &str) -> Option<i64> {
    token.split_once(':')?.0.trim().parse().ok()
}

/// Chats where the user account will see the bot's reports arrive: the
/// private chat with the bot and the target chat itself.
pub fn echo_chats(cfg: &BotSinkCfg) -> HashSet<i64> {
    let mut chats = HashSet::from([bare_chat_id(cfg.chat_id)]);
    chats.extend(bot_user_id(&cfg.token));
    chats
}

pub struct BotChatSink {
    http: HttpClient,
    token: String,
    chat_id: i64,
}

impl BotChatSink {
    pub fn new(cfg: &BotSinkCfg) -> Self {
        Self {
            http: HttpClient::new(),
            token: cfg.token.clone(),
            chat_id: cfg.chat_id,
        }
    }
}

#[async_trait]
impl NotificationSink for BotChatSink {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = SendMessagePayload {
            chat_id: self.chat_id,
            text,
            disable_web_page_preview: true,
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("sendMessage request failed: {e}"))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let raw = resp.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(wait) = retry_after(&raw) {
                return Err(SendError::RateLimited(wait));
            }
        }
        Err(anyhow!("sendMessage failed: {status} body={raw}").into())
    }
}
