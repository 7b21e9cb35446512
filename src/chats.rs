//! Platform-neutral view of chats and messages.
//!
//! The pipeline only ever talks to these traits; `telegram.rs` provides the
//! grammers-backed implementations and the tests use in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

/// Base URL for public message links (`<base><handle>/<message_id>`).
pub const PUBLIC_LINK_BASE: &str = "https://t.me/";

/// One message as delivered by the live feed or a history scan.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub chat_title: String,
    pub chat_username: Option<String>,
}

impl RawMessage {
    /// Public link to the message, when the chat has a public handle.
    pub fn public_link(&self) -> Option<String> {
        self.chat_username
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| format!("{PUBLIC_LINK_BASE}{h}/{}", self.message_id))
    }
}

/// Live feed of incoming messages.  `Some(Err(_))` is a single bad event,
/// `None` means the connection is gone.
pub type MessageFeed = BoxStream<'static, Result<RawMessage>>;

/// Message history of one chat, newest first.
pub type MessageHistory = BoxStream<'static, Result<RawMessage>>;

/// Name shown for a chat: title, else public handle, else the id.
pub fn display_name_or_fallback(title: Option<&str>, handle: Option<&str>, id: i64) -> String {
    title
        .filter(|t| !t.trim().is_empty())
        .or(handle.filter(|h| !h.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// Display metadata of a chat.
///
/// Implementations own the name fallback: title, else public handle, else
/// the stringified id.
pub trait ChatInfo {
    fn id(&self) -> i64;
    fn display_name(&self) -> String;
    fn public_handle(&self) -> Option<String>;
}

/// Entity lookups and history access on the messaging platform.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    type Chat: ChatInfo + Send + Sync;

    /// Resolve a configured chat name or handle.  `Ok(None)` = no such chat.
    async fn resolve(&self, name: &str) -> Result<Option<Self::Chat>>;

    /// All group / channel dialogs of the account (private chats excluded).
    async fn dialogs(&self) -> Result<Vec<Self::Chat>>;

    /// Turn a previously resolved identifier back into a chat handle.
    async fn lookup(&self, chat_id: i64) -> Result<Self::Chat>;

    /// Newest-first history of `chat`, at most `limit` messages.
    fn history(&self, chat: &Self::Chat, limit: usize) -> MessageHistory;
}
