//! grammers-backed implementations of the chat traits.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use grammers_client::types::Peer;
use grammers_client::{Client, SignInError, Update};
use grammers_mtsender::{InvocationError, SenderPool};
use grammers_session::storages::SqliteSession;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt};
use tracing::{info, warn};

use crate::chats::{
    ChatDirectory, ChatInfo, MessageFeed, MessageHistory, RawMessage, display_name_or_fallback,
};
use crate::config::TgCfg;
use crate::notify::{NotificationSink, SendError};

/// A logged-in client plus its live message feed.
pub struct TgConnection {
    pub client: Client,
    pub feed: MessageFeed,
}

/// Open the session, start the sender pool, make sure we are signed in and
/// subscribe to new messages.
pub async fn connect(cfg: &TgCfg) -> Result<TgConnection> {
    let session = Arc::new(
        SqliteSession::open(&cfg.session_path)
            .with_context(|| format!("failed to open session {}", cfg.session_path))?,
    );
    let pool = SenderPool::new(Arc::clone(&session), cfg.api_id);
    let client = Client::new(&pool);

    let runner = pool.runner;
    tokio::spawn(async move {
        runner.run().await;
    });

    let updates_rx = pool.updates;

    ensure_user_login(&client, cfg).await?;

    // History is covered by the backfill scan, so no catch-up here.
    let updates = client.stream_updates(
        updates_rx,
        grammers_client::UpdatesConfiguration {
            catch_up: false,
            update_queue_limit: Some(2048),
        },
    );

    let feed = stream::unfold(updates, |mut updates| async move {
        loop {
            let Ok(update) = updates.next().await else {
                warn!("Update stream ended.");
                return None;
            };
            let Update::NewMessage(msg) = update else {
                continue;
            };
            // Our own reports land in Saved Messages; never re-classify them.
            if msg.outgoing() {
                continue;
            }
            let item = match msg.peer() {
                Ok(peer) => {
                    let chat = TgChat::new(peer.clone());
                    Ok(chat.raw_message(msg.id(), msg.text(), msg.date()))
                }
                Err(_) => Err(anyhow!("message #{} has no resolvable chat", msg.id())),
            };
            return Some((item, updates));
        }
    })
    .boxed();

    Ok(TgConnection { client, feed })
}

pub async fn ensure_user_login(client: &Client, cfg: &TgCfg) -> Result<()> {
    if client.is_authorized().await? {
        return Ok(());
    }

    let phone = cfg
        .phone
        .as_deref()
        .ok_or_else(|| anyhow!("Session is not authorized and TG_PHONE is not set"))?;

    info!("Not authorized. Requesting login code...");
    let token = client
        .request_login_code(phone, &cfg.api_hash)
        .await
        .context("request_login_code failed")?;

    let code = read_line("Enter the login code you received: ").await?;

    match client.sign_in(&token, &code).await {
        Ok(user) => {
            info!(
                "Signed in as {:?}",
                user.first_name().unwrap_or("<unknown>")
            );
            Ok(())
        }
        Err(SignInError::PasswordRequired(password_token)) => {
            let pw = if let Some(pw) = &cfg.two_fa_password {
                pw.clone()
            } else {
                let hint = password_token.hint().unwrap_or("");
                read_line(&format!(
                    "2FA password required (hint: {hint}). Enter password: "
                ))
                .await?
            };

            client
                .check_password(password_token, pw.as_bytes())
                .await
                .context("check_password failed")?;

            info!("Signed in with 2FA.");
            Ok(())
        }
        Err(e) => Err(anyhow!("sign_in failed: {e}")),
    }
}

async fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    let mut stdin = io::BufReader::new(io::stdin());
    stdin.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

// ───────────────────────────── Chats ─────────────────────────────────────

#[derive(Clone)]
pub struct TgChat {
    peer: Peer,
}

impl TgChat {
    fn new(peer: Peer) -> Self {
        Self { peer }
    }

    fn raw_message(&self, message_id: i32, text: &str, timestamp: DateTime<Utc>) -> RawMessage {
        RawMessage {
            chat_id: self.id(),
            message_id,
            text: text.to_string(),
            timestamp,
            chat_title: self.display_name(),
            chat_username: self.public_handle(),
        }
    }
}

impl ChatInfo for TgChat {
    fn id(&self) -> i64 {
        self.peer.id().bare_id()
    }

    fn display_name(&self) -> String {
        display_name_or_fallback(self.peer.name(), self.peer.username(), self.id())
    }

    fn public_handle(&self) -> Option<String> {
        self.peer.username().map(str::to_string)
    }
}

/// Entity lookups.  Every chat we resolve is cached by id so the backfill
/// can get a usable handle back from a bare identifier.
pub struct TgDirectory {
    client: Client,
    known: Mutex<HashMap<i64, TgChat>>,
}

impl TgDirectory {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            known: Mutex::new(HashMap::new()),
        }
    }

    fn remember(&self, chat: &TgChat) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(chat.id(), chat.clone());
        }
    }
}

#[async_trait]
impl ChatDirectory for TgDirectory {
    type Chat = TgChat;

    async fn resolve(&self, name: &str) -> Result<Option<TgChat>> {
        let peer = self
            .client
            .resolve_username(name)
            .await
            .with_context(|| format!("resolve_username failed for @{name}"))?;
        let chat = peer.map(TgChat::new);
        if let Some(chat) = &chat {
            self.remember(chat);
        }
        Ok(chat)
    }

    async fn dialogs(&self) -> Result<Vec<TgChat>> {
        let mut dialogs = self.client.iter_dialogs();
        let mut chats = Vec::new();
        while let Some(dialog) = dialogs.next().await.context("iter_dialogs failed")? {
            let peer = dialog.peer();
            if matches!(peer, Peer::User(_)) {
                continue;
            }
            let chat = TgChat::new(peer.clone());
            self.remember(&chat);
            chats.push(chat);
        }
        Ok(chats)
    }

    async fn lookup(&self, chat_id: i64) -> Result<TgChat> {
        let known = self
            .known
            .lock()
            .map_err(|_| anyhow!("chat cache poisoned"))?;
        known
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| anyhow!("chat id={chat_id} was never resolved"))
    }

    fn history(&self, chat: &TgChat, limit: usize) -> MessageHistory {
        let iter = self.client.iter_messages(chat.peer.clone()).limit(limit);
        let chat = chat.clone();
        stream::unfold(Some(iter), move |state| {
            let chat = chat.clone();
            async move {
                let mut iter = state?;
                match iter.next().await {
                    Ok(Some(msg)) => Some((
                        Ok(chat.raw_message(msg.id(), msg.text(), msg.date())),
                        Some(iter),
                    )),
                    Ok(None) => None,
                    Err(e) => Some((Err(anyhow::Error::from(e).context("iter_messages failed")), None)),
                }
            }
        })
        .boxed()
    }
}

// ───────────────────────────── Sink ──────────────────────────────────────

/// RPC errors that carry a "wait N seconds" value.
fn is_rate_limit(rpc_name: &str) -> bool {
    matches!(rpc_name, "FLOOD_WAIT" | "FLOOD_PREMIUM_WAIT" | "SLOWMODE_WAIT")
}

/// The account's own Saved Messages chat.
pub struct SavedMessages {
    client: Client,
    me: Peer,
}

impl SavedMessages {
    pub async fn new(client: Client) -> Result<Self> {
        let me = client.get_me().await.context("get_me failed")?;
        Ok(Self {
            client,
            me: Peer::User(me),
        })
    }

    /// Our own user id, i.e. the Saved Messages chat.
    pub fn chat_id(&self) -> i64 {
        self.me.id().bare_id()
    }
}

#[async_trait]
impl NotificationSink for SavedMessages {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        match self.client.send_message(self.me.clone(), text).await {
            Ok(_) => Ok(()),
            Err(InvocationError::Rpc(rpc)) if is_rate_limit(&rpc.name) => Err(
                SendError::RateLimited(Duration::from_secs(u64::from(rpc.value.unwrap_or(1)))),
            ),
            Err(e) => Err(SendError::Failed(
                anyhow::Error::from(e).context("send_message failed"),
            )),
        }
    }
}
