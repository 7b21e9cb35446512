//! In-memory stand-ins for the platform, shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;

use crate::chats::{ChatDirectory, ChatInfo, MessageHistory, RawMessage, display_name_or_fallback};
use crate::notify::{NotificationSink, SendError};

// ───────────────────────────── Chats ─────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeChat {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl FakeChat {
    pub fn new(id: i64, title: &str, username: Option<&str>) -> Self {
        Self {
            id,
            title: Some(title.to_string()),
            username: username.map(Into::into),
        }
    }

    pub fn message(&self, message_id: i32, text: &str, timestamp: DateTime<Utc>) -> RawMessage {
        RawMessage {
            chat_id: self.id,
            message_id,
            text: text.to_string(),
            timestamp,
            chat_title: self.display_name(),
            chat_username: self.public_handle(),
        }
    }
}

impl ChatInfo for FakeChat {
    fn id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> String {
        display_name_or_fallback(self.title.as_deref(), self.username.as_deref(), self.id)
    }

    fn public_handle(&self) -> Option<String> {
        self.username.clone()
    }
}

/// Directory with canned chats and histories.  Counts how many history
/// items each chat's stream actually yielded.
#[derive(Default)]
pub struct FakeDirectory {
    chats: Vec<FakeChat>,
    failing: HashSet<String>,
    unknown_ids: HashSet<i64>,
    histories: HashMap<i64, Vec<RawMessage>>,
    visited: Arc<Mutex<HashMap<i64, usize>>>,
    fail_dialogs: bool,
}

impl FakeDirectory {
    pub fn with_chat(mut self, chat: FakeChat) -> Self {
        self.chats.push(chat);
        self
    }

    /// `resolve(name)` returns an error.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// `lookup(id)` returns an error.
    pub fn unknown_id(mut self, id: i64) -> Self {
        self.unknown_ids.insert(id);
        self
    }

    pub fn with_history(mut self, chat_id: i64, newest_first: Vec<RawMessage>) -> Self {
        self.histories.insert(chat_id, newest_first);
        self
    }

    pub fn failing_dialogs(mut self) -> Self {
        self.fail_dialogs = true;
        self
    }

    pub fn visited(&self, chat_id: i64) -> usize {
        self.visited
            .lock()
            .unwrap()
            .get(&chat_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChatDirectory for FakeDirectory {
    type Chat = FakeChat;

    async fn resolve(&self, name: &str) -> Result<Option<FakeChat>> {
        if self.failing.contains(name) {
            return Err(anyhow!("lookup of {name} exploded"));
        }
        Ok(self
            .chats
            .iter()
            .find(|c| c.username.as_deref() == Some(name) || c.id.to_string() == name)
            .cloned())
    }

    async fn dialogs(&self) -> Result<Vec<FakeChat>> {
        if self.fail_dialogs {
            return Err(anyhow!("dialogs unavailable"));
        }
        Ok(self.chats.clone())
    }

    async fn lookup(&self, chat_id: i64) -> Result<FakeChat> {
        if self.unknown_ids.contains(&chat_id) {
            return Err(anyhow!("chat {chat_id} is unknown"));
        }
        self.chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| anyhow!("chat {chat_id} not found"))
    }

    fn history(&self, chat: &FakeChat, limit: usize) -> MessageHistory {
        let items = self.histories.get(&chat.id).cloned().unwrap_or_default();
        let visited = Arc::clone(&self.visited);
        let chat_id = chat.id;
        stream::iter(items.into_iter().take(limit).map(Ok))
            .inspect(move |_| {
                *visited.lock().unwrap().entry(chat_id).or_insert(0) += 1;
            })
            .boxed()
    }
}

// ───────────────────────────── Sink ──────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SendScript {
    Ok,
    RateLimited(u64),
    Fail,
    Panic,
}

/// Sink that plays back a script of outcomes (then succeeds forever) and
/// records what went through.
#[derive(Clone)]
pub struct FakeSink {
    script: Arc<Mutex<VecDeque<SendScript>>>,
    sent: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    latency: Duration,
}

impl FakeSink {
    pub fn new(script: Vec<SendScript>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            sent: Arc::default(),
            attempts: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let step = self.script.lock().unwrap().pop_front().unwrap_or(SendScript::Ok);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            SendScript::Ok => {
                self.sent.lock().unwrap().push(text.to_string());
                Ok(())
            }
            SendScript::RateLimited(secs) => Err(SendError::RateLimited(Duration::from_secs(secs))),
            SendScript::Fail => Err(SendError::Failed(anyhow!("send failed"))),
            SendScript::Panic => panic!("sink blew up"),
        }
    }
}
