//! Which chats the pipeline looks at.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::chats::{ChatDirectory, ChatInfo};

/// Resolved once at startup, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatScope {
    /// No allow-list configured: every chat is eligible.
    Unrestricted,
    /// Only these chat ids.
    Only(HashSet<i64>),
}

impl ChatScope {
    pub fn allows(&self, chat_id: i64) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Only(ids) => ids.contains(&chat_id),
        }
    }
}

impl fmt::Display for ChatScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => write!(f, "all chats"),
            Self::Only(ids) => write!(f, "{} chat(s)", ids.len()),
        }
    }
}

/// Resolve configured chat names into a scope.
///
/// An empty list means [`ChatScope::Unrestricted`].  Names that fail to
/// resolve are logged and skipped; startup never fails because of them.
pub async fn resolve<D: ChatDirectory>(directory: &D, names: &[String]) -> ChatScope {
    if names.is_empty() {
        info!("Watching: ALL chats (TG_CHANNELS is empty)");
        return ChatScope::Unrestricted;
    }

    let mut ids = HashSet::new();
    for name in names {
        match directory.resolve(name).await {
            Ok(Some(chat)) => {
                info!("Watching @{name} ({}, id={})", chat.display_name(), chat.id());
                ids.insert(chat.id());
            }
            Ok(None) => warn!("Chat @{name} was not resolved; skipping"),
            Err(e) => warn!("Failed to resolve @{name}: {e:#}"),
        }
    }

    if ids.is_empty() {
        warn!("None of the {} configured chats resolved", names.len());
    }
    info!("Watching {} chat(s)", ids.len());
    ChatScope::Only(ids)
}
