use std::collections::HashSet;

use anyhow::Result;
use grammers_client::Client;
use tracing::info;

use crate::bot::{self, BotChatSink};
use crate::classifier::RequestClassifier;
use crate::config::AppCfg;
use crate::notify::{Dispatcher, NotificationSink};
use crate::scope::ChatScope;
use crate::telegram::SavedMessages;

/// Everything both message paths share.  Built once, never mutated.
pub struct Pipeline {
    pub scope: ChatScope,
    pub classifier: RequestClassifier,
    pub dispatcher: Dispatcher,
    /// Chats our own reports arrive in.  Never scanned, whatever the scope.
    pub report_chats: HashSet<i64>,
}

impl Pipeline {
    pub fn watches(&self, chat_id: i64) -> bool {
        !self.report_chats.contains(&chat_id) && self.scope.allows(chat_id)
    }
}

/// Saved Messages by default, a bot chat when one is configured.  Also
/// returns the chats the reports will show up in.
pub(super) async fn build_sink(
    cfg: &AppCfg,
    client: &Client,
) -> Result<(Box<dyn NotificationSink>, HashSet<i64>)> {
    if let Some(bot) = &cfg.notify_bot {
        info!("Reports go to bot chat_id={}", bot.chat_id);
        return Ok((Box::new(BotChatSink::new(bot)), bot::echo_chats(bot)));
    }
    info!("Reports go to Saved Messages");
    let saved = SavedMessages::new(client.clone()).await?;
    let own = HashSet::from([saved.chat_id()]);
    Ok((Box::new(saved), own))
}
