use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::StreamExt;
use tracing::{info, warn};

use crate::chats::{ChatDirectory, ChatInfo};
use crate::notify::MatchReport;
use crate::scope::ChatScope;

use super::shared::Pipeline;

#[derive(Debug, Clone)]
pub struct BackfillCfg {
    /// Only messages newer than `now - days` are scanned.
    pub days: i64,
    pub max_per_chat: usize,
    /// Pause after every match, on top of the dispatcher's own pacing.
    pub delay: Duration,
}

/// One pass over recent history.  Returns how many matches were found.
pub async fn scan_recent<D: ChatDirectory>(
    directory: &D,
    pipeline: &Pipeline,
    cfg: &BackfillCfg,
) -> usize {
    let now = Utc::now();
    let cutoff = TimeDelta::try_days(cfg.days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut chats = target_chats(directory, &pipeline.scope).await;
    chats.retain(|chat| !pipeline.report_chats.contains(&chat.id()));
    info!(
        "Backfill: scanning {} chat(s), last {} day(s), up to {} messages each",
        chats.len(),
        cfg.days,
        cfg.max_per_chat
    );

    let mut total = 0usize;
    for chat in &chats {
        total += scan_chat(directory, pipeline, chat, cutoff, cfg).await;
    }

    info!("Backfill complete: {total} match(es)");
    total
}

async fn target_chats<D: ChatDirectory>(directory: &D, scope: &ChatScope) -> Vec<D::Chat> {
    match scope {
        ChatScope::Unrestricted => match directory.dialogs().await {
            Ok(chats) => chats,
            Err(e) => {
                warn!("Backfill: failed to list dialogs: {e:#}");
                Vec::new()
            }
        },
        ChatScope::Only(ids) => {
            let mut ids: Vec<i64> = ids.iter().copied().collect();
            ids.sort_unstable();
            let mut chats = Vec::with_capacity(ids.len());
            for id in ids {
                match directory.lookup(id).await {
                    Ok(chat) => chats.push(chat),
                    Err(e) => warn!("Backfill: skipping chat id={id}: {e:#}"),
                }
            }
            chats
        }
    }
}

/// Walk one chat newest-first.  History is strictly time-descending, so the
/// first message older than `cutoff` ends the chat.
async fn scan_chat<D: ChatDirectory>(
    directory: &D,
    pipeline: &Pipeline,
    chat: &D::Chat,
    cutoff: DateTime<Utc>,
    cfg: &BackfillCfg,
) -> usize {
    let title = chat.display_name();
    let mut history = directory.history(chat, cfg.max_per_chat);
    let mut seen = 0usize;
    let mut found = 0usize;

    while seen < cfg.max_per_chat {
        let Some(item) = history.next().await else {
            break;
        };
        seen += 1;

        let msg = match item {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Backfill: history of {title} failed: {e:#}");
                break;
            }
        };
        if msg.timestamp < cutoff {
            break;
        }
        if !pipeline.classifier.is_request(&msg.text) {
            continue;
        }

        found += 1;
        let report = MatchReport::from_message(&msg).with_timestamp(&msg);
        info!("[MATCH] {}", report.summary());
        pipeline.dispatcher.deliver_report(&report).await;
        tokio::time::sleep(cfg.delay).await;
    }

    info!("Backfill: {title} – {seen} scanned, {found} match(es)");
    found
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::time::Instant;

    use super::*;
    use crate::modes::shared::fixtures::{pipeline, pipeline_reporting_to};
    use crate::testing::{FakeChat, FakeDirectory, FakeSink};

    const REQUEST: &str = "Looking for an IELTS tutor, any recommendations?";

    fn cfg(days: i64, max_per_chat: usize) -> BackfillCfg {
        BackfillCfg {
            days,
            max_per_chat,
            delay: Duration::from_millis(500),
        }
    }

    fn hours_ago(h: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::hours(h)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_message_older_than_cutoff() {
        let chat = FakeChat::new(1, "IELTS prep", Some("ielts_prep"));
        let history = vec![
            chat.message(40, REQUEST, hours_ago(1)),
            chat.message(39, "just chatting", hours_ago(2)),
            chat.message(38, REQUEST, hours_ago(24 * 10)),
            chat.message(37, REQUEST, hours_ago(24 * 11)),
        ];
        let dir = FakeDirectory::default()
            .with_chat(chat.clone())
            .with_history(1, history);
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Only(HashSet::from([1])), &sink);

        let found = scan_recent(&dir, &p, &cfg(3, 100)).await;

        assert_eq!(found, 1);
        assert_eq!(dir.visited(1), 3);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("https://t.me/ielts_prep/40"));
        assert!(sent[0].contains("🕒 "));
    }

    #[tokio::test(start_paused = true)]
    async fn respects_per_chat_cap() {
        let chat = FakeChat::new(1, "IELTS prep", None);
        let history = (0..5)
            .map(|i| chat.message(100 - i, REQUEST, hours_ago(i64::from(i) + 1)))
            .collect();
        let dir = FakeDirectory::default()
            .with_chat(chat.clone())
            .with_history(1, history);
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Unrestricted, &sink);

        assert_eq!(scan_recent(&dir, &p, &cfg(3, 2)).await, 2);
        assert_eq!(dir.visited(1), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unrestricted_scope_scans_all_dialogs() {
        let a = FakeChat::new(1, "A", None);
        let b = FakeChat::new(2, "B", Some("b_chat"));
        let dir = FakeDirectory::default()
            .with_chat(a.clone())
            .with_chat(b.clone())
            .with_history(1, vec![a.message(1, REQUEST, hours_ago(1))])
            .with_history(2, vec![b.message(1, REQUEST, hours_ago(1))]);
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Unrestricted, &sink);

        assert_eq!(scan_recent(&dir, &p, &cfg(3, 10)).await, 2);
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn report_chat_is_never_scanned() {
        let group = FakeChat::new(1, "IELTS prep", None);
        let reports = FakeChat::new(2, "Tutor alerts", None);
        let earlier = MatchReport::from_message(&group.message(7, REQUEST, hours_ago(2)));
        let dir = FakeDirectory::default()
            .with_chat(group.clone())
            .with_chat(reports.clone())
            .with_history(1, vec![group.message(7, REQUEST, hours_ago(2))])
            .with_history(2, vec![reports.message(1, &earlier.to_string(), hours_ago(1))]);
        let sink = FakeSink::new(vec![]);
        let p = pipeline_reporting_to(ChatScope::Unrestricted, &sink, 2);

        assert_eq!(scan_recent(&dir, &p, &cfg(3, 10)).await, 1);
        assert_eq!(dir.visited(2), 0);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_chat_is_skipped() {
        let a = FakeChat::new(1, "A", None);
        let b = FakeChat::new(2, "B", None);
        let dir = FakeDirectory::default()
            .with_chat(a.clone())
            .with_chat(b.clone())
            .unknown_id(1)
            .with_history(1, vec![a.message(1, REQUEST, hours_ago(1))])
            .with_history(2, vec![b.message(1, REQUEST, hours_ago(1))]);
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Only(HashSet::from([1, 2])), &sink);

        assert_eq!(scan_recent(&dir, &p, &cfg(3, 10)).await, 1);
        assert_eq!(dir.visited(1), 0);
        assert_eq!(dir.visited(2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dialog_listing_scans_nothing() {
        let dir = FakeDirectory::default().failing_dialogs();
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Unrestricted, &sink);
        assert_eq!(scan_recent(&dir, &p, &cfg(3, 10)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_after_each_match() {
        let chat = FakeChat::new(1, "A", None);
        let history = (0..3)
            .map(|i| chat.message(10 - i, REQUEST, hours_ago(i64::from(i) + 1)))
            .collect();
        let dir = FakeDirectory::default()
            .with_chat(chat.clone())
            .with_history(1, history);
        let sink = FakeSink::new(vec![]);
        let p = pipeline(ChatScope::Unrestricted, &sink);

        let start = Instant::now();
        assert_eq!(scan_recent(&dir, &p, &cfg(3, 10)).await, 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
