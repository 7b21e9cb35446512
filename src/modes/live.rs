use std::panic::AssertUnwindSafe;

use anyhow::Result;
use futures_util::{FutureExt, StreamExt};
use tracing::{info, warn};

use crate::chats::{MessageFeed, RawMessage};
use crate::notify::MatchReport;

use super::shared::Pipeline;

/// What happened to one incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    OutOfScope,
    NoMatch,
    Forwarded,
    Failed(String),
}

/// Scope check, classify, report.
pub async fn handle_event(pipeline: &Pipeline, event: Result<RawMessage>) -> EventOutcome {
    let msg = match event {
        Ok(msg) => msg,
        Err(e) => return EventOutcome::Failed(format!("{e:#}")),
    };
    if !pipeline.watches(msg.chat_id) {
        return EventOutcome::OutOfScope;
    }
    if !pipeline.classifier.is_request(&msg.text) {
        return EventOutcome::NoMatch;
    }

    let report = MatchReport::from_message(&msg);
    info!("[MATCH] {}", report.summary());
    if pipeline.dispatcher.deliver_report(&report).await {
        EventOutcome::Forwarded
    } else {
        EventOutcome::Failed(format!(
            "report for {} #{} was not delivered",
            report.chat_title, report.message_id
        ))
    }
}

/// Process the feed until it closes.  A failing (or panicking) event is
/// logged and dropped; it never ends the loop.  Returns the number of
/// forwarded reports.
pub async fn listen(pipeline: &Pipeline, mut feed: MessageFeed) -> usize {
    info!("Running in live mode. Waiting for new messages...");
    let mut forwarded = 0usize;

    while let Some(event) = feed.next().await {
        let outcome = AssertUnwindSafe(handle_event(pipeline, event))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| EventOutcome::Failed("message handler panicked".into()));

        match outcome {
            EventOutcome::Forwarded => forwarded += 1,
            EventOutcome::Failed(reason) => warn!("Message handler error: {reason}"),
            EventOutcome::OutOfScope | EventOutcome::NoMatch => {}
        }
    }

    warn!("Live feed closed after {forwarded} forwarded report(s).");
    forwarded
}
