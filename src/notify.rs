//! Match reports and their serialized, retrying delivery.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chats::RawMessage;
use crate::classifier::normalize;

/// Keep reports under the platform's 4096-character message limit.
const MAX_EXCERPT_CHARS: usize = 3500;

// ─────────────────────────── Match report ────────────────────────────────

/// One detected request, ready to be rendered and delivered.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub chat_title: String,
    pub message_id: i32,
    pub link: Option<String>,
    /// Formatted local time; only set by the backfill scan.
    pub timestamp: Option<String>,
    pub excerpt: String,
}

impl MatchReport {
    pub fn from_message(msg: &RawMessage) -> Self {
        let normalized = normalize(Some(&msg.text));
        let excerpt = if normalized.chars().count() > MAX_EXCERPT_CHARS {
            let mut cut: String = normalized.chars().take(MAX_EXCERPT_CHARS).collect();
            cut.push('…');
            cut
        } else {
            normalized
        };

        Self {
            chat_title: msg.chat_title.clone(),
            message_id: msg.message_id,
            link: msg.public_link(),
            timestamp: None,
            excerpt,
        }
    }

    /// Attach the message time, rendered in the local timezone.
    pub fn with_timestamp(mut self, msg: &RawMessage) -> Self {
        self.timestamp = Some(
            msg.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        );
        self
    }

    /// Short single-line form for logs.
    pub fn summary(&self) -> String {
        let head: String = self.excerpt.chars().take(120).collect();
        format!("{} #{} | {head}", self.chat_title, self.message_id)
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🔎 Обнаружен запрос репетитора")?;
        writeln!(f, "👥 Чат: {}", self.chat_title)?;
        writeln!(f, "🧷 Сообщение #{}", self.message_id)?;
        writeln!(
            f,
            "🔗 {}",
            self.link.as_deref().unwrap_or("(приватный чат)")
        )?;
        if let Some(ts) = &self.timestamp {
            writeln!(f, "🕒 {ts}")?;
        }
        write!(f, "\n{}", self.excerpt)
    }
}

// ─────────────────────────── Sink ────────────────────────────────────────

/// Why a single send attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The platform asked us to wait before sending again.
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// The fixed private destination for reports.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SendError>;
}

// ─────────────────────────── Dispatcher ──────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchCfg {
    /// Generic-error attempts before a report is dropped.
    pub max_attempts: u32,
    /// Backoff after failed attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
    /// Added on top of every platform-advertised wait.
    pub rate_limit_margin: Duration,
    /// Pause after a successful send, still holding the lock.
    pub throttle: Duration,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step: Duration::from_secs(2),
            rate_limit_margin: Duration::from_secs(1),
            throttle: Duration::from_millis(300),
        }
    }
}

impl DispatchCfg {
    /// Sleep before resending after the platform advertised `wait`.
    fn rate_limit_pause(&self, wait: Duration) -> Duration {
        wait.saturating_add(self.rate_limit_margin)
    }

    /// Sleep after failed attempt number `attempt`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Delivers reports one at a time, process-wide.
pub struct Dispatcher {
    sink: Box<dyn NotificationSink>,
    cfg: DispatchCfg,
    in_flight: Mutex<()>,
}

impl Dispatcher {
    pub fn new(sink: Box<dyn NotificationSink>, cfg: DispatchCfg) -> Self {
        Self {
            sink,
            cfg,
            in_flight: Mutex::new(()),
        }
    }

    /// Deliver `text`, retrying as needed.  Returns `false` once the retry
    /// ceiling is exhausted; the report is then dropped.
    ///
    /// Rate-limit waits do not consume attempts.
    pub async fn deliver(&self, text: &str) -> bool {
        let _guard = self.in_flight.lock().await;
        let max_attempts = self.cfg.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match self.sink.send(text).await {
                Ok(()) => {
                    if !self.cfg.throttle.is_zero() {
                        tokio::time::sleep(self.cfg.throttle).await;
                    }
                    return true;
                }
                Err(SendError::RateLimited(wait)) => {
                    info!("Rate limited; waiting {}s before resending", wait.as_secs());
                    tokio::time::sleep(self.cfg.rate_limit_pause(wait)).await;
                }
                Err(SendError::Failed(e)) => {
                    if attempt >= max_attempts {
                        error!("Delivery failed after {attempt} attempt(s), dropping: {e:#}");
                        return false;
                    }
                    let backoff = self.cfg.backoff(attempt);
                    warn!(
                        "Delivery attempt {attempt}/{max_attempts} failed: {e:#}; retrying in {}ms",
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Render and deliver a report.
    pub async fn deliver_report(&self, report: &MatchReport) -> bool {
        self.deliver(&report.to_string()).await
    }
}

impl fmt::Display for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dispatcher(max_attempts={}, backoff={}ms, margin={}ms, throttle={}ms)",
            self.cfg.max_attempts,
            self.cfg.backoff_step.as_millis(),
            self.cfg.rate_limit_margin.as_millis(),
            self.cfg.throttle.as_millis(),
        )
    }
}
