//! Startup configuration, read once from the environment (`.env` honoured).

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::modes::BackfillCfg;
use crate::notify::DispatchCfg;

#[derive(Clone)]
pub struct TgCfg {
    pub api_id: i32,
    pub api_hash: String,
    /// Session store holding the long-lived authorization.
    pub session_path: String,
    /// Only needed when the session is not authorized yet.
    pub phone: Option<String>,
    pub two_fa_password: Option<String>,
}

/// Deliver through a bot chat instead of the account's Saved Messages.
#[derive(Clone)]
pub struct BotSinkCfg {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Clone)]
pub struct AppCfg {
    pub tg: TgCfg,
    pub channels: Vec<String>,
    pub minus_words: Vec<String>,
    pub hint_words: Vec<String>,
    pub port: u16,
    pub backfill: BackfillCfg,
    pub dispatch: DispatchCfg,
    pub notify_bot: Option<BotSinkCfg>,
}

impl AppCfg {
    /// | Env var                 | Default | Purpose                                  |
    /// |-------------------------|---------|------------------------------------------|
    /// | `TG_API_ID`             | —       | Numeric app id (required)                |
    /// | `TG_API_HASH`           | —       | App secret (required)                    |
    /// | `TG_SESSION_PATH`       | —       | Session store file (required)            |
    /// | `TG_PHONE`              | —       | Phone for first login                    |
    /// | `TG_2FA_PASSWORD`       | —       | 2FA password for first login             |
    /// | `TG_CHANNELS`           | empty   | Chats to watch; empty = all              |
    /// | `MINUS_WORDS`           | empty   | Exclusion words                          |
    /// | `HINT_WORDS`            | empty   | Extra request phrases                    |
    /// | `PORT`                  | `10000` | Health endpoint port                     |
    /// | `BACKFILL_DAYS`         | `3`     | How far back the startup scan looks      |
    /// | `BACKFILL_MAX_PER_CHAT` | `200`   | History cap per chat                     |
    /// | `BACKFILL_DELAY_MS`     | `1000`  | Pause after each backfill match          |
    /// | `NOTIFY_MAX_ATTEMPTS`   | `5`     | Delivery attempts before dropping        |
    /// | `NOTIFY_BACKOFF_MS`     | `2000`  | Linear backoff step                      |
    /// | `NOTIFY_THROTTLE_MS`    | `300`   | Pause after each delivery                |
    /// | `NOTIFY_BOT_TOKEN`      | —       | Bot token for bot-chat delivery          |
    /// | `NOTIFY_CHAT_ID`        | —       | Target chat for bot-chat delivery        |
    pub fn from_env() -> Result<Self> {
        let tg = TgCfg {
            api_id: must_env("TG_API_ID")?
                .trim()
                .parse()
                .context("TG_API_ID must be i32")?,
            api_hash: must_env("TG_API_HASH")?,
            session_path: must_env("TG_SESSION_PATH")?,
            phone: opt_env("TG_PHONE"),
            two_fa_password: opt_env("TG_2FA_PASSWORD"),
        };

        let defaults = DispatchCfg::default();
        let dispatch = DispatchCfg {
            max_attempts: env_or("NOTIFY_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            backoff_step: env_millis("NOTIFY_BACKOFF_MS", defaults.backoff_step),
            throttle: env_millis("NOTIFY_THROTTLE_MS", defaults.throttle),
            ..defaults
        };

        let backfill = BackfillCfg {
            days: env_or("BACKFILL_DAYS", 3_i64).max(0),
            max_per_chat: env_or("BACKFILL_MAX_PER_CHAT", 200_usize),
            delay: env_millis("BACKFILL_DELAY_MS", Duration::from_secs(1)),
        };

        let notify_bot = match (opt_env("NOTIFY_BOT_TOKEN"), opt_env("NOTIFY_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(BotSinkCfg {
                token,
                chat_id: chat_id
                    .trim()
                    .parse()
                    .context("NOTIFY_CHAT_ID must be i64")?,
            }),
            (None, None) => None,
            _ => return Err(anyhow!("NOTIFY_BOT_TOKEN and NOTIFY_CHAT_ID must be set together")),
        };

        Ok(Self {
            tg,
            channels: parse_channels(&std::env::var("TG_CHANNELS").unwrap_or_default()),
            minus_words: parse_words(&std::env::var("MINUS_WORDS").unwrap_or_default()),
            hint_words: parse_words(&std::env::var("HINT_WORDS").unwrap_or_default()),
            port: env_or("PORT", 10_000_u16),
            backfill,
            dispatch,
            notify_bot,
        })
    }
}

fn must_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing env var {key}"))
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parsed value of `key`, or `default` when unset or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Chat names: `@handle`, `handle` or `https://t.me/handle` all become
/// `handle`.
pub fn parse_channels(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| {
            x.trim()
                .trim_start_matches("https://t.me/")
                .trim_start_matches("t.me/")
                .trim_start_matches('@')
                .trim_end_matches('/')
        })
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

pub fn parse_words(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}
