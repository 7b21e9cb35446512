mod backfill;
mod live;
mod shared;

pub use backfill::{BackfillCfg, scan_recent};
pub use live::listen;
pub use shared::Pipeline;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::classifier::RequestClassifier;
use crate::config::AppCfg;
use crate::notify::Dispatcher;
use crate::telegram::{self, TgDirectory};
use crate::{health, scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Live listening plus a one-shot backfill at startup.
    All,
    Live,
    Backfill,
}

impl RunMode {
    fn from_env() -> Self {
        let raw = std::env::var("RUN_MODE").unwrap_or_else(|_| "all".into());
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "live" => Self::Live,
            "backfill" | "scan" => Self::Backfill,
            _ => Self::All,
        }
    }
}

pub async fn run_from_env() -> Result<()> {
    let mode = RunMode::from_env();
    let cfg = AppCfg::from_env()?;
    info!("Starting in {mode:?} mode");

    if mode != RunMode::Backfill {
        health::spawn(cfg.port).await?;
    }

    let conn = telegram::connect(&cfg.tg).await?;
    let directory = Arc::new(TgDirectory::new(conn.client.clone()));

    let scope = scope::resolve(directory.as_ref(), &cfg.channels).await;
    info!("Scope: {scope}");
    let classifier = RequestClassifier::new(&cfg.minus_words, &cfg.hint_words);
    info!("Classifier config: {classifier}");

    let (sink, report_chats) = shared::build_sink(&cfg, &conn.client).await?;
    let dispatcher = Dispatcher::new(sink, cfg.dispatch.clone());
    info!("Dispatcher config: {dispatcher}");

    let pipeline = Arc::new(Pipeline {
        scope,
        classifier,
        dispatcher,
        report_chats,
    });

    match mode {
        RunMode::Backfill => {
            let found = scan_recent(directory.as_ref(), &pipeline, &cfg.backfill).await;
            info!("Backfill-only run finished with {found} match(es)");
        }
        RunMode::All | RunMode::Live => {
            if mode == RunMode::All {
                let pipeline = Arc::clone(&pipeline);
                let directory = Arc::clone(&directory);
                let backfill = cfg.backfill.clone();
                tokio::spawn(async move {
                    scan_recent(directory.as_ref(), &pipeline, &backfill).await;
                });
            }
            listen(&pipeline, conn.feed).await;
        }
    }

    Ok(())
}
