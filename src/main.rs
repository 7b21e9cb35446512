mod bot;
mod chats;
mod classifier;
mod config;
mod health;
mod modes;
mod notify;
mod scope;
mod telegram;
#[cfg(test)]
mod testing;

use anyhow::Result;
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    modes::run_from_env().await
}
