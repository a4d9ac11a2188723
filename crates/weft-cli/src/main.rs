use std::time::Duration;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weft_core::app::RegistryStatus;
use weft_core::config::{LoggingConfig, WeftConfig};

mod assets;
mod messages;

pub type DemoError = Box<dyn std::error::Error + Send + Sync>;

const DEMO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Summary {
    messages: RegistryStatus,
    assets: RegistryStatus,
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    // ignore error: a subscriber may already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    // (A) 設定: 引数があれば JSON ファイルから
    let config = match std::env::args().nth(1) {
        Some(path) => WeftConfig::from_path(path)?,
        None => WeftConfig::default(),
    };
    init_logging(&config.logging);

    // (B) 3 本のスレッドでメッセージを受け渡す
    let cfg = config.clone();
    let messages =
        tokio::task::spawn_blocking(move || messages::run(&cfg, DEMO_TIMEOUT)).await??;
    info!(tasks = ?messages.tasks, "message demo finished");

    // (C) ローダースレッドと tick 駆動のホストループ
    let assets = assets::run(&config, DEMO_TIMEOUT).await?;
    info!(tasks = ?assets.tasks, "asset demo finished");

    let summary = Summary { messages, assets };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
