//! `deskpilot insights`: print what the agent has learned so far.

use anyhow::Context;
use deskpilot_config::AppConfig;
use deskpilot_core::insight::InsightStore;
use deskpilot_memory::FileInsightStore;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    let store = FileInsightStore::new(&config.insights.path);

    let log = store
        .read_all()
        .await
        .with_context(|| format!("failed to read {}", store.path().display()))?;

    if log.trim().is_empty() {
        println!("No insights recorded yet ({}).", store.path().display());
    } else {
        print!("{log}");
    }
    Ok(())
}
