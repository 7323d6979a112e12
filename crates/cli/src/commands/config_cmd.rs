//! `deskpilot config`: show the effective configuration.

use anyhow::Context;
use deskpilot_config::AppConfig;

pub fn run(default: bool) -> anyhow::Result<()> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().context("failed to load config")?;
    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!("{config:#?}");
    println!();
    println!("Model:    {}", config.effective_model());
    if !config.has_api_key() {
        println!("API key:  not set (export ANTHROPIC_API_KEY or add api_key to config.toml)");
    }
    Ok(())
}
