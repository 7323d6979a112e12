//! `deskpilot agent`: single-message or interactive computer-use session.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use deskpilot_agent::{LoopObserver, RunSummary, SamplingLoop, ScreenshotStore, screenshot_file_name};
use deskpilot_config::{AppConfig, RetryConfig};
use deskpilot_core::error::ProviderError;
use deskpilot_core::message::{ContentBlock, Conversation, Message};
use deskpilot_core::provider::RawResponse;
use deskpilot_core::tool::ToolResult;
use deskpilot_memory::FileInsightStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Prints the run to the terminal and saves screenshots to disk.
struct ConsoleObserver {
    screenshots: ScreenshotStore,
    echo_raw_responses: bool,
}

impl ConsoleObserver {
    fn new(screenshots: ScreenshotStore) -> Self {
        Self {
            screenshots,
            echo_raw_responses: false,
        }
    }

    fn with_raw_responses(mut self, echo: bool) -> Self {
        self.echo_raw_responses = echo;
        self
    }
}

impl LoopObserver for ConsoleObserver {
    fn on_content(&self, block: &ContentBlock) {
        if let ContentBlock::Text { text } = block {
            for line in text.lines() {
                println!("  Assistant > {line}");
            }
        }
    }

    fn on_tool_result(&self, result: &ToolResult, tool_use_id: &str) {
        if let Some(output) = result.output_text() {
            println!("  > Tool Output [{tool_use_id}]: {output}");
        }
        if let Some(error) = result.error_text() {
            println!("  !!! Tool Error [{tool_use_id}]: {error}");
        }
        if let Some(image) = result.image() {
            match self.screenshots.save(tool_use_id, image) {
                Ok(_) => println!("  Took screenshot {}", screenshot_file_name(tool_use_id)),
                Err(e) => warn!(tool_use_id, error = %e, "Could not save screenshot"),
            }
        }
    }

    fn on_raw_response(&self, response: &RawResponse) {
        if !self.echo_raw_responses {
            return;
        }
        let text = response.text_content();
        if !text.is_empty() {
            println!("  [response {}] {text}", response.status);
        }
    }
}

/// Run the loop, retrying failed attempts.
///
/// Partial turns from a failed attempt stay in the conversation for the
/// next one. After the last attempt fails, the conversation is rolled back
/// to before the latest user message.
async fn run_with_retry(
    agent: &SamplingLoop,
    conversation: &mut Conversation,
    observer: &dyn LoopObserver,
    retry: &RetryConfig,
) -> anyhow::Result<RunSummary> {
    let rollback_to = conversation.len().saturating_sub(1);
    let attempts = retry.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match agent.run(conversation, observer).await {
            Ok(summary) => return Ok(summary),
            Err(e) => {
                eprintln!("  [Error] attempt {attempt}/{attempts}: {e}");
                last_error = Some(e);
                if attempt < attempts {
                    eprintln!("  Retrying in {} seconds...", retry.delay_secs);
                    tokio::time::sleep(Duration::from_secs(retry.delay_secs)).await;
                }
            }
        }
    }

    while conversation.len() > rollback_to {
        conversation.pop();
    }

    let error = last_error
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow::anyhow!("no attempts were made"));
    Err(error.context(format!("giving up after {attempts} attempts")))
}

async fn process(
    agent: &SamplingLoop,
    conversation: &mut Conversation,
    observer: &dyn LoopObserver,
    retry: &RetryConfig,
    text: &str,
) -> anyhow::Result<()> {
    conversation.push(Message::user(text));
    eprintln!("  Processing your request...");
    let summary = run_with_retry(agent, conversation, observer, retry).await?;
    info!(
        turns = summary.turns,
        tools = summary.tool_invocations,
        insights = summary.insights_written,
        "Request processed"
    );
    Ok(())
}

pub async fn run(message: Option<String>, words: Vec<String>, verbose: bool) -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;

    let provider = match deskpilot_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            eprintln!();
            eprintln!("  ERROR: {reason}");
            eprintln!();
            eprintln!("  Set the ANTHROPIC_API_KEY environment variable, or add it to:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            anyhow::bail!("provider not configured");
        }
        Err(e) => return Err(e.into()),
    };

    let tools = Arc::new(deskpilot_tools::default_collection(&config.display));
    let insights = Arc::new(FileInsightStore::new(&config.insights.path));
    let agent = SamplingLoop::from_config(&config, provider, tools, insights);

    let observer = ConsoleObserver::new(ScreenshotStore::new(&config.screenshots.dir))
        .with_raw_responses(verbose);
    let mut conversation = Conversation::new();

    if let Some(msg) = message {
        return process(&agent, &mut conversation, &observer, &config.retry, &msg).await;
    }

    println!();
    println!("  DeskPilot, interactive mode");
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", agent.model());
    println!("  Type your request and press Enter. 'exit' or Ctrl+D quits.");
    println!();

    let initial = words.join(" ");
    if !initial.trim().is_empty() {
        println!("  You > {initial}");
        let outcome = process(&agent, &mut conversation, &observer, &config.retry, &initial).await;
        if let Err(e) = outcome {
            eprintln!("  [Error] {e:#}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let outcome = process(&agent, &mut conversation, &observer, &config.retry, line).await;
        if let Err(e) = outcome {
            eprintln!("  [Error] {e:#}");
        }
    }

    println!();
    Ok(())
}
