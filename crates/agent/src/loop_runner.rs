//! The sampling loop: call the model, run the tools it asks for, repeat.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use deskpilot_config::AppConfig;
use deskpilot_core::error::Result;
use deskpilot_core::insight::InsightStore;
use deskpilot_core::message::{ContentBlock, Conversation, Message};
use deskpilot_core::provider::{COMPUTER_USE_BETA, Provider, ProviderRequest};
use deskpilot_core::tool::{ToolCollection, ToolResult};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::adapter::make_tool_result;
use crate::insight::{InsightGenerator, recent_user_inputs};
use crate::janitor::ScreenshotJanitor;
use crate::observer::LoopObserver;
use crate::prompt;
use crate::pruner::{DEFAULT_REMOVAL_BATCH, prune_images};

/// What happened during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Model calls made
    pub turns: u32,
    /// Tool executions, successful or not
    pub tool_invocations: u64,
    /// Entries appended to the insight log
    pub insights_written: u64,
    /// Screenshots dropped from the conversation
    pub images_pruned: usize,
}

/// Drives a conversation until the model stops asking for tools.
pub struct SamplingLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolCollection>,
    insights: Arc<dyn InsightStore>,

    model: String,
    max_tokens: u32,
    system_prompt_suffix: String,
    base_prompt: String,

    /// Keep at most this many tool-result images (`None` or 0 keeps all)
    only_n_most_recent_images: Option<usize>,
    image_removal_batch: usize,

    insight_every: u64,
    insight_generator: InsightGenerator,

    janitor: Option<ScreenshotJanitor>,
}

impl SamplingLoop {
    /// Create a loop with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolCollection>,
        insights: Arc<dyn InsightStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            insights,
            model: model.into(),
            max_tokens: 4096,
            system_prompt_suffix: String::new(),
            base_prompt: prompt::default_base_prompt(),
            only_n_most_recent_images: None,
            image_removal_batch: DEFAULT_REMOVAL_BATCH,
            insight_every: 5,
            insight_generator: InsightGenerator::default(),
            janitor: None,
        }
    }

    /// Create a loop with every setting taken from the configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolCollection>,
        insights: Arc<dyn InsightStore>,
    ) -> Self {
        Self::new(provider, tools, insights, config.effective_model())
            .with_max_tokens(config.max_tokens)
            .with_system_prompt_suffix(config.system_prompt_suffix.clone())
            .with_image_limit(config.only_n_most_recent_images)
            .with_image_removal_batch(config.image_removal_batch)
            .with_insight_interval(config.insights.every_n_actions)
            .with_janitor(ScreenshotJanitor::with_retention_hours(
                &config.screenshots.dir,
                config.screenshots.retention_hours,
            ))
    }

    /// Set the token budget per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Text appended to the system prompt.
    pub fn with_system_prompt_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.system_prompt_suffix = suffix.into();
        self
    }

    /// Replace the built-in capability description.
    pub fn with_base_prompt(mut self, base: impl Into<String>) -> Self {
        self.base_prompt = base.into();
        self
    }

    pub fn with_image_limit(mut self, keep: Option<usize>) -> Self {
        self.only_n_most_recent_images = keep;
        self
    }

    pub fn with_image_removal_batch(mut self, batch: usize) -> Self {
        self.image_removal_batch = batch.max(1);
        self
    }

    /// Write an insight every `n` tool invocations.
    pub fn with_insight_interval(mut self, n: u64) -> Self {
        self.insight_every = n.max(1);
        self
    }

    pub fn with_insight_generator(mut self, generator: InsightGenerator) -> Self {
        self.insight_generator = generator;
        self
    }

    /// Sweep stale screenshots at the start of every run.
    pub fn with_janitor(mut self, janitor: ScreenshotJanitor) -> Self {
        self.janitor = Some(janitor);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The system prompt for a run, given the current insight log.
    pub fn system_prompt(&self, insights: &str) -> String {
        prompt::compose(&self.base_prompt, insights, &self.system_prompt_suffix)
    }

    /// Run turns until the model answers without tool use.
    ///
    /// Appends to `conversation` in place: each assistant turn, followed by
    /// one user turn with its tool results when it asked for tools. Model
    /// failures and insight log failures end the run; tool failures never do.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        observer: &dyn LoopObserver,
    ) -> Result<RunSummary> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            model = %self.model,
            provider = self.provider.name(),
            "Starting sampling loop"
        );

        if let Some(janitor) = &self.janitor {
            janitor.sweep().await;
        }

        // Read once so the prompt prefix stays identical across turns.
        let insights = self.insights.read_all().await?;
        let system = self.system_prompt(&insights);
        let tool_params = self.tools.to_params();

        let mut summary = RunSummary::default();

        loop {
            if let Some(keep) = self.only_n_most_recent_images.filter(|n| *n > 0) {
                summary.images_pruned +=
                    prune_images(&mut conversation.messages, Some(keep), self.image_removal_batch);
            }

            summary.turns += 1;
            debug!(
                conversation_id = %conversation.id,
                turn = summary.turns,
                messages = conversation.len(),
                "Calling model"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                system: system.clone(),
                messages: conversation.messages.clone(),
                tools: tool_params.clone(),
                max_tokens: self.max_tokens,
                betas: vec![COMPUTER_USE_BETA.to_string()],
            };

            let raw = self.provider.complete(request).await.map_err(|e| {
                error!(error = %e, turn = summary.turns, "Model call failed");
                e
            })?;

            observer.on_raw_response(&raw);

            let response = raw.parse().map_err(|e| {
                error!(error = %e, turn = summary.turns, "Unreadable model response");
                e
            })?;

            let mut tool_results = Vec::new();
            for block in &response.content {
                observer.on_content(block);

                let ContentBlock::ToolUse { id, name, input } = block else {
                    continue;
                };

                debug!(tool = %name, tool_use_id = %id, "Dispatching tool");
                let result = self.dispatch(name, input.clone()).await;

                tool_results.push(make_tool_result(&result, id));
                observer.on_tool_result(&result, id);

                summary.tool_invocations += 1;
                if summary.tool_invocations % self.insight_every == 0 {
                    let recent = recent_user_inputs(&conversation.messages);
                    let (rule, insight) =
                        self.insight_generator.generate_with_rule(&result, &recent);
                    self.insights.append(&insight).await?;
                    summary.insights_written += 1;
                    debug!(rule, insight = %insight, "Insight recorded");
                }
            }

            conversation.push(Message::assistant_blocks(response.content));

            if tool_results.is_empty() {
                info!(
                    conversation_id = %conversation.id,
                    turns = summary.turns,
                    tool_invocations = summary.tool_invocations,
                    "Sampling loop finished"
                );
                return Ok(summary);
            }

            conversation.push(Message::tool_results(tool_results));
        }
    }

    /// Run one tool. Errors and panics both come back as error results.
    async fn dispatch(&self, name: &str, input: serde_json::Value) -> ToolResult {
        let outcome = AssertUnwindSafe(self.tools.run(name, input))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::from_error(format!("Error in tool execution: {e}"))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tool = %name, panic = %message, "Tool panicked");
                ToolResult::from_error(format!("Error in tool execution: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("tool panicked: {s}")
    } else {
        "tool panicked".to_string()
    }
}
