//! Insight generation.
//!
//! Every few tool actions the loop writes one short heuristic note to the
//! insight log. The note is chosen by an ordered rule list; the first rule
//! whose predicate matches renders the sentence.

use deskpilot_core::message::{Message, Role};
use deskpilot_core::tool::ToolResult;

/// How many trailing messages are searched for recent user inputs.
pub const RECENT_WINDOW: usize = 5;

/// Does this rule apply to (tool result, recent user inputs)?
pub type Predicate = fn(&ToolResult, &[String]) -> bool;

/// Render the insight sentence.
pub type Render = fn(&ToolResult, &[String]) -> String;

/// A named (predicate, render) pair.
#[derive(Clone, Copy)]
pub struct InsightRule {
    pub name: &'static str,
    pub applies: Predicate,
    pub render: Render,
}

/// Ordered insight rules; first match wins.
#[derive(Clone)]
pub struct InsightGenerator {
    rules: Vec<InsightRule>,
}

const FALLBACK: &str = "No significant outcome. Consider revising the approach or inputs.";

impl InsightGenerator {
    /// An empty generator. Produces the fallback sentence until rules are added.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: InsightRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[InsightRule] {
        &self.rules
    }

    /// Derive one sentence from a tool result and the recent user inputs.
    pub fn generate(&self, result: &ToolResult, recent_inputs: &[String]) -> String {
        self.generate_with_rule(result, recent_inputs).1
    }

    /// Like [`generate`](Self::generate), also naming the rule that matched
    /// (`"fallback"` when none did).
    pub fn generate_with_rule(
        &self,
        result: &ToolResult,
        recent_inputs: &[String],
    ) -> (&'static str, String) {
        self.rules
            .iter()
            .find(|rule| (rule.applies)(result, recent_inputs))
            .map(|rule| (rule.name, (rule.render)(result, recent_inputs)))
            .unwrap_or_else(|| ("fallback", FALLBACK.to_string()))
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::empty()
            .with_rule(InsightRule {
                name: "error",
                applies: |result, _| result.error_text().is_some(),
                render: |result, _| {
                    format!(
                        "Error encountered: {}. Check the command syntax or permissions.",
                        result.error_text().unwrap_or_default()
                    )
                },
            })
            .with_rule(InsightRule {
                name: "email",
                applies: |result, inputs| {
                    result.output_text().is_some()
                        && inputs
                            .last()
                            .is_some_and(|latest| latest.to_lowercase().contains("email"))
                },
                render: |_, _| {
                    "Successfully sent an email. Ensure the subject line is correctly placed."
                        .to_string()
                },
            })
            .with_rule(InsightRule {
                name: "output",
                applies: |result, _| result.output_text().is_some(),
                render: |_, _| {
                    "Command executed successfully. Review the output for further improvements."
                        .to_string()
                },
            })
            .with_rule(InsightRule {
                name: "fallback",
                applies: |_, _| true,
                render: |_, _| FALLBACK.to_string(),
            })
    }
}

/// Text of the user turns among the last [`RECENT_WINDOW`] messages, oldest
/// first. Turns that only carry tool results are skipped.
pub fn recent_user_inputs(messages: &[Message]) -> Vec<String> {
    let start = messages.len().saturating_sub(RECENT_WINDOW);
    messages[start..]
        .iter()
        .filter(|m| m.role == Role::User && !m.is_tool_result_turn())
        .filter_map(Message::text)
        .collect()
}
