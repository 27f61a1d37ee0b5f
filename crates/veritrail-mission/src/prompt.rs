//! Prompt assembly.

use std::fmt::Write as _;

use veritrail_contracts::{canonical::canonical_bytes, event::Event};
use veritrail_core::ToolDescriptor;

/// The per-mission system prompt: objective, tool catalog, and the answer
/// format the decision parser expects.
pub fn system_prompt(objective: &str, tools: &[ToolDescriptor]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are an autonomous agent. Every tool call you make is recorded in a tamper-evident audit trail."
    );
    let _ = writeln!(prompt, "Objective: {objective}");
    prompt.push('\n');

    if tools.is_empty() {
        prompt.push_str("No tools are available.\n");
    } else {
        prompt.push_str("Available tools:\n");
        for tool in tools {
            let _ = writeln!(prompt, "- {} ({}): {}", tool.name, tool.kind, tool.description);
            if !tool.parameters.is_null() {
                let _ = writeln!(prompt, "  parameters: {}", tool.parameters);
            }
        }
    }

    prompt.push_str(concat!(
        "\nAnswer with exactly one JSON object and nothing else:\n",
        "{\"thought\": \"<your reasoning>\", \"tool\": \"<tool name or null>\", ",
        "\"params\": {<arguments>}, \"complete\": false}\n",
        "Set \"complete\" to true once the objective has been achieved.\n",
    ));
    prompt
}

/// The per-step user prompt: progress and the latest recorded events.
pub fn user_prompt(step: u32, max_steps: u32, recent: &[Event]) -> String {
    let mut prompt = format!("Step {step} of {max_steps}.\n");

    if recent.is_empty() {
        prompt.push_str("No events recorded yet.\n");
        return prompt;
    }

    prompt.push_str("Recent events, oldest first:\n");
    for event in recent {
        let _ = writeln!(
            prompt,
            "- [{}] {} inputs={} output={}",
            event.kind,
            event.tool_name,
            compact(&event.inputs),
            compact(&event.output),
        );
    }
    prompt
}

/// Single-line, key-sorted rendering so the prompt is stable across runs.
fn compact(value: &serde_json::Value) -> String {
    String::from_utf8_lossy(&canonical_bytes(value)).into_owned()
}
