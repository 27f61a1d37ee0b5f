//! Permissive decoding of brain responses.
//!
//! Models wrap their JSON in reasoning blocks, Markdown fences, and prose.
//! [`parse_decision`] peels those layers off in order:
//!
//! 1. drop everything up to the last `</think>` marker
//! 2. strip a surrounding code fence
//! 3. take the text from the first `{` to the last `}`
//! 4. decode that slice as a [`Decision`]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const THINK_CLOSE: &str = "</think>";
const FENCE: &str = "```";

/// What the brain asked for in one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form reasoning; recorded as part of the raw `THOUGHT` only.
    #[serde(default)]
    pub thought: Option<String>,

    /// Name of the tool to dispatch, if any.
    #[serde(default, alias = "action", alias = "tool_name")]
    pub tool: Option<String>,

    /// Keyword arguments for the tool.
    #[serde(default, alias = "parameters", alias = "args")]
    pub params: Value,

    /// The objective is achieved; stop the mission.
    #[serde(default, alias = "done")]
    pub complete: bool,
}

impl Decision {
    /// The requested tool name, ignoring blanks.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Parameters to hand to the tool; a missing or null value becomes `{}`.
    pub fn params_or_empty(&self) -> Value {
        if self.params.is_null() {
            Value::Object(Default::default())
        } else {
            self.params.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response JSON could not be decoded: {0}")]
    Malformed(String),
}

/// Decode a raw brain response.
pub fn parse_decision(raw: &str) -> Result<Decision, DecisionError> {
    let text = match raw.rfind(THINK_CLOSE) {
        Some(at) => &raw[at + THINK_CLOSE.len()..],
        None => raw,
    };
    let text = strip_fence(text.trim());

    let start = text.find('{').ok_or(DecisionError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(DecisionError::NoJsonObject)?;
    if end < start {
        return Err(DecisionError::NoJsonObject);
    }

    serde_json::from_str(&text[start..=end]).map_err(|e| DecisionError::Malformed(e.to_string()))
}

/// Remove one enclosing code fence (with optional language tag).
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    // The opening line may carry a language tag such as `json`.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    let body = body.trim_end();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_object() {
        let d = parse_decision(r#"{"thought":"check funds","tool":"get_balance","params":{}}"#).unwrap();
        assert_eq!(d.tool_name(), Some("get_balance"));
        assert_eq!(d.thought.as_deref(), Some("check funds"));
        assert!(!d.complete);
    }

    #[test]
    fn fenced_object_with_language_tag() {
        let raw = "```json\n{\"tool\": \"transfer\", \"params\": {\"amount\": 1}}\n```";
        let d = parse_decision(raw).unwrap();
        assert_eq!(d.tool_name(), Some("transfer"));
        assert_eq!(d.params, json!({ "amount": 1 }));
    }

    #[test]
    fn prose_around_object() {
        let raw = "Sure! Here is my decision: {\"action\": \"get_price\"} Let me know.";
        assert_eq!(parse_decision(raw).unwrap().tool_name(), Some("get_price"));
    }

    #[test]
    fn reasoning_block_is_discarded() {
        let raw = "<think>maybe {\"tool\": \"wrong\"}</think>\n{\"tool\": \"right\"}";
        assert_eq!(parse_decision(raw).unwrap().tool_name(), Some("right"));
    }

    #[test]
    fn aliases_and_completion() {
        let d = parse_decision(r#"{"done": true, "args": {"x": 1}}"#).unwrap();
        assert!(d.complete);
        assert_eq!(d.params, json!({ "x": 1 }));
        assert_eq!(d.tool_name(), None);
    }

    #[test]
    fn missing_params_become_empty_object() {
        let d = parse_decision(r#"{"tool": "get_balance"}"#).unwrap();
        assert_eq!(d.params_or_empty(), json!({}));
    }

    #[test]
    fn blank_tool_is_no_tool() {
        let d = parse_decision(r#"{"tool": "  "}"#).unwrap();
        assert_eq!(d.tool_name(), None);
    }

    #[test]
    fn no_object_is_an_error() {
        assert_eq!(parse_decision("I will wait."), Err(DecisionError::NoJsonObject));
        assert_eq!(parse_decision("} backwards {"), Err(DecisionError::NoJsonObject));
    }

    #[test]
    fn broken_json_is_malformed() {
        assert!(matches!(
            parse_decision("{\"tool\": \"x\", }"),
            Err(DecisionError::Malformed(_))
        ));
    }
}
