//! External tool descriptions and invocation.
//!
//! A `Tool` pairs a descriptor (what the brain is told about it) with a
//! handler.  Whether the handler blocks or returns a future is declared at
//! registration through [`ToolHandler`], never inferred at call time:
//!
//! - `Blocking` handlers run on tokio's blocking pool, so a caller-side
//!   timeout can stop waiting for them even if they never return.
//! - `Async` handlers run as their own tokio task.
//!
//! Either way a panic inside the handler is contained and comes back as
//! `ToolError::Panicked`.

use std::{future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use veritrail_contracts::{error::ToolError, event::EventKind};

/// Boxed, sendable future returned by async tool handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Result of one tool call.
pub type ToolResult = Result<Value, ToolError>;

/// Synchronous tool body.
pub type BlockingFn = Arc<dyn Fn(Value) -> ToolResult + Send + Sync>;

/// Asynchronous tool body.
pub type AsyncFn = Arc<dyn Fn(Value) -> BoxFuture<ToolResult> + Send + Sync>;

/// The callable behind a tool, tagged with its execution model.
#[derive(Clone)]
pub enum ToolHandler {
    Blocking(BlockingFn),
    Async(AsyncFn),
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Blocking(_) => f.write_str("ToolHandler::Blocking"),
            ToolHandler::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

/// What the brain sees about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-Schema-like description of the keyword arguments.
    /// `Value::Null` means "no constraint".
    pub parameters: Value,
    /// Kind of event a call produces: `Observation` for reads, `Action` for
    /// side effects.
    pub kind: EventKind,
}

/// A named external capability.
#[derive(Debug, Clone)]
pub struct Tool {
    pub descriptor: ToolDescriptor,
    pub handler: ToolHandler,
}

impl Tool {
    /// Register a synchronous tool.
    pub fn blocking<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        kind: EventKind,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> ToolResult + Send + Sync + 'static,
    {
        Self {
            descriptor: ToolDescriptor {
                name: name.into(),
                description: description.into(),
                parameters,
                kind,
            },
            handler: ToolHandler::Blocking(Arc::new(f)),
        }
    }

    /// Register an asynchronous tool.
    pub fn asynchronous<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        kind: EventKind,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            descriptor: ToolDescriptor {
                name: name.into(),
                description: description.into(),
                parameters,
                kind,
            },
            handler: ToolHandler::Async(Arc::new(move |params| -> BoxFuture<ToolResult> {
                Box::pin(f(params))
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Run the tool with `params`, honouring its declared execution model.
    ///
    /// A panicking handler surfaces as `ToolError::Panicked` instead of
    /// unwinding into the caller.  Dropping the returned future stops the
    /// wait, not the handler.
    pub async fn invoke(&self, params: Value) -> ToolResult {
        match &self.handler {
            ToolHandler::Blocking(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(params))
                    .await
                    .map_err(|e| ToolError::Panicked(e.to_string()))?
            }
            ToolHandler::Async(f) => tokio::spawn(f(params))
                .await
                .map_err(|e| ToolError::Panicked(e.to_string()))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn blocking_tool_returns_value() {
        let tool = Tool::blocking("add", "adds", Value::Null, EventKind::Action, |p| {
            let a = p["a"].as_i64().unwrap_or(0);
            let b = p["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        });
        assert_eq!(tool.invoke(json!({ "a": 2, "b": 3 })).await, Ok(json!(5)));
    }

    #[tokio::test]
    async fn async_tool_returns_value() {
        let tool = Tool::asynchronous("echo", "echoes", Value::Null, EventKind::Observation, |p| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(p)
        });
        assert_eq!(tool.invoke(json!("hi")).await, Ok(json!("hi")));
    }

    #[tokio::test]
    async fn tool_failure_passes_through() {
        let tool = Tool::blocking("boom", "fails", Value::Null, EventKind::Action, |_| {
            Err(ToolError::Failed("insufficient funds".to_string()))
        });
        assert_eq!(
            tool.invoke(json!({})).await,
            Err(ToolError::Failed("insufficient funds".to_string()))
        );
    }

    #[tokio::test]
    async fn blocking_panic_becomes_tool_error() {
        let tool = Tool::blocking("panics", "panics", Value::Null, EventKind::Action, |_| panic!("kaboom"));
        assert!(matches!(tool.invoke(json!({})).await, Err(ToolError::Panicked(_))));
    }

    #[tokio::test]
    async fn async_panic_becomes_tool_error() {
        let tool = Tool::asynchronous("panics", "panics", Value::Null, EventKind::Action, |_| async {
            let empty: Vec<Value> = Vec::new();
            Ok(empty[3].clone())
        });
        assert!(matches!(tool.invoke(json!({})).await, Err(ToolError::Panicked(_))));
    }

    #[test]
    fn descriptor_serializes_kind_by_wire_name() {
        let tool = Tool::blocking("get_balance", "reads balance", json!({ "type": "object" }), EventKind::Observation, |_| Ok(json!(1)));
        let v = serde_json::to_value(&tool.descriptor).unwrap();
        assert_eq!(v["kind"], json!("OBSERVATION"));
        assert_eq!(v["parameters"]["type"], json!("object"));
    }
}
