//! # veritrail-core
//!
//! The seams between the VERITRAIL audit core and its collaborators.
//!
//! This crate provides:
//! - `Tool` / `ToolRegistry`: external capabilities with an explicit
//!   blocking/async flag
//! - the `Brain`, `EventListener`, and `Attestor` traits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veritrail_core::{Tool, ToolRegistry};
//! use veritrail_contracts::event::EventKind;
//!
//! let mut tools = ToolRegistry::new();
//! tools.register(Tool::blocking("get_price", "Read the ETH price", json!({}), EventKind::Observation, |_| {
//!     Ok(json!({ "eth_usd": 2500 }))
//! }));
//! ```

pub mod registry;
pub mod tool;
pub mod traits;

pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDescriptor, ToolHandler, ToolResult};
pub use traits::{Attestor, Brain, EventListener, Receipt, RecordedEvent};
