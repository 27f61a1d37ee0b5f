//! Name-indexed tool catalog.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, warn};

use crate::tool::{Tool, ToolDescriptor};

/// The tools a mission may dispatch to, keyed by name.
///
/// Ordered by name so the catalog the brain sees is stable between steps.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.  A tool with the same name is replaced.
    pub fn register(&mut self, tool: Tool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            warn!(tool = %name, "tool re-registered, previous definition replaced");
        } else {
            debug!(tool = %name, "tool registered");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors of every registered tool, in name order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use veritrail_contracts::event::EventKind;

    use super::*;

    fn tool(name: &str, description: &str) -> Tool {
        Tool::blocking(name, description, Value::Null, EventKind::Action, |_| Ok(json!(null)))
    }

    #[test]
    fn registry_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(tool("transfer", "moves funds"));
        assert!(registry.contains("transfer"));
        assert!(!registry.contains("swap"));
        assert_eq!(registry.get("transfer").unwrap().descriptor.description, "moves funds");
    }

    #[test]
    fn descriptors_are_name_ordered() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("zeta", ""));
        registry.register(tool("alpha", ""));
        registry.register(tool("mid", ""));
        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn duplicate_registration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("transfer", "v1"));
        registry.register(tool("transfer", "v2"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("transfer").unwrap().descriptor.description, "v2");
    }
}
