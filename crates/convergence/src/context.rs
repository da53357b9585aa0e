//! Run context: the shared execution environment for one pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::EventDispatcher;

/// Facts about the node being converged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFacts {
    platform: String,
    #[serde(default)]
    facts: BTreeMap<String, String>,
}

impl NodeFacts {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            facts: BTreeMap::new(),
        }
    }

    /// Facts for the machine this process runs on.
    pub fn local() -> Self {
        Self::new(std::env::consts::OS)
    }

    /// Platform tag used for provider resolution ("linux", "macos").
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.facts.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }
}

/// Shared execution environment: node facts, the why-run flag, and the
/// event dispatcher.
///
/// The why-run flag is threaded through here rather than read from
/// process-wide state, so contexts with different modes can coexist
/// (test runs included). Providers read it once per `run_action`.
pub struct RunContext {
    pub node: NodeFacts,
    pub why_run: bool,
    pub events: EventDispatcher,
}

impl RunContext {
    pub fn new(node: NodeFacts) -> Self {
        Self {
            node,
            why_run: false,
            events: EventDispatcher::new(),
        }
    }

    /// Enable or disable why-run (dry-run) mode for this context.
    pub fn with_why_run(mut self, enabled: bool) -> Self {
        self.why_run = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts_access() {
        let mut node = NodeFacts::new("linux");
        node.set("hostname", "builder");
        assert_eq!(node.platform(), "linux");
        assert_eq!(node.get("hostname"), Some("builder"));
        assert_eq!(node.get("missing"), None);
    }

    #[test]
    fn test_contexts_with_different_modes_coexist() {
        let real = RunContext::new(NodeFacts::new("linux"));
        let dry = RunContext::new(NodeFacts::new("linux")).with_why_run(true);
        assert!(!real.why_run);
        assert!(dry.why_run);
    }
}
