//! Tool trait: the abstraction over named external capabilities.
//!
//! A tool is reachable two ways: by its `name`, when the router model picks
//! it, and by its optional slash command, when the user types `/command`.
//! Every execution yields a short text fact; failures are facts too.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The result of a tool execution. Lives for one orchestration pass only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    /// The tool that produced this fact
    pub tool_name: String,

    /// The fact, or a description of what went wrong
    pub content: String,
}

impl ToolInvocationResult {
    pub fn new(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }
}

/// What the registry knows about a tool without running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique key for model-driven selection
    pub name: String,

    /// Natural-language description shown to the router model
    pub description: String,

    /// Unique key for explicit `/command` invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slash_command: Option<String>,
}

/// The core Tool trait.
///
/// `execute` is infallible by signature: an implementation that fails
/// internally must describe the failure in the returned content so that one
/// failing tool never aborts the others of a multi-tool pass.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the router model).
    fn description(&self) -> &str;

    /// The slash command that invokes this tool directly, without the leading `/`.
    fn slash_command(&self) -> Option<&str> {
        None
    }

    /// Run the tool with a free-text argument (possibly empty).
    async fn execute(&self, argument: &str) -> ToolInvocationResult;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            slash_command: self.slash_command().map(str::to_string),
        }
    }
}

/// A registry of available tools, indexed by name and by slash command.
///
/// Built once at startup, then shared read-only behind an `Arc`.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    by_slash: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            by_slash: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_lowercase();
        let slash = tool.slash_command().map(str::to_lowercase);

        let index = match self.by_name.get(&name) {
            Some(&existing) => {
                self.by_slash.retain(|_, i| *i != existing);
                self.tools[existing] = tool;
                existing
            }
            None => {
                self.tools.push(tool);
                self.tools.len() - 1
            }
        };

        self.by_name.insert(name, index);
        if let Some(slash) = slash {
            self.by_slash.insert(slash, index);
        }
    }

    /// Get a tool by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| self.tools[i].clone())
    }

    /// Get a tool by its slash command (case-insensitive, without `/`).
    pub fn by_slash_command(&self, command: &str) -> Option<Arc<dyn Tool>> {
        self.by_slash
            .get(&command.to_lowercase())
            .map(|&i| self.tools[i].clone())
    }

    /// Descriptors of every tool, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
