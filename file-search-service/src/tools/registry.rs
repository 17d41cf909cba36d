//! Tool registry.
//!
//! Tool names are derived from enum variants via strum, so the name the
//! model sends back always parses to the handler it was advertised for.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::file_search::FileSearchArgs;

/// All tool names as an exhaustive enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    FileSearch,
}

/// Metadata for a tool definition.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: ToolName,

    /// Description shown to the model
    pub description: &'static str,

    /// JSON Schema for tool parameters (called lazily to avoid static initialization issues)
    pub parameters: fn() -> serde_json::Value,
}

/// Tool definition in the function-calling format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry of all tools
pub struct ToolRegistry {
    tools: HashMap<ToolName, ToolMetadata>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let tools = ToolName::iter()
            .map(|name| (name, metadata(name)))
            .collect();
        Self { tools }
    }

    /// All tools as function-calling definitions, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name.to_string(),
                    description: t.description.to_string(),
                    parameters: (t.parameters)(),
                },
            })
            .collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global singleton registry instance
pub static REGISTRY: LazyLock<ToolRegistry> = LazyLock::new(ToolRegistry::new);

// Exhaustive match: a new variant does not compile without its metadata
fn metadata(name: ToolName) -> ToolMetadata {
    match name {
        ToolName::FileSearch => ToolMetadata {
            name,
            description: "Search the user's uploaded documents in their configured file search store. \
                Use this for questions about the content of those documents. Returns an answer \
                grounded in the documents along with the sources it drew on.",
            parameters: || {
                serde_json::to_value(schemars::schema_for!(FileSearchArgs))
                    .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
            },
        },
    }
}
