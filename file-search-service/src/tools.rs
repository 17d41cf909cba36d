//! Chat tools the model can call during generation.
//!
//! This module contains:
//! - The tool registry (names, descriptions, parameter schemas)
//! - The file search tool, which answers a query from the user's stores

mod file_search;
pub mod registry;

pub use file_search::{FileSearchArgs, FileSearchTool, FileSearchToolResult};
pub use registry::{REGISTRY, ToolDefinition, ToolName};
