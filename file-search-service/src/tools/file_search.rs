//! File search tool: answers a query from the user's configured store.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::file_search::{
    FileSearchClient, Source, extract_sources, map_supports_to_chunks, store_name,
};
use crate::i18n::I18n;
use crate::user_settings::ToolStoreConfig;

/// Arguments the model supplies when calling the tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileSearchArgs {
    /// The question or topic to look up in the documents
    pub query: String,
}

/// Tool output handed back to the model.
///
/// Failures are reported in-band with `success: false`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchToolResult {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub store_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Answer segment to the titles of the documents supporting it
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub citations: HashMap<String, Vec<String>>,
}

impl FileSearchToolResult {
    fn failure(query: &str, store_name: String, error: String) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            results: None,
            error: Some(error),
            store_name,
            sources: None,
            citations: HashMap::new(),
        }
    }
}

pub struct FileSearchTool<'a> {
    client: &'a FileSearchClient,
    model: &'a str,
    i18n: &'a I18n,
}

impl<'a> FileSearchTool<'a> {
    pub fn new(client: &'a FileSearchClient, model: &'a str, i18n: &'a I18n) -> Self {
        Self {
            client,
            model,
            i18n,
        }
    }

    pub async fn execute(
        &self,
        args: &FileSearchArgs,
        config: &ToolStoreConfig,
        locale: &str,
    ) -> FileSearchToolResult {
        let store = config
            .store_names
            .first()
            .map(|s| store_name(s))
            .unwrap_or_default();
        let query = args.query.trim();

        if query.is_empty() {
            return FileSearchToolResult::failure(
                query,
                store,
                self.i18n.get(locale, "tool-search-failed", None),
            );
        }

        debug!(store = %store, query = %query, "Running file search tool");

        match self
            .client
            .generate_with_file_search(self.model, query, &config.store_names, config.top_k)
            .await
        {
            Ok(answer) => {
                metrics::counter!("file_search_tool_calls_total", "outcome" => "ok").increment(1);

                let results = if answer.text.trim().is_empty() {
                    self.i18n.get(locale, "tool-no-results", None)
                } else {
                    answer.text
                };
                let citations = answer
                    .grounding
                    .as_ref()
                    .map(|g| map_supports_to_chunks(&g.grounding_supports, &g.grounding_chunks))
                    .unwrap_or_default();

                FileSearchToolResult {
                    success: true,
                    query: query.to_string(),
                    results: Some(results),
                    error: None,
                    store_name: store,
                    sources: Some(extract_sources(answer.grounding.as_ref())),
                    citations,
                }
            }
            Err(e) => {
                metrics::counter!("file_search_tool_calls_total", "outcome" => "error")
                    .increment(1);
                warn!(store = %store, error = %e, "File search tool failed");
                FileSearchToolResult::failure(query, store, e.to_string())
            }
        }
    }
}
