//! Request options for the File Search API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::responses::CustomMetadata;

/// Pagination parameters shared by the list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl PaginationParams {
    /// Encode as a query string, including the leading `?` when non-empty
    pub fn query_string(&self) -> String {
        let mut params = vec![];
        if let Some(size) = self.page_size.filter(|s| *s > 0) {
            params.push(format!("pageSize={}", size));
        }
        if let Some(token) = self.page_token.as_deref().filter(|t| !t.is_empty()) {
            params.push(format!("pageToken={}", urlencoding::encode(token)));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// Whitespace chunker settings applied upstream at ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteSpaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_chunk: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_overlap_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_space_config: Option<WhiteSpaceConfig>,
}

/// Metadata part of an upload request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Vec<CustomMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_config: Option<ChunkingConfig>,
}

/// Polling cadence for long-running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            timeout: Duration::from_secs(300),
        }
    }
}
