//! Response types for the File Search API.
//!
//! The API serializes 64-bit integers as JSON strings (`"sizeBytes": "1024"`),
//! so every count and size goes through [`lenient_u64`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A store: a collection of documents for semantic retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchStore {
    /// Resource name, e.g. `fileSearchStores/my-store-123abc`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub active_documents_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pending_documents_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub failed_documents_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size_bytes: u64,
}

impl FileSearchStore {
    /// Bare id of this store
    pub fn id(&self) -> &str {
        super::names::store_id(&self.name)
    }

    /// Active + pending + failed documents
    pub fn total_document_count(&self) -> u64 {
        self.active_documents_count
            .saturating_add(self.pending_documents_count)
            .saturating_add(self.failed_documents_count)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoresResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_search_stores: Vec<FileSearchStore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub display_name: String,
}

/// Processing state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentState {
    #[default]
    StateUnspecified,
    StatePending,
    StateActive,
    StateFailed,
}

/// A processed file inside a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchDocument {
    /// Resource name, e.g. `fileSearchStores/store-id/documents/doc-id`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: DocumentState,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Vec<CustomMetadata>>,
}

impl FileSearchDocument {
    pub fn id(&self) -> &str {
        super::names::document_id(&self.name)
    }
}

/// User-supplied key/value attached to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetadata {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_list_value: Option<StringList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringList {
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: Vec<FileSearchDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Status error carried by a finished operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

/// Long-running operation returned by uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl Operation {
    /// Terminal failure message, if the operation finished with an error
    pub fn failure_message(&self) -> Option<String> {
        if !self.done {
            return None;
        }
        self.error.as_ref().map(|e| {
            if e.message.is_empty() {
                "Operation failed".to_string()
            } else {
                e.message.clone()
            }
        })
    }

    /// Document name from a successful upload response, when present
    pub fn document_name(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.get("documentName").or_else(|| r.get("name")))
            .and_then(|v| v.as_str())
    }
}

// ==================== Generation ====================

/// Subset of a `generateContent` response used by the file-search tool
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(default)]
    pub retrieved_context: Option<RetrievedContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file_search_store: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub text: String,
}

/// Text and grounding extracted from the first candidate
#[derive(Debug, Clone, Default)]
pub struct GeneratedAnswer {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

impl From<GenerateContentResponse> for GeneratedAnswer {
    fn from(response: GenerateContentResponse) -> Self {
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Self::default();
        };
        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Self {
            text,
            grounding: candidate.grounding_metadata,
        }
    }
}

// ==================== Lenient decoding ====================

/// Accept a number, a numeric string, or anything else (as 0)
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
