//! Gemini File Search API integration.
//!
//! This module wraps the upstream API that owns stores, documents, chunking
//! and retrieval. Nothing here persists state; every call is forwarded and
//! the responses are normalized (numeric strings coerced, names qualified).

mod client;
mod error;
mod grounding;
mod names;
mod options;
mod polling;
mod responses;

pub use client::{ClientSettings, FileSearchClient};
pub use error::FileSearchError;
pub use grounding::{Source, extract_sources, map_supports_to_chunks};
pub use names::{
    format_bytes, store_name, validate_document_ref, validate_segment, validate_store_ref,
};
pub use options::{ChunkingConfig, PaginationParams, PollOptions, UploadOptions};
pub use polling::poll_operation;
pub use responses::{
    CreateStoreRequest, CustomMetadata, FileSearchDocument, FileSearchStore,
    ListDocumentsResponse, ListStoresResponse, Operation,
};

#[cfg(test)]
pub(crate) use client::tests as test_support;
