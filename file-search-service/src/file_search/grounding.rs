//! Helpers for reading grounding metadata attached to generated answers.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::responses::{GroundingChunk, GroundingMetadata, GroundingSupport};

/// A retrieved document that contributed to an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub title: String,
    pub text: String,
    pub store: String,
}

/// One source per distinct title, in first-seen order
pub fn extract_sources(metadata: Option<&GroundingMetadata>) -> Vec<Source> {
    let Some(metadata) = metadata else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    metadata
        .grounding_chunks
        .iter()
        .filter_map(|chunk| chunk.retrieved_context.as_ref())
        .filter(|ctx| seen.insert(ctx.title.clone()))
        .map(|ctx| Source {
            title: ctx.title.clone(),
            text: ctx.text.clone(),
            store: ctx.file_search_store.clone(),
        })
        .collect()
}

/// Map each supported answer segment to the titles of the chunks backing it.
///
/// Indices outside `chunks` are skipped; segments left with no titles are omitted.
pub fn map_supports_to_chunks(
    supports: &[GroundingSupport],
    chunks: &[GroundingChunk],
) -> HashMap<String, Vec<String>> {
    let mut mapping = HashMap::new();

    for support in supports {
        let titles: Vec<String> = support
            .grounding_chunk_indices
            .iter()
            .filter_map(|&idx| chunks.get(idx))
            .filter_map(|chunk| chunk.retrieved_context.as_ref())
            .map(|ctx| ctx.title.clone())
            .filter(|title| !title.is_empty())
            .collect();

        if !titles.is_empty() {
            mapping.insert(support.segment.text.clone(), titles);
        }
    }

    mapping
}
