//! Per-user file search settings.
//!
//! A user keeps a list of store names the chat tool may search, an optional
//! result count, and optionally one selected store. The selection only counts
//! while it is in the list.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchSettings {
    #[serde(default)]
    pub file_search_store_names: Vec<String>,
    #[serde(default)]
    pub file_search_top_k: Option<u32>,
    #[serde(default)]
    pub selected_store: Option<String>,
}

/// Partial update. For the nullable fields the outer `Option` says whether
/// the field was present and the inner one whether it was `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub file_search_store_names: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub file_search_top_k: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub selected_store: Option<Option<String>>,
}

/// Which stores the chat tool should search, and how many results to ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStoreConfig {
    pub store_names: Vec<String>,
    pub top_k: Option<u32>,
}

impl FileSearchSettings {
    /// Copy with the selection cleared if it is not a configured store
    pub fn normalized(&self) -> Self {
        let mut settings = self.clone();
        if settings
            .selected_store
            .as_ref()
            .is_some_and(|s| !settings.file_search_store_names.contains(s))
        {
            settings.selected_store = None;
        }
        settings
    }

    /// Merge a partial update
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<(), ServiceError> {
        let top_k = match update.file_search_top_k {
            None => None,
            Some(None) => Some(None),
            Some(Some(k)) => match u32::try_from(k) {
                Ok(k) if k > 0 => Some(Some(k)),
                _ => {
                    return Err(ServiceError::invalid(
                        "fileSearchTopK must be a positive integer",
                    ));
                }
            },
        };

        let mut selected = update.selected_store;
        if let (Some(Some(store)), Some(names)) = (&selected, &update.file_search_store_names) {
            if !names.contains(store) {
                selected = Some(None);
            }
        }

        if let Some(names) = update.file_search_store_names {
            self.file_search_store_names = names;
        }
        if let Some(top_k) = top_k {
            self.file_search_top_k = top_k;
        }
        if let Some(selected) = selected {
            self.selected_store = selected;
        }
        Ok(())
    }

    /// Add a store name. Blank and duplicate names are ignored.
    /// Returns whether the list changed.
    pub fn add_store(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.file_search_store_names.iter().any(|n| n == name) {
            return false;
        }
        self.file_search_store_names.push(name.to_string());
        true
    }

    /// Remove a store name, clearing the selection if it pointed there.
    /// Returns whether the list changed.
    pub fn remove_store(&mut self, name: &str) -> bool {
        let before = self.file_search_store_names.len();
        self.file_search_store_names.retain(|n| n != name);
        if self.selected_store.as_deref() == Some(name) {
            self.selected_store = None;
        }
        before != self.file_search_store_names.len()
    }

    /// Select a store, or clear the selection with `None`
    pub fn select_store(&mut self, name: Option<String>) {
        self.selected_store = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }

    /// Store and result count for the chat tool; `None` when no stores are configured
    pub fn tool_config(&self) -> Option<ToolStoreConfig> {
        let normalized = self.normalized();
        let store = normalized
            .selected_store
            .or_else(|| normalized.file_search_store_names.first().cloned())?;
        Some(ToolStoreConfig {
            store_names: vec![store],
            top_k: self.file_search_top_k,
        })
    }
}

/// Deserialize a field that is present (possibly `null`) as `Some(..)`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
