//! Resource-name helpers.
//!
//! The API addresses everything by hierarchical resource names:
//! `fileSearchStores/{store}` and `fileSearchStores/{store}/documents/{doc}`.
//! Callers may pass either a bare id or a full name; these helpers normalize
//! between the two.

use crate::error::ServiceError;

/// Prefix shared by all store resource names
pub const STORE_PREFIX: &str = "fileSearchStores/";

const DOCUMENTS_SEGMENT: &str = "/documents/";

/// Full store name from an id or an already-qualified name
pub fn store_name(id_or_name: &str) -> String {
    if id_or_name.starts_with(STORE_PREFIX) {
        id_or_name.to_string()
    } else {
        format!("{STORE_PREFIX}{id_or_name}")
    }
}

/// Bare store id from a full store name
pub fn store_id(name: &str) -> &str {
    name.strip_prefix(STORE_PREFIX).unwrap_or(name)
}

/// Full document name. A `document` that is already qualified wins over `store`.
pub fn document_name(store: &str, document: &str) -> String {
    if document.contains(DOCUMENTS_SEGMENT) {
        document.to_string()
    } else {
        format!("{}{DOCUMENTS_SEGMENT}{document}", store_name(store))
    }
}

/// Bare document id from a full document name
pub fn document_id(name: &str) -> &str {
    match name.split_once(DOCUMENTS_SEGMENT) {
        Some((_, id)) if !id.is_empty() => id,
        _ => name,
    }
}

/// Reject identifiers that would alter the shape of an upstream URL.
///
/// `kind` names the identifier in the error message.
pub fn validate_segment(kind: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::invalid(format!("{kind} is required")));
    }
    let bad_char = value
        .chars()
        .any(|c| c == '?' || c == '#' || c == '%' || c.is_whitespace());
    if bad_char || value.contains("..") {
        return Err(ServiceError::invalid(format!("Invalid {kind}: {value}")));
    }
    Ok(())
}

/// Validate a store reference, which may be an id or a full store name
pub fn validate_store_ref(value: &str) -> Result<(), ServiceError> {
    let id = store_id(value);
    validate_segment("store id", id)?;
    if id.contains('/') {
        return Err(ServiceError::invalid(format!("Invalid store id: {value}")));
    }
    Ok(())
}

/// Validate a document reference, which may be an id or a full document name
pub fn validate_document_ref(value: &str) -> Result<(), ServiceError> {
    validate_segment("document name", value)?;
    match value.split_once(DOCUMENTS_SEGMENT) {
        Some((store, id)) => {
            validate_store_ref(store)?;
            if id.is_empty() || id.contains('/') {
                return Err(ServiceError::invalid(format!(
                    "Invalid document name: {value}"
                )));
            }
            Ok(())
        }
        None if value.contains('/') => Err(ServiceError::invalid(format!(
            "Invalid document name: {value}"
        ))),
        None => Ok(()),
    }
}

/// Human-readable byte size using binary units (`1536` -> `1.5 KB`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0} {}", rounded, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_name_is_idempotent() {
        assert_eq!(store_name("abc-123"), "fileSearchStores/abc-123");
        assert_eq!(store_name("fileSearchStores/abc-123"), "fileSearchStores/abc-123");
        assert_eq!(store_id("fileSearchStores/abc-123"), "abc-123");
        assert_eq!(store_id("abc-123"), "abc-123");
    }

    #[test]
    fn document_name_prefers_qualified_document() {
        assert_eq!(
            document_name("s1", "d1"),
            "fileSearchStores/s1/documents/d1"
        );
        assert_eq!(
            document_name("fileSearchStores/s1", "d1"),
            "fileSearchStores/s1/documents/d1"
        );
        assert_eq!(
            document_name("other", "fileSearchStores/s1/documents/d1"),
            "fileSearchStores/s1/documents/d1"
        );
    }

    #[test]
    fn document_id_falls_back_to_input() {
        assert_eq!(document_id("fileSearchStores/s1/documents/d1"), "d1");
        assert_eq!(document_id("d1"), "d1");
    }

    #[test]
    fn segment_validation_rejects_url_tricks() {
        assert!(validate_segment("store id", "my-store").is_ok());
        assert!(validate_segment("store id", "").is_err());
        assert!(validate_segment("store id", "a?force=false").is_err());
        assert!(validate_segment("store id", "a#b").is_err());
        assert!(validate_segment("store id", "..").is_err());
        assert!(validate_segment("store id", "has space").is_err());
    }

    #[test]
    fn store_and_document_refs() {
        assert!(validate_store_ref("fileSearchStores/abc").is_ok());
        assert!(validate_store_ref("abc").is_ok());
        assert!(validate_store_ref("abc/documents/x").is_err());

        assert!(validate_document_ref("doc-1").is_ok());
        assert!(validate_document_ref("fileSearchStores/s/documents/doc-1").is_ok());
        assert!(validate_document_ref("fileSearchStores/s/documents/").is_err());
        assert!(validate_document_ref("s/other/doc").is_err());
    }

    #[test]
    fn format_bytes_matches_display_rules() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
        assert_eq!(format_bytes(5 * 1024u64.pow(5)), "5120 TB");
    }
}
