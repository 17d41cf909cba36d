//! Upload API endpoints.
//!
//! Handlers for sending files to a store and following the resulting
//! operations.

use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{I18nError, ServiceError};
use crate::file_search::{ChunkingConfig, CustomMetadata, Operation};
use crate::service::{TrackedUpload, UploadRequest};

use super::AppState;
use super::user::UserId;

/// Largest accepted value for the form fields other than `file`
const MAX_FIELD_BYTES: u64 = 64 * 1024;

/// Query parameters for GET /api/file-search/upload
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationParams {
    pub operation_name: Option<String>,
}

enum FieldRead {
    Complete(Bytes),
    /// Limit exceeded after this many bytes
    TooLarge(u64),
}

/// POST /api/file-search/upload
///
/// Multipart fields: `file`, `storeName`, optional `displayName`, optional
/// `wait` (`true` to poll until processing finishes), optional JSON
/// `customMetadata` and `chunkingConfig`.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Operation>), I18nError> {
    let max_size = state.service.max_upload_size();

    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut store_name: Option<String> = None;
    let mut display_name: Option<String> = None;
    let mut custom_metadata: Option<Vec<CustomMetadata>> = None;
    let mut chunking_config: Option<ChunkingConfig> = None;
    let mut wait = false;

    let invalid = |e: MultipartError| state.i18n_error(ServiceError::invalid(e.body_text()));

    while let Some(mut field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let mime_type = field
                    .content_type()
                    .and_then(|ct| ct.parse::<mime::Mime>().ok())
                    .filter(|m| *m != mime::APPLICATION_OCTET_STREAM)
                    .map(|m| m.essence_str().to_string());
                let data = match read_limited(&mut field, max_size).await.map_err(invalid)? {
                    FieldRead::Complete(data) => data,
                    FieldRead::TooLarge(size) => {
                        return Err(state.i18n_error(ServiceError::FileTooLarge {
                            size,
                            max: max_size,
                        }));
                    }
                };
                file = Some((data, file_name, mime_type));
            }
            "storeName" => store_name = Some(read_text(&state, &mut field, &name).await?),
            "displayName" => display_name = Some(read_text(&state, &mut field, &name).await?),
            "wait" => {
                let value = read_text(&state, &mut field, &name).await?;
                wait = matches!(value.trim(), "true" | "1");
            }
            "customMetadata" => {
                custom_metadata = Some(read_json(&state, &mut field, &name).await?);
            }
            "chunkingConfig" => {
                chunking_config = Some(read_json(&state, &mut field, &name).await?);
            }
            _ => {}
        }
    }

    let Some((data, file_name, mime_type)) = file else {
        return Err(state.i18n_error(ServiceError::invalid(
            state.message("validation-file-required"),
        )));
    };
    let Some(store) = store_name.filter(|s| !s.trim().is_empty()) else {
        return Err(state.i18n_error(ServiceError::invalid(
            state.message("validation-store-name-required"),
        )));
    };

    let outcome = state
        .service
        .upload_document(
            &user_id,
            UploadRequest {
                store: store.trim().to_string(),
                file_name,
                display_name,
                mime_type,
                custom_metadata,
                chunking_config,
                data,
                wait,
            },
        )
        .await
        .map_err(|e| state.i18n_error(e))?;

    let status = if outcome.completed {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(outcome.operation)))
}

/// Read a field, stopping as soon as it grows past `limit` bytes
async fn read_limited(field: &mut Field<'_>, limit: u64) -> Result<FieldRead, MultipartError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        let size = (buf.len() + chunk.len()) as u64;
        if size > limit {
            return Ok(FieldRead::TooLarge(size));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(FieldRead::Complete(buf.freeze()))
}

async fn read_text(
    state: &AppState,
    field: &mut Field<'_>,
    name: &str,
) -> Result<String, I18nError> {
    let bytes = match read_limited(field, MAX_FIELD_BYTES).await {
        Ok(FieldRead::Complete(bytes)) => bytes,
        Ok(FieldRead::TooLarge(_)) => {
            return Err(state.i18n_error(ServiceError::invalid(format!("{} is too long", name))));
        }
        Err(e) => return Err(state.i18n_error(ServiceError::invalid(e.body_text()))),
    };
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        state.i18n_error(ServiceError::invalid(format!("{} must be UTF-8 text", name)))
    })
}

async fn read_json<T: DeserializeOwned>(
    state: &AppState,
    field: &mut Field<'_>,
    name: &str,
) -> Result<T, I18nError> {
    let text = read_text(state, field, name).await?;
    serde_json::from_str(&text).map_err(|e| {
        state.i18n_error(ServiceError::invalid(format!("Invalid {}: {}", name, e)))
    })
}

/// GET /api/file-search/upload?operationName=
pub async fn get_operation_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Query(params): Query<OperationParams>,
) -> Result<Json<Operation>, I18nError> {
    let operation = state
        .service
        .get_operation(params.operation_name.as_deref().unwrap_or(""))
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(operation))
}

/// GET /api/file-search/uploads
pub async fn list_uploads_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Json<Vec<TrackedUpload>> {
    Json(state.service.list_uploads(&user_id))
}
