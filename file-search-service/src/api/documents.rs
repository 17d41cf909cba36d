//! Document API endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{I18nError, ServiceError};
use crate::file_search::{FileSearchDocument, ListDocumentsResponse, PaginationParams};

use super::AppState;
use super::stores::DeleteResponse;
use super::user::UserId;

/// Query parameters for DELETE /api/file-search/stores/{id}/documents
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentParams {
    pub document_name: Option<String>,
    pub force: Option<bool>,
}

/// GET /api/file-search/stores/{id}/documents
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Path(id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ListDocumentsResponse>, I18nError> {
    let documents = state
        .service
        .list_documents(&id, &pagination)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(documents))
}

/// GET /api/file-search/stores/{id}/documents/{doc}
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Path((id, doc)): Path<(String, String)>,
) -> Result<Json<FileSearchDocument>, I18nError> {
    let document = state
        .service
        .get_document(&id, &doc)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(document))
}

/// DELETE /api/file-search/stores/{id}/documents?documentName=
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Path(id): Path<String>,
    Query(params): Query<DeleteDocumentParams>,
) -> Result<Json<DeleteResponse>, I18nError> {
    let Some(document_name) = params.document_name.filter(|n| !n.trim().is_empty()) else {
        return Err(state.i18n_error(ServiceError::invalid(
            state.message("validation-document-name-required"),
        )));
    };

    state
        .service
        .delete_document(&id, document_name.trim(), params.force)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(DeleteResponse {
        success: true,
        message: state.message("document-delete-success"),
    }))
}
