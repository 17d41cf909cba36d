//! Store API endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::I18nError;
use crate::file_search::{FileSearchStore, ListStoresResponse, PaginationParams};

use super::AppState;
use super::user::UserId;

/// Request body for POST /api/file-search/stores
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreBody {
    pub display_name: String,
}

/// Query parameters for delete operations
#[derive(Deserialize)]
pub struct DeleteParams {
    pub force: Option<bool>,
}

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/file-search/stores
pub async fn list_stores_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ListStoresResponse>, I18nError> {
    let stores = state
        .service
        .list_stores(&pagination)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(stores))
}

/// POST /api/file-search/stores
pub async fn create_store_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Json(request): Json<CreateStoreBody>,
) -> Result<(StatusCode, Json<FileSearchStore>), I18nError> {
    let store = state
        .service
        .create_store(&request.display_name)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// GET /api/file-search/stores/{id}
pub async fn get_store_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Path(id): Path<String>,
) -> Result<Json<FileSearchStore>, I18nError> {
    let store = state
        .service
        .get_store(&id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(store))
}

/// DELETE /api/file-search/stores/{id}
pub async fn delete_store_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, I18nError> {
    state
        .service
        .delete_store(&id, params.force)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(DeleteResponse {
        success: true,
        message: state.message("store-delete-success"),
    }))
}
