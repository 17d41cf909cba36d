//! Per-user file search settings endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{I18nError, ServiceError};
use crate::user_settings::{FileSearchSettings, SettingsUpdate};

use super::AppState;
use super::user::UserId;

/// Response for settings writes
#[derive(Serialize)]
pub struct SaveResponse {
    pub success: bool,
}

/// Request body for POST /api/settings/file-search/stores
#[derive(Deserialize)]
pub struct StoreNameRequest {
    pub name: String,
}

/// Query parameters for DELETE /api/settings/file-search/stores
#[derive(Deserialize)]
pub struct StoreNameParams {
    pub name: Option<String>,
}

/// Request body for PUT /api/settings/file-search/selected
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectStoreRequest {
    #[serde(default)]
    pub selected_store: Option<String>,
}

/// GET /api/settings/file-search
pub async fn get_user_settings_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<FileSearchSettings>, I18nError> {
    let settings = state
        .service
        .get_user_settings(&user_id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(settings))
}

/// PUT /api/settings/file-search - partial update
pub async fn update_user_settings_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SaveResponse>, I18nError> {
    // Any shape or type mismatch gets the same message
    let update: SettingsUpdate = serde_json::from_value(body).map_err(|_| {
        state.i18n_error(ServiceError::invalid(state.message("validation-settings")))
    })?;

    state
        .service
        .update_user_settings(&user_id, update)
        .map_err(|e| match e {
            ServiceError::InvalidRequest { .. } => {
                state.i18n_error(ServiceError::invalid(state.message("validation-settings")))
            }
            other => state.i18n_error(other),
        })?;

    Ok(Json(SaveResponse { success: true }))
}

/// POST /api/settings/file-search/stores
pub async fn add_store_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(request): Json<StoreNameRequest>,
) -> Result<Json<FileSearchSettings>, I18nError> {
    let settings = state
        .service
        .add_user_store(&user_id, &request.name)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(settings))
}

/// DELETE /api/settings/file-search/stores?name=
pub async fn remove_store_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Query(params): Query<StoreNameParams>,
) -> Result<Json<FileSearchSettings>, I18nError> {
    let Some(name) = params.name.filter(|n| !n.trim().is_empty()) else {
        return Err(state.i18n_error(ServiceError::invalid(
            state.message("validation-store-name-required"),
        )));
    };
    let settings = state
        .service
        .remove_user_store(&user_id, &name)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(settings))
}

/// PUT /api/settings/file-search/selected - select a store, or clear with null
pub async fn select_store_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(request): Json<SelectStoreRequest>,
) -> Result<Json<FileSearchSettings>, I18nError> {
    let settings = state
        .service
        .select_user_store(&user_id, request.selected_store)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(settings))
}
