//! Settings API endpoints for managing service configuration at runtime.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::I18nError;

use super::user::UserId;

/// Response for GET /api/settings
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// All current settings (merged: defaults + DB overrides)
    pub settings: HashMap<String, serde_json::Value>,
    /// Which keys have DB overrides (vs using defaults)
    pub overridden: Vec<String>,
}

/// Request body for PUT /api/settings
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Settings to update (key -> value). Use null to delete/revert to default.
    pub settings: HashMap<String, serde_json::Value>,
}

/// GET /api/settings - retrieve all settings with their current values
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
) -> Result<Json<SettingsResponse>, I18nError> {
    settings_response(&state)
}

/// PUT /api/settings - update settings (triggers hot reload)
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    _user: UserId,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, I18nError> {
    state
        .service
        .update_settings(request.settings)
        .map_err(|e| state.i18n_error(e))?;

    settings_response(&state)
}

fn settings_response(state: &AppState) -> Result<Json<SettingsResponse>, I18nError> {
    // Get DB overrides to know which keys are explicitly set
    let db_settings = state
        .service
        .db
        .get_all_settings()
        .map_err(|e| state.i18n_error(e))?;

    let mut overridden: Vec<String> = db_settings.into_keys().collect();
    overridden.sort();

    Ok(Json(SettingsResponse {
        settings: state.service.get_settings(),
        overridden,
    }))
}
