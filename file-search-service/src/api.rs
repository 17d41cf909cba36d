//! HTTP API for the file search service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Store and document management
//! - Uploads and operation status
//! - Per-user file search settings
//! - The chat tool surface

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{I18nError, ServiceError};
use crate::service::FileSearchService;

pub mod documents;
pub mod settings;
pub mod stores;
pub mod tools;
pub mod upload;
pub mod user;
pub mod user_settings;

use documents::{delete_document_handler, get_document_handler, list_documents_handler};
use settings::{get_settings_handler, update_settings_handler};
use stores::{create_store_handler, delete_store_handler, get_store_handler, list_stores_handler};
use tools::{execute_tool_handler, list_tools_handler, query_handler};
use upload::{get_operation_handler, list_uploads_handler, upload_handler};
use user_settings::{
    add_store_handler, get_user_settings_handler, remove_store_handler, select_store_handler,
    update_user_settings_handler,
};

/// Application state
pub struct AppState {
    pub service: Arc<FileSearchService>,
    pub start_time: Instant,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), "en")
    }

    /// Translated message for `key`
    pub fn message(&self, key: &str) -> String {
        self.service.i18n.get("en", key, None)
    }
}

/// Build the API router
pub fn router(service: Arc<FileSearchService>, metrics: Option<PrometheusHandle>) -> Router {
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let file_search_routes = Router::new()
        .route(
            "/stores",
            get(list_stores_handler).post(create_store_handler),
        )
        .route(
            "/stores/{id}",
            get(get_store_handler).delete(delete_store_handler),
        )
        .route(
            "/stores/{id}/documents",
            get(list_documents_handler).delete(delete_document_handler),
        )
        .route("/stores/{id}/documents/{doc}", get(get_document_handler))
        .route(
            "/upload",
            // The handler enforces the live upload limit while streaming
            post(upload_handler)
                .layer(DefaultBodyLimit::disable())
                .get(get_operation_handler),
        )
        .route("/uploads", get(list_uploads_handler))
        .route("/query", post(query_handler));

    let api_routes = Router::new()
        .nest("/file-search", file_search_routes)
        // Tool endpoints
        .route("/tools", get(list_tools_handler))
        .route("/tools/{name}", post(execute_tool_handler))
        // Per-user settings
        .route(
            "/settings/file-search",
            get(get_user_settings_handler).put(update_user_settings_handler),
        )
        .route(
            "/settings/file-search/stores",
            post(add_store_handler).delete(remove_store_handler),
        )
        .route("/settings/file-search/selected", put(select_store_handler))
        // Service settings
        .route(
            "/settings",
            get(get_settings_handler).put(update_settings_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let api_key_configured = state.service.has_api_key();

    let status = if api_key_configured {
        state.service.i18n.get("en", "health-status-healthy", None)
    } else {
        state.service.i18n.format(
            "en",
            "health-status-degraded",
            &[("reason", "API key not configured")],
        )
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        api_key_configured,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    api_key_configured: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
