//! Chat tool endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::error::I18nError;
use crate::tools::{FileSearchArgs, FileSearchToolResult, REGISTRY, ToolDefinition};

use super::AppState;
use super::user::UserId;

/// GET /api/tools
pub async fn list_tools_handler(_user: UserId) -> Json<Vec<ToolDefinition>> {
    Json(REGISTRY.definitions())
}

/// POST /api/tools/{name} - execute a tool call with the caller's settings
pub async fn execute_tool_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(name): Path<String>,
    Json(args): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, I18nError> {
    let result = state
        .service
        .execute_tool(&user_id, &name, args, "en")
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(result))
}

/// POST /api/file-search/query
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(args): Json<FileSearchArgs>,
) -> Result<Json<FileSearchToolResult>, I18nError> {
    let result = state
        .service
        .run_file_search_tool(&user_id, &args, "en")
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{get_as, json_as, send, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn lists_tool_definitions() {
        let app = test_app(StatusCode::OK, "{}").await;

        let (status, body) = send(&app.router, get_as("/api/tools", "alice")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["type"], "function");
        assert_eq!(body[0]["function"]["name"], "file_search");
    }

    #[tokio::test]
    async fn query_uses_callers_store() {
        let app = test_app(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":"Found it."}]}}]}"#,
        )
        .await;
        app.service.add_user_store("alice", "rules").unwrap();

        let (status, body) = send(
            &app.router,
            json_as(
                "POST",
                "/api/file-search/query",
                "alice",
                serde_json::json!({ "query": "where is it?" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["results"], "Found it.");
        assert_eq!(body["storeName"], "fileSearchStores/rules");

        // Another user without stores gets an in-band failure
        let (status, body) = send(
            &app.router,
            json_as(
                "POST",
                "/api/file-search/query",
                "bob",
                serde_json::json!({ "query": "where is it?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn upstream_failure_stays_in_band() {
        let app = test_app(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Quota exceeded"}}"#,
        )
        .await;
        app.service.add_user_store("alice", "rules").unwrap();

        let (status, body) = send(
            &app.router,
            json_as(
                "POST",
                "/api/tools/file_search",
                "alice",
                serde_json::json!({ "query": "anything" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Quota exceeded");
    }

    #[tokio::test]
    async fn unknown_tool_is_400() {
        let app = test_app(StatusCode::OK, "{}").await;

        let (status, _) = send(
            &app.router,
            json_as("POST", "/api/tools/nope", "alice", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
