mod uploads;

pub use uploads::{TrackedUpload, UploadStatus, UploadTracker};

use arc_swap::ArcSwap;
use bytes::Bytes;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DynamicConfig, RuntimeConfig};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::file_search::{
    ChunkingConfig, CreateStoreRequest, CustomMetadata, FileSearchClient, FileSearchDocument,
    FileSearchError, FileSearchStore, ListDocumentsResponse, ListStoresResponse, Operation,
    PaginationParams, PollOptions, UploadOptions, format_bytes, poll_operation, store_name,
    validate_document_ref, validate_segment, validate_store_ref,
};
use crate::i18n::I18n;
use crate::tools::{FileSearchArgs, FileSearchTool, FileSearchToolResult, ToolName};
use crate::user_settings::{FileSearchSettings, SettingsUpdate};

/// Longest display name the upstream accepts for stores and documents
const MAX_DISPLAY_NAME_CHARS: usize = 512;

/// A file received for upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub store: String,
    pub file_name: String,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub custom_metadata: Option<Vec<CustomMetadata>>,
    pub chunking_config: Option<ChunkingConfig>,
    pub data: Bytes,
    /// Poll inline and return the finished operation
    pub wait: bool,
}

/// Result of starting an upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub operation: Operation,
    /// Whether the operation was polled to completion before returning
    pub completed: bool,
}

/// Main service coordinator
pub struct FileSearchService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub db: Arc<Database>,
    pub i18n: Arc<I18n>,
    /// Rebuilt whenever the upstream settings change
    client: ArcSwap<FileSearchClient>,
    uploads: Arc<UploadTracker>,
    shutdown: CancellationToken,
}

impl FileSearchService {
    /// Create a new service instance
    /// Accepts a pre-opened database so that RuntimeConfig can load settings from it
    pub fn new(db: Arc<Database>, runtime_config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        info!("Initializing file search service");

        let client = FileSearchClient::new(runtime_config.client_settings())?;
        if client.has_api_key() {
            info!(
                url = %runtime_config.static_config.upstream.api_base_url,
                "File search API configured"
            );
        } else {
            warn!("No API key configured; file search requests will fail until one is set");
        }

        Ok(Self {
            runtime_config,
            db,
            i18n: Arc::new(I18n::new()),
            client: ArcSwap::from_pointee(client),
            uploads: Arc::new(UploadTracker::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Current upstream client
    pub fn client(&self) -> Arc<FileSearchClient> {
        self.client.load_full()
    }

    pub fn has_api_key(&self) -> bool {
        self.client.load().has_api_key()
    }

    /// Largest file accepted for upload right now
    pub fn max_upload_size(&self) -> u64 {
        self.runtime_config.dynamic().limits.max_upload_size_bytes
    }

    /// Stop background pollers
    pub fn shutdown(&self) {
        info!("Stopping upload pollers");
        self.shutdown.cancel();
        self.uploads.cancel_pending();
    }

    // ==================== Service settings ====================

    pub fn get_settings(&self) -> HashMap<String, serde_json::Value> {
        self.runtime_config.dynamic().to_key_value_map()
    }

    /// Update settings and hot-reload affected components.
    ///
    /// `null` removes an override. Unknown keys and values of the wrong type
    /// reject the whole update.
    pub fn update_settings(&self, updates: HashMap<String, serde_json::Value>) -> ServiceResult<()> {
        let valid_keys = DynamicConfig::valid_keys();
        let mut candidate = DynamicConfig::clone(&self.runtime_config.dynamic());
        for (key, value) in &updates {
            if !valid_keys.contains(key.as_str()) {
                return Err(ServiceError::invalid(format!("Unknown setting: {}", key)));
            }
            if !value.is_null() && !candidate.apply_setting(key, value) {
                return Err(ServiceError::invalid(format!(
                    "Invalid value for {}: {}",
                    key, value
                )));
            }
        }

        // Persist to DB
        self.db.set_settings(updates)?;

        // Reload config from DB
        self.runtime_config.reload_from_db(&self.db)?;

        let client = FileSearchClient::new(self.runtime_config.client_settings())?;
        self.client.store(Arc::new(client));
        info!("Settings updated; file search client rebuilt");

        Ok(())
    }

    // ==================== Stores ====================

    pub async fn list_stores(&self, pagination: &PaginationParams) -> ServiceResult<ListStoresResponse> {
        Ok(self.client().list_stores(pagination).await?)
    }

    pub async fn get_store(&self, id: &str) -> ServiceResult<FileSearchStore> {
        validate_store_ref(id)?;
        let store = self.client().get_store(id).await?;
        debug!(
            store = %store.id(),
            documents = store.total_document_count(),
            size = %format_bytes(store.size_bytes),
            "Fetched store"
        );
        Ok(store)
    }

    pub async fn create_store(&self, display_name: &str) -> ServiceResult<FileSearchStore> {
        let display_name = validate_display_name(&self.i18n, display_name)?;
        let store = self
            .client()
            .create_store(&CreateStoreRequest {
                display_name: display_name.to_string(),
            })
            .await?;
        info!(store = %store.id(), display_name = %display_name, "Store created");
        Ok(store)
    }

    /// Delete a store. `force` defaults to the configured behaviour.
    pub async fn delete_store(&self, id: &str, force: Option<bool>) -> ServiceResult<()> {
        validate_store_ref(id)?;
        let force = force.unwrap_or(self.runtime_config.dynamic().stores.force_delete);
        self.client().delete_store(id, force).await?;
        info!(store = %store_name(id), force, "Store deleted");
        Ok(())
    }

    // ==================== Documents ====================

    pub async fn list_documents(
        &self,
        store: &str,
        pagination: &PaginationParams,
    ) -> ServiceResult<ListDocumentsResponse> {
        validate_store_ref(store)?;
        Ok(self.client().list_documents(store, pagination).await?)
    }

    pub async fn get_document(&self, store: &str, document: &str) -> ServiceResult<FileSearchDocument> {
        validate_store_ref(store)?;
        validate_document_ref(document)?;
        let document = self.client().get_document(store, document).await?;
        debug!(document = %document.id(), state = ?document.state, "Fetched document");
        Ok(document)
    }

    pub async fn delete_document(
        &self,
        store: &str,
        document: &str,
        force: Option<bool>,
    ) -> ServiceResult<()> {
        validate_store_ref(store)?;
        validate_document_ref(document)?;
        let force = force.unwrap_or(self.runtime_config.dynamic().stores.force_delete);
        self.client().delete_document(store, document, force).await?;
        info!(store = %store_name(store), document = %document, "Document deleted");
        Ok(())
    }

    // ==================== Uploads ====================

    /// Upload a file into a store.
    ///
    /// Without `wait`, the operation is returned as soon as the upstream
    /// accepts it and is polled in the background.
    pub async fn upload_document(
        &self,
        user_id: &str,
        request: UploadRequest,
    ) -> ServiceResult<UploadOutcome> {
        validate_store_ref(&request.store)?;
        if request.data.is_empty() {
            return Err(ServiceError::invalid(self.i18n.get(
                "en",
                "validation-file-required",
                None,
            )));
        }

        // Snapshot what we need; the guard must not live across awaits
        let (max_size, poll, track) = {
            let dynamic = self.runtime_config.dynamic();
            (
                dynamic.limits.max_upload_size_bytes,
                dynamic.operations.poll_options(),
                dynamic.operations.track_uploads,
            )
        };

        let size = request.data.len() as u64;
        if size > max_size {
            return Err(ServiceError::FileTooLarge {
                size,
                max: max_size,
            });
        }

        let display_name = match request.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => validate_display_name(&self.i18n, name)?.to_string(),
            _ => request.file_name.clone(),
        };

        let client = self.client();
        let options = UploadOptions {
            display_name: Some(display_name.clone()),
            mime_type: request.mime_type.clone(),
            custom_metadata: request.custom_metadata.clone(),
            chunking_config: request.chunking_config.clone(),
        };
        let operation = client
            .upload_to_store(&request.store, &request.data, &request.file_name, &options)
            .await?;

        info!(
            operation = %operation.name,
            store = %store_name(&request.store),
            display_name = %display_name,
            bytes = size,
            "Upload accepted"
        );

        if let Some(message) = operation.failure_message() {
            return Err(FileSearchError::OperationFailed {
                code: operation.error.as_ref().map(|e| e.code),
                message,
            }
            .into());
        }

        if operation.done {
            return Ok(UploadOutcome {
                operation,
                completed: true,
            });
        }

        if request.wait {
            let operation = poll_operation(client.as_ref(), &operation.name, poll).await?;
            return Ok(UploadOutcome {
                operation,
                completed: true,
            });
        }

        if track {
            self.track_upload(
                client,
                TrackedUpload::pending(
                    operation.name.clone(),
                    store_name(&request.store),
                    display_name,
                    user_id,
                ),
                poll,
            );
        }

        Ok(UploadOutcome {
            operation,
            completed: false,
        })
    }

    fn track_upload(
        &self,
        client: Arc<FileSearchClient>,
        upload: TrackedUpload,
        poll: PollOptions,
    ) {
        let name = upload.operation_name.clone();
        self.uploads.register(upload);

        let uploads = self.uploads.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(operation = %name, "Upload poller cancelled");
                }
                result = poll_operation(client.as_ref(), &name, poll) => {
                    match &result {
                        Ok(_) => info!(operation = %name, "Upload processed"),
                        Err(e) => warn!(operation = %name, error = %format_error_chain(e), "Upload did not complete"),
                    }
                    uploads.finish(&name, &result);
                }
            }
        });
    }

    /// Current state of an operation
    pub async fn get_operation(&self, name: &str) -> ServiceResult<Operation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid(self.i18n.get(
                "en",
                "validation-operation-name-required",
                None,
            )));
        }
        validate_segment("operation name", name)?;
        Ok(self.client().get_operation(name).await?)
    }

    /// Uploads this user started, newest first
    pub fn list_uploads(&self, user_id: &str) -> Vec<TrackedUpload> {
        self.uploads.for_user(user_id)
    }

    // ==================== User settings ====================

    pub fn get_user_settings(&self, user_id: &str) -> ServiceResult<FileSearchSettings> {
        Ok(self
            .db
            .get_user_settings(user_id)?
            .unwrap_or_default()
            .normalized())
    }

    pub fn update_user_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> ServiceResult<FileSearchSettings> {
        self.modify_user_settings(user_id, |settings| settings.apply(update))
    }

    pub fn add_user_store(&self, user_id: &str, name: &str) -> ServiceResult<FileSearchSettings> {
        if name.trim().is_empty() {
            return Err(ServiceError::invalid(self.i18n.get(
                "en",
                "validation-store-name-required",
                None,
            )));
        }
        self.modify_user_settings(user_id, |settings| {
            settings.add_store(name);
            Ok(())
        })
    }

    pub fn remove_user_store(&self, user_id: &str, name: &str) -> ServiceResult<FileSearchSettings> {
        self.modify_user_settings(user_id, |settings| {
            settings.remove_store(name);
            Ok(())
        })
    }

    pub fn select_user_store(
        &self,
        user_id: &str,
        name: Option<String>,
    ) -> ServiceResult<FileSearchSettings> {
        self.modify_user_settings(user_id, |settings| {
            settings.select_store(name);
            Ok(())
        })
    }

    fn modify_user_settings(
        &self,
        user_id: &str,
        modify: impl FnOnce(&mut FileSearchSettings) -> ServiceResult<()>,
    ) -> ServiceResult<FileSearchSettings> {
        let settings = self.db.update_user_settings(user_id, modify)?;
        debug!(user_id = %user_id, stores = settings.file_search_store_names.len(), "User settings saved");
        Ok(settings.normalized())
    }

    // ==================== Tools ====================

    /// Run the file search tool against the user's configured store
    pub async fn run_file_search_tool(
        &self,
        user_id: &str,
        args: &FileSearchArgs,
        locale: &str,
    ) -> ServiceResult<FileSearchToolResult> {
        let (enabled, model) = {
            let dynamic = self.runtime_config.dynamic();
            (dynamic.tool.enabled, dynamic.tool.model.clone())
        };

        let config = self.get_user_settings(user_id)?.tool_config();
        let Some(config) = config.filter(|_| enabled) else {
            return Ok(FileSearchToolResult {
                success: false,
                query: args.query.clone(),
                results: None,
                error: Some(self.i18n.get(locale, "tool-unavailable", None)),
                store_name: String::new(),
                sources: None,
                citations: HashMap::new(),
            });
        };

        let client = self.client();
        let tool = FileSearchTool::new(&client, &model, &self.i18n);
        Ok(tool.execute(args, &config, locale).await)
    }

    /// Execute a tool call by name with model-supplied arguments
    pub async fn execute_tool(
        &self,
        user_id: &str,
        name: &str,
        args: serde_json::Value,
        locale: &str,
    ) -> ServiceResult<serde_json::Value> {
        let tool = ToolName::from_str(name)
            .map_err(|_| ServiceError::invalid(format!("Unknown tool: {}", name)))?;

        match tool {
            ToolName::FileSearch => {
                let args: FileSearchArgs = serde_json::from_value(args).map_err(|e| {
                    ServiceError::invalid(format!("Invalid arguments for {}: {}", name, e))
                })?;
                let result = self.run_file_search_tool(user_id, &args, locale).await?;
                serde_json::to_value(result).map_err(|e| ServiceError::Internal {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Trimmed display name, 1..=512 characters
fn validate_display_name<'a>(i18n: &I18n, name: &'a str) -> ServiceResult<&'a str> {
    let name = name.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_DISPLAY_NAME_CHARS {
        return Err(ServiceError::invalid(i18n.get("en", "validation-display-name", None)));
    }
    Ok(name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::file_search::test_support::{Recorded, spawn_upstream, spawn_upstream_sequence};
    use axum::http::StatusCode;

    /// Service wired to a fake upstream at `base_url` and a temp database
    pub(crate) fn service_for(
        base_url: &str,
        api_key: Option<&str>,
    ) -> (FileSearchService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.db")).unwrap());

        let mut static_config = StaticConfig::default();
        static_config.credentials.api_key = api_key.map(str::to_string);
        static_config.storage.data_dir = dir.path().to_path_buf();
        static_config.upstream.api_base_url = format!("{}/v1beta", base_url);
        static_config.upstream.upload_base_url = format!("{}/upload/v1beta", base_url);

        let mut dynamic = DynamicConfig::default();
        dynamic.operations.poll_interval_ms = 10;
        dynamic.operations.poll_timeout_secs = 5;

        let runtime_config = Arc::new(RuntimeConfig::new(static_config, dynamic));
        let service = FileSearchService::new(db, runtime_config).unwrap();
        (service, dir)
    }

    async fn upstream(status: StatusCode, body: &str) -> (FileSearchService, Recorded, tempfile::TempDir) {
        let (base, recorded) = spawn_upstream(status, body).await;
        let (service, dir) = service_for(&base, Some("k"));
        (service, recorded, dir)
    }

    fn upload(data: &'static [u8], wait: bool) -> UploadRequest {
        UploadRequest {
            store: "rules".to_string(),
            file_name: "core.pdf".to_string(),
            display_name: None,
            mime_type: Some("application/pdf".to_string()),
            custom_metadata: None,
            chunking_config: None,
            data: Bytes::from_static(data),
            wait,
        }
    }

    #[tokio::test]
    async fn display_name_is_validated_before_calling_upstream() {
        let (service, recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        let err = service.create_store("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        let long = "x".repeat(513);
        assert!(service.create_store(&long).await.is_err());
        assert!(recorded.all().is_empty());
    }

    #[tokio::test]
    async fn path_ids_cannot_rewrite_upstream_url() {
        let (service, recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        assert!(service.get_store("abc?force=true").await.is_err());
        assert!(service.get_document("abc", "../other").await.is_err());
        assert!(recorded.all().is_empty());
    }

    #[tokio::test]
    async fn delete_store_uses_configured_force_default() {
        let (service, recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        service.delete_store("abc", None).await.unwrap();
        service.delete_store("abc", Some(false)).await.unwrap();

        let requests = recorded.all();
        assert!(requests[0].uri.ends_with("?force=true"));
        assert!(requests[1].uri.ends_with("?force=false"));
    }

    #[tokio::test]
    async fn upload_rejects_empty_and_oversized_files() {
        let (service, recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        let err = service.upload_document("alice", upload(b"", false)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        let mut settings = HashMap::new();
        settings.insert(
            "limits.max_upload_size_bytes".to_string(),
            serde_json::json!(4),
        );
        service.update_settings(settings).unwrap();

        let err = service
            .upload_document("alice", upload(b"too large", false))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FileTooLarge { size: 9, max: 4 }));
        assert!(recorded.all().is_empty());
    }

    #[tokio::test]
    async fn waited_upload_returns_final_operation() {
        // Upstream reports the operation finished on acceptance
        let (service, recorded, _dir) = upstream(
            StatusCode::OK,
            r#"{"name":"fileSearchStores/rules/upload/operations/op-1","done":true,"response":{"documentName":"fileSearchStores/rules/documents/d1"}}"#,
        )
        .await;

        let outcome = service
            .upload_document("alice", upload(b"%PDF", true))
            .await
            .unwrap();
        assert!(outcome.completed);
        assert_eq!(
            outcome.operation.document_name(),
            Some("fileSearchStores/rules/documents/d1")
        );
        assert_eq!(recorded.all().len(), 1);
    }

    #[tokio::test]
    async fn waited_upload_polls_until_done() {
        let (base, recorded) = spawn_upstream_sequence(&[
            (
                StatusCode::OK,
                r#"{"name":"fileSearchStores/rules/upload/operations/op-3","done":false}"#,
            ),
            (
                StatusCode::OK,
                r#"{"name":"fileSearchStores/rules/upload/operations/op-3","done":false}"#,
            ),
            (
                StatusCode::OK,
                r#"{"name":"fileSearchStores/rules/upload/operations/op-3","done":true,"response":{"documentName":"fileSearchStores/rules/documents/d3"}}"#,
            ),
        ])
        .await;
        let (service, _dir) = service_for(&base, Some("k"));

        let outcome = service
            .upload_document("alice", upload(b"%PDF", true))
            .await
            .unwrap();
        assert!(outcome.completed);
        assert!(outcome.operation.done);
        assert_eq!(
            outcome.operation.document_name(),
            Some("fileSearchStores/rules/documents/d3")
        );

        let requests = recorded.all();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "POST");
        for poll in &requests[1..] {
            assert_eq!(poll.method, "GET");
            assert_eq!(poll.uri, "/v1beta/fileSearchStores/rules/upload/operations/op-3");
        }
        // Waited uploads are not handed to the background tracker
        assert!(service.list_uploads("alice").is_empty());
    }

    #[tokio::test]
    async fn waited_upload_reports_failure_found_while_polling() {
        let (base, _recorded) = spawn_upstream_sequence(&[
            (StatusCode::OK, r#"{"name":"op-4","done":false}"#),
            (
                StatusCode::OK,
                r#"{"name":"op-4","done":true,"error":{"code":3,"message":"Document could not be parsed"}}"#,
            ),
        ])
        .await;
        let (service, _dir) = service_for(&base, Some("k"));

        let err = service
            .upload_document("alice", upload(b"%PDF", true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::FileSearch(FileSearchError::OperationFailed { .. })
        ));
        assert_eq!(err.to_string(), "Document could not be parsed");
    }

    #[tokio::test]
    async fn background_upload_is_tracked_to_completion() {
        let (base, _recorded) = spawn_upstream(
            StatusCode::OK,
            r#"{"name":"fileSearchStores/rules/upload/operations/op-2","done":false}"#,
        )
        .await;
        let (service, _dir) = service_for(&base, Some("k"));

        let outcome = service
            .upload_document("alice", upload(b"%PDF", false))
            .await
            .unwrap();
        assert!(!outcome.completed);

        let uploads = service.list_uploads("alice");
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].operation_name, "fileSearchStores/rules/upload/operations/op-2");
        assert_eq!(uploads[0].store_name, "fileSearchStores/rules");
        assert_eq!(uploads[0].display_name, "core.pdf");
        assert!(service.list_uploads("bob").is_empty());

        service.shutdown();
        assert_eq!(service.list_uploads("alice")[0].status, UploadStatus::Cancelled);
    }

    #[tokio::test]
    async fn failed_upload_operation_is_an_error() {
        let (service, _recorded, _dir) = upstream(
            StatusCode::OK,
            r#"{"name":"op","done":true,"error":{"code":3,"message":"Unsupported MIME type"}}"#,
        )
        .await;

        let err = service
            .upload_document("alice", upload(b"data", false))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported MIME type");
    }

    #[tokio::test]
    async fn settings_update_rejects_unknown_and_invalid() {
        let (service, _recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        let unknown = HashMap::from([("nope".to_string(), serde_json::json!(1))]);
        assert!(service.update_settings(unknown).is_err());

        let invalid = HashMap::from([(
            "operations.poll_interval_ms".to_string(),
            serde_json::json!("fast"),
        )]);
        assert!(service.update_settings(invalid).is_err());

        let valid = HashMap::from([("tool.model".to_string(), serde_json::json!("gemini-2.5-flash"))]);
        service.update_settings(valid).unwrap();
        assert_eq!(service.get_settings()["tool.model"], "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn upstream_host_cannot_be_changed_at_runtime() {
        let (home, home_recorded) = spawn_upstream(StatusCode::OK, "{}").await;
        let (elsewhere, elsewhere_recorded) = spawn_upstream(StatusCode::OK, "{}").await;
        let (service, _dir) = service_for(&home, Some("k"));

        for key in ["gemini.api_base_url", "gemini.upload_base_url"] {
            let err = service
                .update_settings(HashMap::from([(
                    key.to_string(),
                    serde_json::json!(format!("{}/v1beta", elsewhere)),
                )]))
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest { .. }), "{key}");
        }

        // A valid change still rebuilds the client against the same host
        service
            .update_settings(HashMap::from([(
                "gemini.request_timeout_secs".to_string(),
                serde_json::json!(30),
            )]))
            .unwrap();
        service.get_store("b").await.unwrap();

        assert!(elsewhere_recorded.all().is_empty());
        assert_eq!(home_recorded.last().uri, "/v1beta/fileSearchStores/b");
        assert_eq!(home_recorded.last().headers["x-goog-api-key"], "k");
    }

    #[tokio::test]
    async fn user_settings_persist_per_user() {
        let (service, _recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        assert_eq!(
            service.get_user_settings("alice").unwrap(),
            FileSearchSettings::default()
        );

        service.add_user_store("alice", "rules").unwrap();
        service.add_user_store("alice", "lore").unwrap();
        let settings = service
            .select_user_store("alice", Some("lore".to_string()))
            .unwrap();
        assert_eq!(settings.selected_store.as_deref(), Some("lore"));

        let settings = service.remove_user_store("alice", "lore").unwrap();
        assert_eq!(settings.file_search_store_names, vec!["rules".to_string()]);
        assert_eq!(settings.selected_store, None);

        assert!(service.add_user_store("alice", "  ").is_err());
        assert_eq!(
            service.get_user_settings("bob").unwrap(),
            FileSearchSettings::default()
        );
    }

    #[test]
    fn concurrent_store_additions_are_all_saved() {
        let (service, _dir) = service_for("http://127.0.0.1:9", Some("k"));

        std::thread::scope(|scope| {
            for i in 0..64 {
                let service = &service;
                scope.spawn(move || {
                    service
                        .add_user_store("alice", &format!("store-{i}"))
                        .unwrap();
                });
            }
        });

        let settings = service.get_user_settings("alice").unwrap();
        assert_eq!(settings.file_search_store_names.len(), 64);
    }

    #[tokio::test]
    async fn tool_is_unavailable_without_stores() {
        let (service, recorded, _dir) = upstream(StatusCode::OK, "{}").await;

        let result = service
            .execute_tool("alice", "file_search", serde_json::json!({ "query": "q" }), "en")
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "No file search store is configured");
        assert!(recorded.all().is_empty());

        assert!(service
            .execute_tool("alice", "nope", serde_json::json!({}), "en")
            .await
            .is_err());
        assert!(service
            .execute_tool("alice", "file_search", serde_json::json!({}), "en")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn tool_searches_selected_store() {
        let (service, recorded, _dir) = upstream(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":"answer"}]}}]}"#,
        )
        .await;
        service.add_user_store("alice", "rules").unwrap();
        service.add_user_store("alice", "lore").unwrap();
        service
            .select_user_store("alice", Some("lore".to_string()))
            .unwrap();

        let result = service
            .run_file_search_tool(
                "alice",
                &FileSearchArgs {
                    query: "who rules?".to_string(),
                },
                "en",
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.store_name, "fileSearchStores/lore");

        let body: serde_json::Value = serde_json::from_slice(&recorded.last().body).unwrap();
        assert_eq!(
            body["tools"][0]["fileSearch"]["fileSearchStoreNames"],
            serde_json::json!(["fileSearchStores/lore"])
        );
        assert_eq!(
            recorded.last().uri,
            "/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }
}
