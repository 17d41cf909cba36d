//! File Search API client implementation.

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::error::FileSearchError;
use super::names::{document_name, store_name};
use super::options::{PaginationParams, UploadOptions};
use super::polling::OperationSource;
use super::responses::{
    CreateStoreRequest, FileSearchDocument, FileSearchStore, GenerateContentResponse,
    GeneratedAnswer, ListDocumentsResponse, ListStoresResponse, Operation,
};

/// Header carrying the API key; keeps the key out of URLs and logs
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for the client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub upload_base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Error body returned by the API on non-success statuses
#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// File Search API client
#[derive(Clone)]
pub struct FileSearchClient {
    client: Client,
    api_base_url: String,
    upload_base_url: String,
    api_key: Option<String>,
}

impl FileSearchClient {
    /// Create a new client
    pub fn new(settings: ClientSettings) -> Result<Self, FileSearchError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("file-search-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FileSearchError::Connection {
                url: settings.api_base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: settings.upload_base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Whether an API key is available
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    // ==================== Stores ====================

    /// List stores, one page at a time
    pub async fn list_stores(
        &self,
        pagination: &PaginationParams,
    ) -> Result<ListStoresResponse, FileSearchError> {
        let url = format!(
            "{}/fileSearchStores{}",
            self.api_base_url,
            pagination.query_string()
        );
        self.send_json("list_stores", Method::GET, &url, |b| b).await
    }

    /// Get a single store by id or name
    pub async fn get_store(&self, id_or_name: &str) -> Result<FileSearchStore, FileSearchError> {
        let url = format!("{}/{}", self.api_base_url, store_name(id_or_name));
        self.send_json("get_store", Method::GET, &url, |b| b).await
    }

    /// Create a new store
    pub async fn create_store(
        &self,
        request: &CreateStoreRequest,
    ) -> Result<FileSearchStore, FileSearchError> {
        let url = format!("{}/fileSearchStores", self.api_base_url);
        self.send_json("create_store", Method::POST, &url, |b| b.json(request))
            .await
    }

    /// Delete a store. With `force`, its documents are deleted too.
    pub async fn delete_store(&self, id_or_name: &str, force: bool) -> Result<(), FileSearchError> {
        let url = format!(
            "{}/{}?force={}",
            self.api_base_url,
            store_name(id_or_name),
            force
        );
        self.send("delete_store", Method::DELETE, &url, |b| b)
            .await
            .map(|_| ())
    }

    // ==================== Documents ====================

    /// List documents in a store
    pub async fn list_documents(
        &self,
        store: &str,
        pagination: &PaginationParams,
    ) -> Result<ListDocumentsResponse, FileSearchError> {
        let url = format!(
            "{}/{}/documents{}",
            self.api_base_url,
            store_name(store),
            pagination.query_string()
        );
        self.send_json("list_documents", Method::GET, &url, |b| b)
            .await
    }

    /// Get a single document
    pub async fn get_document(
        &self,
        store: &str,
        document: &str,
    ) -> Result<FileSearchDocument, FileSearchError> {
        let url = format!("{}/{}", self.api_base_url, document_name(store, document));
        self.send_json("get_document", Method::GET, &url, |b| b).await
    }

    /// Delete a document. With `force`, its chunks are deleted too.
    pub async fn delete_document(
        &self,
        store: &str,
        document: &str,
        force: bool,
    ) -> Result<(), FileSearchError> {
        let url = format!(
            "{}/{}?force={}",
            self.api_base_url,
            document_name(store, document),
            force
        );
        self.send("delete_document", Method::DELETE, &url, |b| b)
            .await
            .map(|_| ())
    }

    // ==================== Uploads ====================

    /// Upload a file directly into a store.
    ///
    /// Returns the upload operation; poll it with
    /// [`poll_operation`](super::polling::poll_operation) to learn the outcome.
    pub async fn upload_to_store(
        &self,
        store: &str,
        data: &[u8],
        file_name: &str,
        options: &UploadOptions,
    ) -> Result<Operation, FileSearchError> {
        let mut metadata = options.clone();
        if metadata.display_name.as_deref().is_none_or(str::is_empty) {
            metadata.display_name = Some(file_name.to_string());
        }
        let metadata_json = serde_json::to_vec(&metadata).unwrap_or_else(|_| b"{}".to_vec());

        let boundary = format!("----FormBoundary{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &metadata_json, data);

        let url = format!(
            "{}/{}:uploadToFileSearchStore",
            self.upload_base_url,
            store_name(store)
        );
        debug!(store = %store_name(store), file = %file_name, bytes = data.len(), "Uploading to store");

        self.send_json("upload", Method::POST, &url, |b| {
            b.header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
        })
        .await
    }

    /// Fetch the current state of an operation
    pub async fn get_operation(&self, name: &str) -> Result<Operation, FileSearchError> {
        let url = format!("{}/{}", self.api_base_url, name.trim_start_matches('/'));
        self.send_json("get_operation", Method::GET, &url, |b| b)
            .await
    }

    // ==================== Generation ====================

    /// Answer `query` with the model, grounded on the given stores
    pub async fn generate_with_file_search(
        &self,
        model: &str,
        query: &str,
        store_names: &[String],
        top_k: Option<u32>,
    ) -> Result<GeneratedAnswer, FileSearchError> {
        let model = model.trim_start_matches("models/");
        let url = format!("{}/models/{}:generateContent", self.api_base_url, model);

        let mut file_search = serde_json::json!({
            "fileSearchStoreNames": store_names
                .iter()
                .map(|s| store_name(s))
                .collect::<Vec<_>>(),
        });
        if let Some(k) = top_k {
            file_search["topK"] = serde_json::json!(k);
        }
        let request = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "tools": [{ "fileSearch": file_search }],
        });

        let response: GenerateContentResponse = self
            .send_json("generate", Method::POST, &url, |b| b.json(&request))
            .await?;
        Ok(response.into())
    }

    // ==================== Transport ====================

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, FileSearchError> {
        let response = self.send(operation, method, url, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| FileSearchError::InvalidResponse { source })
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, FileSearchError> {
        let api_key = self.api_key.as_deref().ok_or(FileSearchError::MissingApiKey)?;

        let started = Instant::now();
        let request = build(self.client.request(method, url).header(API_KEY_HEADER, api_key));
        let result = request.send().await;
        metrics::histogram!(
            "file_search_upstream_request_duration_seconds",
            "operation" => operation
        )
        .record(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(source) => {
                metrics::counter!(
                    "file_search_upstream_requests_total",
                    "operation" => operation,
                    "outcome" => "connection_error"
                )
                .increment(1);
                return Err(FileSearchError::Connection {
                    url: redact(url),
                    source,
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::counter!(
                "file_search_upstream_requests_total",
                "operation" => operation,
                "outcome" => "api_error"
            )
            .increment(1);
            let message = error_message(response).await;
            warn!(operation, status = status.as_u16(), %message, "File search API error");
            return Err(FileSearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        metrics::counter!(
            "file_search_upstream_requests_total",
            "operation" => operation,
            "outcome" => "ok"
        )
        .increment(1);
        Ok(response)
    }
}

impl OperationSource for FileSearchClient {
    async fn get_operation(&self, name: &str) -> Result<Operation, FileSearchError> {
        FileSearchClient::get_operation(self, name).await
    }
}

/// The API's own error message, or a generic one naming the status
async fn error_message(response: Response) -> String {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    serde_json::from_slice::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API request failed: {}", status))
}

/// Strip the query string from a URL for error reporting
fn redact(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

/// Build a `multipart/related` body: a JSON metadata part, then the file bytes
pub(crate) fn multipart_related_body(boundary: &str, metadata_json: &[u8], file: &[u8]) -> Bytes {
    let head = format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n"
    );
    let middle = format!("\r\n--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n");
    let tail = format!("\r\n--{boundary}--");

    let mut body = BytesMut::with_capacity(
        head.len() + metadata_json.len() + middle.len() + file.len() + tail.len(),
    );
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(metadata_json);
    body.extend_from_slice(middle.as_bytes());
    body.extend_from_slice(file);
    body.extend_from_slice(tail.as_bytes());
    body.freeze()
}
