//! In-memory tracking of upload operations.
//!
//! Each upload started without `wait` is registered here and polled in the
//! background until it reaches a terminal state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::file_search::{FileSearchError, Operation};

/// Finished entries older than this are dropped when a new upload registers
const FINISHED_RETENTION: chrono::TimeDelta = chrono::TimeDelta::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Active,
    Failed,
    TimedOut,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedUpload {
    pub operation_name: String,
    pub store_name: String,
    pub display_name: String,
    #[serde(skip)]
    pub user_id: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TrackedUpload {
    pub fn pending(
        operation_name: impl Into<String>,
        store_name: impl Into<String>,
        display_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            store_name: store_name.into(),
            display_name: display_name.into(),
            user_id: user_id.into(),
            status: UploadStatus::Pending,
            document_name: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Default)]
pub struct UploadTracker {
    uploads: DashMap<String, TrackedUpload>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, upload: TrackedUpload) {
        let cutoff = Utc::now() - FINISHED_RETENTION;
        self.uploads
            .retain(|_, u| u.finished_at.is_none_or(|finished| finished > cutoff));
        self.uploads.insert(upload.operation_name.clone(), upload);
    }

    /// Record the outcome of polling an operation
    pub fn finish(&self, operation_name: &str, result: &Result<Operation, FileSearchError>) {
        let Some(mut upload) = self.uploads.get_mut(operation_name) else {
            return;
        };

        match result {
            Ok(operation) => {
                upload.status = UploadStatus::Active;
                upload.document_name = operation.document_name().map(str::to_string);
            }
            Err(FileSearchError::OperationTimedOut { .. }) => {
                upload.status = UploadStatus::TimedOut;
                upload.error = Some(result_message(result));
            }
            Err(_) => {
                upload.status = UploadStatus::Failed;
                upload.error = Some(result_message(result));
            }
        }
        upload.finished_at = Some(Utc::now());
    }

    /// Mark every pending upload as cancelled (polling stopped at shutdown)
    pub fn cancel_pending(&self) {
        let now = Utc::now();
        for mut upload in self.uploads.iter_mut() {
            if !upload.status.is_terminal() {
                upload.status = UploadStatus::Cancelled;
                upload.finished_at = Some(now);
            }
        }
    }

    /// A user's uploads, newest first
    pub fn for_user(&self, user_id: &str) -> Vec<TrackedUpload> {
        let mut uploads: Vec<TrackedUpload> = self
            .uploads
            .iter()
            .filter(|u| u.user_id == user_id)
            .map(|u| u.clone())
            .collect();
        uploads.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        uploads
    }
}

fn result_message(result: &Result<Operation, FileSearchError>) -> String {
    match result {
        Ok(_) => String::new(),
        Err(e) => e.to_string(),
    }
}
