//! Error types for the File Search API.

#[derive(Debug, thiserror::Error)]
pub enum FileSearchError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    #[error("Connection failed to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status from the API. `message` is the API's own error
    /// message when the body carried one.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from file search API")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("{message}")]
    OperationFailed { code: Option<i32>, message: String },

    #[error("Operation timed out. Please check status later.")]
    OperationTimedOut { name: String },
}
