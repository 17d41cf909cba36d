//! Caller identity.
//!
//! Authentication happens upstream of this service; the authenticated user
//! arrives in the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::{I18nError, ServiceError};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The calling user's id
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl FromRequestParts<Arc<AppState>> for UserId {
    type Rejection = I18nError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| {
                state.i18n_error(ServiceError::Unauthorized {
                    message: format!("missing {} header", USER_ID_HEADER),
                })
            })
    }
}
