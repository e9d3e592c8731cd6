//! HTTP Error Mapping
//!
//! The single place where `FinanceError` kinds become status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use finance_core::FinanceError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// Body did not match the endpoint's schema
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A pipeline step failed; `message` is what the caller sees
    #[error("{message}: {source}")]
    Failed {
        message: &'static str,
        #[source]
        source: FinanceError,
        expose_details: bool,
    },
}

impl ApiError {
    /// Wrap a failure behind a fixed user-facing message
    pub fn failed(message: &'static str) -> impl FnOnce(FinanceError) -> Self {
        move |source| ApiError::Failed {
            message,
            source,
            expose_details: false,
        }
    }

    /// Like [`ApiError::failed`], but echo the underlying error as `details`
    pub fn failed_with_details(message: &'static str) -> impl FnOnce(FinanceError) -> Self {
        move |source| ApiError::Failed {
            message,
            source,
            expose_details: true,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(reason) => {
                tracing::warn!("Rejected request: {}", reason);
                let body = ErrorResponse {
                    error: reason,
                    code: "INVALID_REQUEST".into(),
                    details: None,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Failed {
                message,
                source,
                expose_details,
            } => {
                tracing::error!(kind = ?source.kind(), "{}: {}", message, source);
                let body = ErrorResponse {
                    error: message.into(),
                    code: source.kind().code().into(),
                    details: expose_details.then(|| source.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
