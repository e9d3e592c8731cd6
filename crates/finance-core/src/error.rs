//! Error Types

use thiserror::Error;

/// Result type alias for finance operations
pub type Result<T> = std::result::Result<T, FinanceError>;

/// Broad error classes, used at the HTTP boundary to pick a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A credential or setting is missing; nothing was attempted
    Configuration,
    /// An external service (aggregator, model, cache) failed
    Upstream,
    /// The local transaction file is missing or malformed
    Data,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Upstream => "UPSTREAM_ERROR",
            ErrorKind::Data => "DATA_ERROR",
        }
    }
}

/// Finance error types
#[derive(Error, Debug)]
pub enum FinanceError {
    /// Missing credential or invalid setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External service failure
    #[error("{service} error: {message}")]
    Upstream { service: String, message: String },

    /// Aggregator has not finished preparing the requested product
    #[error("Product not ready: {0}")]
    ProductNotReady(String),

    /// Local transaction data unusable
    #[error("Data error: {0}")]
    Data(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FinanceError {
    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        FinanceError::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FinanceError::Configuration(_) => ErrorKind::Configuration,
            FinanceError::Upstream { .. } | FinanceError::ProductNotReady(_) => ErrorKind::Upstream,
            FinanceError::Data(_) | FinanceError::Io(_) | FinanceError::Json(_) => ErrorKind::Data,
        }
    }

    /// Check if error means "ask again later"
    pub fn is_retryable(&self) -> bool {
        matches!(self, FinanceError::ProductNotReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(FinanceError::Configuration("key".into()).kind(), ErrorKind::Configuration);
        assert_eq!(FinanceError::ProductNotReady("tx".into()).kind(), ErrorKind::Upstream);
        assert_eq!(FinanceError::Data("missing".into()).kind(), ErrorKind::Data);
        assert!(FinanceError::ProductNotReady("tx".into()).is_retryable());
        assert!(!FinanceError::upstream("plaid", "boom").is_retryable());
    }
}
