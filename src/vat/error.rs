//! Error types for the VAT data source.

use thiserror::Error;

/// Result type for VAT API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while talking to the VAT data source.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be configured.
    #[error("Failed to configure VAT API client: {message}")]
    Client {
        /// Description of what's wrong.
        message: String,
    },

    /// The request could not be sent or no response arrived.
    #[error("Failed to {operation}: {source}")]
    Request {
        /// What was being attempted.
        operation: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("Failed to {operation}: HTTP {status}")]
    Status {
        /// What was being attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not what the API documents.
    #[error("Failed to {operation}: invalid response body: {message}")]
    Decode {
        /// What was being attempted.
        operation: String,
        /// Decoder message.
        message: String,
    },

    /// The addressed record does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },

    /// The operation is not allowed in the record's current state.
    #[error("{message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The data source is not reachable.
    #[error("VAT API unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let error = ApiError::Status {
            operation: "retrieve VAT drafts".to_string(),
            status: 503,
        };
        assert_eq!(error.to_string(), "Failed to retrieve VAT drafts: HTTP 503");
    }

    #[test]
    fn not_found_display() {
        let error = ApiError::NotFound {
            what: "VAT draft 1/2024-01".to_string(),
        };
        assert_eq!(error.to_string(), "VAT draft 1/2024-01 not found");
    }
}
