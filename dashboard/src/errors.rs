//! Error types shared across the dashboard services.
//!
//! `FetchError` covers every failed HTTP exchange with the remote API.
//! `ServiceError` is what the checkout, assistant and loan services return;
//! it wraps `FetchError` when the failure came from the network.

use thiserror::Error;

/// Failure of a single request to the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status code.
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            FetchError::Status(status.as_u16())
        } else if error.is_decode() {
            FetchError::Decode(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} '{identifier}' not found")]
    NotFound { entity: String, identifier: String },

    #[error("External service error: {message}")]
    ExternalService { message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let reason = errors
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string());
                format!("{}: {}", field, reason)
            })
            .collect::<Vec<_>>()
            .join(", ");
        ServiceError::Validation { message }
    }
}

/// Returned when subscribing to a push channel that has already shut down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("Push channel is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("Sync scheduler is not running")]
    NotRunning,

    #[error(transparent)]
    Push(#[from] PushError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_wraps_into_service_error() {
        let err: ServiceError = FetchError::Status(502).into();
        assert_eq!(err.to_string(), "Unexpected HTTP status: 502");
        assert!(matches!(err, ServiceError::Fetch(FetchError::Status(502))));
    }

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("Loan", "loan_42");
        assert_eq!(err.to_string(), "Loan 'loan_42' not found");
    }
}
