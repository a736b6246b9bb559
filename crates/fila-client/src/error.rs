use std::time::Duration;

use fila_types::api::SelectionError;
use fila_types::identity::CredentialError;

/// Every failure a queue operation can surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Missing or malformed input. Raised before any request is sent, or
    /// echoed back by the server.
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not signed in or session expired")]
    Unauthorized,

    /// Lost a race for the queue counter on the server.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure, timeout or server error.
    #[error("service unavailable: {0}")]
    Transient(String),
}

impl QueueError {
    /// Whether the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Transient(_))
    }

    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => Self::Validation(message),
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::Transient(format!("HTTP {}: {}", status, message)),
        }
    }

    pub(crate) fn timed_out(after: Duration) -> Self {
        Self::Transient(format!("no response after {:?}", after))
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transient("request timed out".into());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        Self::Transient(err.to_string())
    }
}

impl From<SelectionError> for QueueError {
    fn from(err: SelectionError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CredentialError> for QueueError {
    fn from(err: CredentialError) -> Self {
        Self::Validation(err.to_string())
    }
}
