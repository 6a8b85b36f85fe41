//! Typed failures for SharePoint list operations

use thiserror::Error;

/// Result alias used at every backend call boundary
pub type ListResult<T> = Result<T, ListError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListError {
    /// Credentials were rejected or every authentication scheme was exhausted
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Transport-level failure talking to the site
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An operation was attempted before a session was established
    #[error("no authenticated session")]
    NotAuthenticated,

    #[error("item {id} not found")]
    NotFound { id: i64 },

    /// Client-supplied data failed catalog checks
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{failed} of {total} bulk operations failed")]
    PartialBatchFailure { failed: usize, total: usize },

    /// The backend answered but refused the request
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered with something we could not interpret
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl ListError {
    /// Classify a failed HTTP status for an operation targeting `id`
    pub fn from_status(status: u16, id: Option<i64>, message: impl Into<String>) -> Self {
        match (status, id) {
            (401 | 403, _) => ListError::Authentication(message.into()),
            (404, Some(id)) => ListError::NotFound { id },
            _ => ListError::Rejected {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<reqwest::Error> for ListError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ListError::from_status(status.as_u16(), None, error.to_string()),
            None => ListError::BackendUnavailable(error.to_string()),
        }
    }
}

impl From<roxmltree::Error> for ListError {
    fn from(error: roxmltree::Error) -> Self {
        ListError::Protocol(format!("malformed XML: {}", error))
    }
}

impl From<serde_json::Error> for ListError {
    fn from(error: serde_json::Error) -> Self {
        ListError::Protocol(format!("malformed JSON: {}", error))
    }
}
