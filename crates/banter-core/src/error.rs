//! Error types shared by every chat backend.

use thiserror::Error;

/// Boxed error returned by event callbacks and plugin hooks.
///
/// Handlers may fail with any error type; the dispatcher only needs to log
/// it or hand it to an exception sink.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by a [`ChatApi`](crate::api::ChatApi) implementation.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No user or chat with that id exists.
    #[error("{what} '{id}' not found")]
    NotFound {
        /// Kind of entity that was looked up ("user", "chat", ...).
        what: &'static str,
        /// The id that failed to resolve.
        id: String,
    },

    /// The backend cannot perform the requested operation.
    #[error("operation '{0}' is not supported by this backend")]
    Unsupported(&'static str),

    /// The backend refused the request because of rate limiting.
    #[error("rate limited by the backend")]
    RateLimited,

    /// Network or authentication failure at the backend.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// `edit` was called on a message that cannot be edited.
    #[error("message is not editable")]
    NotEditable,

    /// The backend has been dropped or closed.
    #[error("chat api is closed")]
    Closed,

    /// `run` was called a second time on the same instance.
    #[error("chat api is already running")]
    AlreadyRunning,

    /// Backend options could not be deserialized.
    #[error("invalid backend options: {0}")]
    InvalidOptions(String),
}

impl ApiError {
    /// Creates a [`NotFound`](Self::NotFound) error for a user id.
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "user",
            id: id.into(),
        }
    }

    /// Creates a [`NotFound`](Self::NotFound) error for a chat id.
    pub fn chat_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "chat",
            id: id.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for backend operations.
pub type ApiResult<T> = Result<T, ApiError>;
