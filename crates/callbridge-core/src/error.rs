//! Error types for callbridge calls and configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::codes;

/// Result type alias for per-call operations.
pub type CallResult<T> = Result<T, CallError>;

/// Everything that can end a call, or prevent one from starting.
///
/// `Clone` because a single settlement is observed by every awaiter of a
/// call's headers, trailers, and response stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Reported by the transport bridge for a specific call.
    #[error("transport error: {message}")]
    Transport { message: String, code: Option<i32> },

    /// The application cancelled the call before it settled.
    #[error("call cancelled")]
    Cancelled,

    /// The transport bridge is missing or unconfigured. Raised when a call
    /// is constructed, never delivered through a call's futures.
    #[error("transport bridge is not linked: {0}")]
    Linkage(String),

    /// The message codec rejected an outgoing or incoming message.
    #[error("codec error: {0}")]
    Codec(String),
}

impl CallError {
    pub fn transport(message: impl Into<String>, code: Option<i32>) -> Self {
        Self::Transport {
            message: message.into(),
            code,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The transport-supplied code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Transport { code, .. } => *code,
            _ => None,
        }
    }

    /// Status code surfaced to façade listeners for this error.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Transport { code, .. } => code.unwrap_or(codes::UNKNOWN),
            Self::Cancelled => codes::CANCELLED,
            Self::Linkage(_) => codes::UNAVAILABLE,
            Self::Codec(_) => codes::INTERNAL,
        }
    }

    /// Human-readable detail without the category prefix.
    pub fn details(&self) -> String {
        match self {
            Self::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors raised while loading or writing a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_message_and_code() {
        let err = CallError::transport("unavailable", Some(14));
        assert_eq!(err.code(), Some(14));
        assert_eq!(err.details(), "unavailable");
        assert_eq!(err.to_string(), "transport error: unavailable");
    }

    #[test]
    fn status_code_falls_back_to_unknown() {
        assert_eq!(CallError::transport("boom", None).status_code(), codes::UNKNOWN);
        assert_eq!(CallError::Cancelled.status_code(), codes::CANCELLED);
        assert_eq!(CallError::Codec("bad".into()).status_code(), codes::INTERNAL);
    }

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(CallError::Cancelled.is_cancelled());
        assert!(!CallError::Linkage("no bridge".into()).is_cancelled());
        assert_eq!(CallError::Cancelled.code(), None);
    }

    #[test]
    fn error_is_std_error() {
        let err = CallError::Cancelled;
        let _: &dyn std::error::Error = &err;
    }
}
