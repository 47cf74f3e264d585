//! Error types shared by the connection-handling layers.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Failure that ends a single client connection.
///
/// None of these escape the task that owns the connection; they are logged
/// and the connection is torn down.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer closed the channel (close frame or end of stream).
    #[error("channel closed by peer")]
    Closed,

    /// No message arrived within the configured idle timeout.
    #[error("no message received within {0:?}")]
    IdleTimeout(Duration),

    /// The WebSocket layer failed to send or receive.
    #[error("websocket transport error: {0}")]
    Transport(#[source] WsError),
}

impl From<WsError> for SessionError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => SessionError::Closed,
            other => SessionError::Transport(other),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_transport_maps_to_closed() {
        assert!(matches!(
            SessionError::from(WsError::ConnectionClosed),
            SessionError::Closed
        ));
        assert!(matches!(
            SessionError::from(WsError::AlreadyClosed),
            SessionError::Closed
        ));
    }

    #[test]
    fn test_other_transport_errors_are_kept() {
        let err = SessionError::from(WsError::Io(std::io::Error::other("reset")));
        assert!(matches!(err, SessionError::Transport(WsError::Io(_))));
        assert!(err.to_string().starts_with("websocket transport error"));
    }
}
