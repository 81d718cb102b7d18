use std::fmt;

/// Status codes surfaced to the error callback when a session fails.
///
/// The `Display` form is the wire-facing status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrErrorKind {
    /// Capture access was denied or the capture device failed.
    GetUserMediaFailed,
    /// The channel closed abnormally (non-normal close code).
    WebsocketClosed,
    /// Transport-level channel error.
    WebsocketError,
    /// Malformed or unexpected close reason, or a premature end-of-stream.
    OtherAsrError,
}

impl fmt::Display for AsrErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AsrErrorKind::GetUserMediaFailed => "get_user_media_failed",
            AsrErrorKind::WebsocketClosed => "websocket_closed",
            AsrErrorKind::WebsocketError => "websocket_error",
            AsrErrorKind::OtherAsrError => "other_asr_error",
        };
        f.write_str(s)
    }
}

/// Terminal session failure reported through the error callback.
///
/// All of these are terminal: the session releases its resources and no
/// retry happens inside the engine. Recovery means constructing a new
/// session.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AsrError {
    pub kind: AsrErrorKind,
    pub message: String,
}

impl AsrError {
    pub fn new(kind: AsrErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Synchronous misuse errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("another session is already active in this process")]
    AnotherSessionActive,

    #[error("session is not active")]
    NotActive,

    #[error("configuration cannot change after start()")]
    SetterAfterStart,

    #[error("channel url is not configured")]
    MissingChannelUrl,
}
