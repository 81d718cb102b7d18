use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::encoder::{DEFAULT_MAX_CHUNK_BYTES, DEFAULT_TIMESLICE_MS};

/// Configuration for a transcription session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier, used for logging.
    pub session_id: String,

    /// URL of the streaming transcription channel.
    pub channel_url: String,

    /// API key sent in the configuration frame.
    pub api_key: String,

    /// Whether the service should stream non-final words.
    pub include_nonfinal: bool,

    /// Free-form speech context forwarded to the service.
    pub speech_context: serde_json::Value,

    /// Interval between encoder dumps while streaming.
    pub timeslice: Duration,

    /// Upper bound for one outgoing audio chunk.
    pub max_chunk_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            channel_url: String::new(),
            api_key: String::new(),
            include_nonfinal: true,
            speech_context: serde_json::json!({}),
            timeslice: Duration::from_millis(DEFAULT_TIMESLICE_MS),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}
