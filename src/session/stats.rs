use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a transcription session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// When streaming began (entering the running state).
    pub started_at: Option<DateTime<Utc>>,

    /// Number of audio chunks sent over the channel.
    pub chunks_sent: usize,

    /// Total audio bytes sent over the channel.
    pub bytes_sent: u64,

    /// Number of result frames merged into the transcript.
    pub results_received: usize,
}
