use serde::{Deserialize, Serialize};

/// Close code for a normal channel shutdown.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Configuration frame sent once when the session starts streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFrame {
    pub api_key: String,
    pub sample_rate_hertz: u32,
    pub include_nonfinal: bool,
    pub speech_context: serde_json::Value,
}

/// One transcribed word as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
    #[serde(rename = "t")]
    pub text: String,
    #[serde(rename = "s")]
    pub start_ms: u64,
    #[serde(rename = "d")]
    pub duration_ms: u64,
}

/// Result frame received from the transcription service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFrame {
    /// Finalized words; the service will not revise these further.
    #[serde(rename = "fw", default)]
    pub final_words: Vec<RawWord>,

    /// Non-final words, replaced wholesale by each subsequent frame.
    #[serde(rename = "nfw", default)]
    pub nonfinal_words: Vec<RawWord>,

    /// Processing time covering finalized audio, in milliseconds.
    #[serde(rename = "fpt", default)]
    pub final_proc_time_ms: u64,

    /// Total processing time, in milliseconds.
    #[serde(rename = "tpt", default)]
    pub total_proc_time_ms: u64,
}

/// Parse a close reason of the form `"<token>[ <message>]"`.
///
/// The token must be non-empty and consist of `[a-zA-Z0-9_-]` only.
/// Returns `None` when the reason does not match the pattern.
pub fn parse_status_reason(reason: &str) -> Option<(&str, &str)> {
    let (token, message) = match reason.split_once(' ') {
        Some((token, message)) => (token, message),
        None => (reason, ""),
    };

    if token.is_empty()
        || !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }

    Some((token, message))
}
