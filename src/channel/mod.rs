//! Bidirectional message channel to the transcription service.
//!
//! The session depends only on the [`ChannelConnector`]/[`ChannelSink`]
//! traits; `client` provides the websocket implementation and `messages`
//! the wire formats.

pub mod client;
pub mod messages;

use anyhow::Result;
use tokio::sync::mpsc;

pub use client::WsConnector;
pub use messages::{
    parse_status_reason, ConfigFrame, RawWord, ResultFrame, NORMAL_CLOSE_CODE,
};

/// Events delivered by an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A text frame from the service.
    Message(String),
    /// The channel closed, with the transport's status code and reason.
    Closed { code: u16, reason: String },
    /// Transport-level failure.
    Error(String),
}

/// Frames the session sends over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Send half of an open channel. Closing is best-effort and idempotent.
#[async_trait::async_trait]
pub trait ChannelSink: Send {
    async fn send(&mut self, frame: OutboundFrame) -> Result<()>;
    async fn close(&mut self);
}

/// Opens a channel to a URL, yielding the send half plus the event stream.
#[async_trait::async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ChannelSink>, mpsc::Receiver<ChannelEvent>)>;
}
