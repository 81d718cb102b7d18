pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod session;

pub use audio::{
    CaptureAdapter, CaptureDevice, CaptureError, CaptureEvent, CaptureSource, EncoderHandle,
    FrameEncoder, WavCaptureSource,
};
pub use channel::{ChannelConnector, ChannelEvent, ChannelSink, OutboundFrame, WsConnector};
pub use config::Config;
pub use error::{AsrError, AsrErrorKind, SessionError};
pub use session::{
    PublicState, Session, SessionConfig, SessionRegistry, SessionStats, Transcript, Word,
};
