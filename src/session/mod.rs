//! Transcription session management
//!
//! This module provides the `Session` abstraction that manages:
//! - Capture access and the encoding pipeline
//! - The streaming transcription channel
//! - Lifecycle sequencing with exactly one terminal outcome
//! - Transcript accumulation and session statistics

mod config;
mod registry;
mod session;
mod state;
mod stats;
mod transcript;

pub use config::SessionConfig;
pub use registry::SessionRegistry;
pub use session::Session;
pub use state::{PublicState, SessionState};
pub use stats::SessionStats;
pub use transcript::{Transcript, Word};
