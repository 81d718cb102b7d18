pub mod backend;
pub mod capture;
pub mod encoder;
pub mod file;

pub use backend::{CaptureDevice, CaptureError, CaptureSource};
pub use capture::{CaptureAdapter, CaptureEvent};
pub use encoder::{EncoderHandle, FrameEncoder, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_TIMESLICE_MS};
pub use file::WavCaptureSource;
