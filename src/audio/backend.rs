use anyhow::Result;
use tokio::sync::mpsc;

/// Failure while acquiring capture access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("capture access denied: {0}")]
    AccessDenied(String),

    #[error("capture device failed: {0}")]
    Device(String),
}

/// Asynchronous source of capture devices.
///
/// Acquiring may be denied (no permission, no input device). A granted
/// device the caller no longer wants must simply be dropped; dropping
/// releases it.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// A capturable audio device delivering f32 sample blocks.
///
/// Implementations:
/// - WAV file playback for the CLI demo and tests (`WavCaptureSource`)
/// - platform microphone backends supplied by embedding applications
#[async_trait::async_trait]
pub trait CaptureDevice: Send {
    /// Begin capture.
    ///
    /// Returns a channel receiver that will receive sample blocks, each
    /// sample in [-1.0, 1.0], at a device-determined block size and rate.
    /// The channel closes when capture ends, whether through `stop()` or
    /// because the device ran out on its own.
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>>;

    /// The device's actual sample rate; valid only after `start()`.
    fn sample_rate(&self) -> f64;

    /// End capture and close the sample stream. Idempotent; dropping the
    /// device has the same effect.
    async fn stop(&mut self);
}
