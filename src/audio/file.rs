use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hound::WavReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{CaptureDevice, CaptureError, CaptureSource};

/// Samples per block delivered by the WAV device.
const WAV_BLOCK_SAMPLES: usize = 1024;

/// Capture source backed by a WAV file, used by the CLI demo and tests.
///
/// Acquiring reads the whole file up front; starting streams it as mono
/// f32 sample blocks paced at the file's real-time rate.
pub struct WavCaptureSource {
    path: PathBuf,
}

impl WavCaptureSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for WavCaptureSource {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let reader = WavReader::open(&self.path)
            .map_err(|e| CaptureError::AccessDenied(format!("{}: {e}", self.path.display())))?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let raw: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::Device(format!("failed to read samples: {e}")))?;

        // Average interleaved channels down to mono f32.
        let samples: Vec<f32> = raw
            .chunks(channels)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
                sum / frame.len() as f32
            })
            .collect();

        info!(
            path = %self.path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            sample_count = samples.len(),
            "WAV capture source ready"
        );

        Ok(Box::new(WavCaptureDevice {
            samples: Some(samples),
            sample_rate: f64::from(spec.sample_rate),
            task: None,
        }))
    }
}

pub struct WavCaptureDevice {
    samples: Option<Vec<f32>>,
    sample_rate: f64,
    task: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl CaptureDevice for WavCaptureDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        let samples = self
            .samples
            .take()
            .context("WAV capture already started")?;
        let pace = std::time::Duration::from_secs_f64(WAV_BLOCK_SAMPLES as f64 / self.sample_rate);

        let (tx, rx) = mpsc::channel(32);
        self.task = Some(tokio::spawn(async move {
            for block in samples.chunks(WAV_BLOCK_SAMPLES) {
                if tx.send(block.to_vec()).await.is_err() {
                    break;
                }
                tokio::time::sleep(pace).await;
            }
        }));

        Ok(rx)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WavCaptureDevice {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
