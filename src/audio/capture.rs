use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::CaptureDevice;
use super::encoder::EncoderHandle;

/// Notifications emitted by a running [`CaptureAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// One encoded PCM chunk, ready for transmission.
    Data(Vec<u8>),
    /// Capture has ended and every pending `Data` event has been delivered.
    Stopped,
}

enum CaptureCommand {
    Stop,
}

/// Lifecycle wrapper around a capture device and the frame encoder.
///
/// A pump task forwards device sample blocks into the encoder and dumps
/// encoded chunks on each timeslice tick, emitting them as
/// [`CaptureEvent::Data`]. When the device's sample stream ends on its
/// own, or after `stop()`, the pump performs a final dump and emits
/// [`CaptureEvent::Stopped`] last.
pub struct CaptureAdapter {
    ctrl: mpsc::Sender<CaptureCommand>,
    task: Option<JoinHandle<()>>,
    sample_rate: f64,
}

impl CaptureAdapter {
    /// Start capturing from `device`.
    ///
    /// Returns the adapter plus the event receiver. The device is owned
    /// by the pump task from here on.
    pub async fn start(
        mut device: Box<dyn CaptureDevice>,
        timeslice: Duration,
        max_chunk_bytes: usize,
    ) -> Result<(Self, mpsc::Receiver<CaptureEvent>)> {
        let samples = device.start().await?;
        let sample_rate = device.sample_rate();

        let encoder = EncoderHandle::spawn();
        let (ctrl_tx, ctrl_rx) = mpsc::channel(4);
        let (event_tx, event_rx) = mpsc::channel(64);

        info!(sample_rate, ?timeslice, max_chunk_bytes, "Capture started");

        let task = tokio::spawn(pump(
            device,
            samples,
            encoder,
            timeslice,
            max_chunk_bytes,
            ctrl_rx,
            event_tx,
        ));

        Ok((
            Self {
                ctrl: ctrl_tx,
                task: Some(task),
                sample_rate,
            },
            event_rx,
        ))
    }

    /// The capture device's actual sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// End capture gracefully: final dump, then a terminating
    /// [`CaptureEvent::Stopped`]. Idempotent.
    pub async fn stop(&self) {
        let _ = self.ctrl.send(CaptureCommand::Stop).await;
    }

    /// Abort capture immediately, discarding any un-dumped audio.
    /// No further events are emitted. Idempotent.
    pub fn terminate(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Capture terminated");
        }
    }
}

impl Drop for CaptureAdapter {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn pump(
    mut device: Box<dyn CaptureDevice>,
    mut samples: mpsc::Receiver<Vec<f32>>,
    encoder: EncoderHandle,
    timeslice: Duration,
    max_chunk_bytes: usize,
    mut ctrl: mpsc::Receiver<CaptureCommand>,
    event_tx: mpsc::Sender<CaptureEvent>,
) {
    let mut interval = tokio::time::interval(timeslice);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it.
    interval.tick().await;

    loop {
        tokio::select! {
            block = samples.recv() => match block {
                Some(block) => encoder.encode(block).await,
                // Device ended on its own.
                None => break,
            },
            _ = interval.tick() => {
                for chunk in encoder.dump(max_chunk_bytes).await {
                    if event_tx.send(CaptureEvent::Data(chunk)).await.is_err() {
                        return;
                    }
                }
            },
            cmd = ctrl.recv() => match cmd {
                Some(CaptureCommand::Stop) | None => break,
            },
        }
    }

    device.stop().await;

    // Drain blocks already in flight so the final dump covers them.
    while let Some(block) = samples.recv().await {
        encoder.encode(block).await;
    }

    for chunk in encoder.dump(max_chunk_bytes).await {
        if event_tx.send(CaptureEvent::Data(chunk)).await.is_err() {
            return;
        }
    }

    let _ = event_tx.send(CaptureEvent::Stopped).await;
    info!("Capture stopped");
}
