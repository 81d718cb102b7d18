use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Default interval between chunk dumps while capturing.
pub const DEFAULT_TIMESLICE_MS: u64 = 120;

/// Default upper bound for a single outgoing audio chunk.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 32 * 1024;

/// Converts floating-point sample blocks into 16-bit little-endian PCM
/// buffers and packs them into size-bounded chunks on demand.
///
/// Each `encode` call appends one buffer to the internal buffer set;
/// `dump` drains the set into chunks. A buffer is never split across
/// chunks, so a single buffer larger than the chunk limit becomes a
/// chunk of its own.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    buffers: Vec<Vec<u8>>,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one sample block and append it to the buffer set.
    ///
    /// Samples are clamped to [-1.0, 1.0] and quantized with
    /// `floor(sample * 32768)` into the signed 16-bit range.
    pub fn encode(&mut self, samples: &[f32]) {
        let mut buf = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let quantized = (f64::from(clamped) * 32768.0).floor() as i64;
            let value = quantized.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
            buf.extend_from_slice(&value.to_le_bytes());
        }
        self.buffers.push(buf);
    }

    /// Drain the buffer set into chunks of at most `max_chunk_bytes`.
    ///
    /// Greedy packing: a chunk grows while it is empty or the next buffer
    /// still fits. Every chunk contains at least one buffer.
    pub fn dump(&mut self, max_chunk_bytes: usize) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut current: Vec<u8> = Vec::new();

        for buf in self.buffers.drain(..) {
            if !current.is_empty() && current.len() + buf.len() > max_chunk_bytes {
                chunks.push(std::mem::take(&mut current));
            }
            current.extend_from_slice(&buf);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Discard all accumulated buffers without producing output.
    pub fn reset(&mut self) {
        self.buffers.clear();
    }
}

enum EncoderCommand {
    Encode(Vec<f32>),
    Dump {
        max_chunk_bytes: usize,
        reply: oneshot::Sender<Vec<Vec<u8>>>,
    },
    Reset,
}

/// Handle to a [`FrameEncoder`] running on its own task.
///
/// Commands are delivered over an ordered channel and processed strictly
/// in arrival order; the task owns the buffer set exclusively. The task
/// exits once every handle has been dropped.
#[derive(Clone)]
pub struct EncoderHandle {
    tx: mpsc::Sender<EncoderCommand>,
}

impl EncoderHandle {
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<EncoderCommand>(256);

        tokio::spawn(async move {
            let mut encoder = FrameEncoder::new();
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    EncoderCommand::Encode(samples) => encoder.encode(&samples),
                    EncoderCommand::Dump {
                        max_chunk_bytes,
                        reply,
                    } => {
                        let chunks = encoder.dump(max_chunk_bytes);
                        debug!(chunk_count = chunks.len(), "Encoder dump");
                        let _ = reply.send(chunks);
                    }
                    EncoderCommand::Reset => encoder.reset(),
                }
            }
        });

        Self { tx }
    }

    pub async fn encode(&self, samples: Vec<f32>) {
        let _ = self.tx.send(EncoderCommand::Encode(samples)).await;
    }

    pub async fn dump(&self, max_chunk_bytes: usize) -> Vec<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(EncoderCommand::Dump {
                max_chunk_bytes,
                reply,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn reset(&self) {
        let _ = self.tx.send(EncoderCommand::Reset).await;
    }
}
