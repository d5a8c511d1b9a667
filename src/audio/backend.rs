use crate::error::DeviceError;
use tokio::sync::mpsc;

/// One buffer of captured audio (16-bit PCM, mono)
///
/// Frames are produced by a capture backend and handed through a channel to
/// exactly one consumer; ownership moves with the frame. A frame may carry
/// fewer samples than the device buffer size, and an empty frame signals
/// transient starvation; the consumer should back off briefly, not error.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Serialize samples as little-endian bytes for the wire.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Number of bytes actually filled.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * 2
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (the analysis service expects 16 kHz)
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Capacity of the frame channel, in frames. When the consumer stalls,
    /// newer frames are dropped with a warning rather than blocking the
    /// device callback.
    pub channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1, // Mono
            channel_capacity: 32,
        }
    }
}

/// Audio capture backend trait
///
/// The production implementation wraps the platform microphone via cpal;
/// tests substitute a scripted backend. A backend exclusively holds the
/// input device between `open` and `close` and must release it on every
/// exit path, including drop.
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Acquire the device and start capturing.
    ///
    /// Returns a channel receiver that will receive audio frames.
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Stop capturing and release the device. Idempotent.
    async fn close(&mut self) -> Result<(), DeviceError>;

    /// Check if the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
