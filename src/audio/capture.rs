// Microphone capture backend using cpal

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SizedSample};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use crate::error::DeviceError;

/// Microphone capture backend
///
/// The cpal stream is not `Send`, so it lives on a dedicated capture thread
/// for the lifetime of the session. The thread owns the input device
/// exclusively and releases it when it exits, whether on `close`, on drop,
/// or when the device errors out.
pub struct CpalCapture {
    config: CaptureConfig,
    capture_thread: Option<JoinHandle<()>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    capturing: bool,
}

impl CpalCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            capture_thread: None,
            stop_tx: None,
            capturing: false,
        }
    }

    fn shutdown_thread(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked during shutdown");
            }
        }
        self.capturing = false;
    }
}

#[async_trait::async_trait]
impl CaptureBackend for CpalCapture {
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.capturing {
            return Err(DeviceError::invalid_config("already capturing"));
        }

        info!(
            "Opening microphone ({} Hz, {} channel(s))",
            self.config.sample_rate, self.config.channels
        );

        let (frame_tx, frame_rx) = mpsc::channel(self.config.channel_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();

        let config = self.config.clone();
        let handle = std::thread::Builder::new()
            .name("callshield-capture".into())
            .spawn(move || run_capture_thread(config, frame_tx, ready_tx, stop_rx))
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        self.capture_thread = Some(handle);
        self.stop_tx = Some(stop_tx);

        // The thread reports whether the device actually opened.
        match ready_rx.await {
            Ok(Ok(())) => {
                self.capturing = true;
                info!("Microphone capture started");
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.shutdown_thread();
                Err(e)
            }
            Err(_) => {
                self.shutdown_thread();
                Err(DeviceError::Stream("capture thread exited early".into()))
            }
        }
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.capture_thread.is_none() {
            return Ok(());
        }
        info!("Releasing microphone");
        self.shutdown_thread();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.shutdown_thread();
    }
}

/// Body of the capture thread: open the device, pump frames until the stop
/// signal arrives, then drop the stream (which releases the device).
fn run_capture_thread(
    config: CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<(), DeviceError>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let stream = match build_input_stream(&config, frame_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    // Park until close/drop. Either an explicit stop or the sender going
    // away ends the thread; the stream drops with it.
    let _ = stop_rx.recv();
    drop(stream);
}

fn build_input_stream(
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| DeviceError::unavailable("no default input device"))?;

    info!("Input device: {:?}", device.name().ok());

    let default_config = device
        .default_input_config()
        .map_err(|e| map_device_error(e.to_string()))?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Dispatch on whatever format the device reports; everything is
    // converted to i16 before it leaves this module.
    match default_config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_typed_stream::<f32>(&device, &stream_config, config, frame_tx)
        }
        cpal::SampleFormat::I16 => {
            build_typed_stream::<i16>(&device, &stream_config, config, frame_tx)
        }
        cpal::SampleFormat::U16 => {
            build_typed_stream::<u16>(&device, &stream_config, config, frame_tx)
        }
        cpal::SampleFormat::I32 => {
            build_typed_stream::<i32>(&device, &stream_config, config, frame_tx)
        }
        other => Err(DeviceError::invalid_config(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + Sample + Send + 'static,
    <T as Sample>::Float: Into<f32>,
{
    let sample_rate = config.sample_rate;
    let started = Instant::now();

    let data_callback = move |data: &[T], _info: &cpal::InputCallbackInfo| {
        let mut samples = Vec::with_capacity(data.len());
        for sample in data {
            let f: f32 = sample.to_float_sample().into();
            samples.push((f.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        }

        let frame = AudioFrame {
            samples,
            sample_rate,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };

        match frame_tx.try_send(frame) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Capture channel full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Consumer is gone; the session is tearing down.
            }
        }
    };

    let error_callback = move |err| {
        warn!("Capture stream error: {}", err);
    };

    device
        .build_input_stream(stream_config, data_callback, error_callback, None)
        .map_err(|e| map_device_error(e.to_string()))
}

fn map_device_error(msg: String) -> DeviceError {
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        DeviceError::PermissionDenied
    } else if lower.contains("not supported") || lower.contains("invalid") {
        DeviceError::InvalidConfig(msg)
    } else {
        DeviceError::Unavailable(msg)
    }
}
