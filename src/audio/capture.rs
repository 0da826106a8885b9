//! Microphone capture via `cpal`.
//!
//! [`CaptureDevice`] is the seam the stream controller acquires audio
//! through.  [`AudioCapture`] is the production implementation: each call to
//! [`CaptureDevice::start`] opens the configured input device, builds an
//! `f32` input stream and forwards channel 0 of every hardware buffer to the
//! supplied callback.  The returned [`ActiveCapture`] is a RAII guard;
//! dropping it stops the stream and releases the device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample::first_channel;
use crate::audio::SampleBatch;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or starting an input device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// CaptureDevice / ActiveCapture
// ---------------------------------------------------------------------------

/// Callback receiving one mono [`SampleBatch`] per hardware buffer.
///
/// Runs on the audio thread, so it must only hand the batch off.
pub type BatchCallback = Box<dyn FnMut(SampleBatch) + Send + 'static>;

/// An input that can be started on demand.
pub trait CaptureDevice {
    /// Acquire the device and begin delivering batches to `on_batch`.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the device is missing, refuses the
    /// stream configuration or cannot be started.
    fn start(&mut self, on_batch: BatchCallback) -> Result<Box<dyn ActiveCapture>, CaptureError>;
}

/// A running capture.  Dropping it releases the device.
pub trait ActiveCapture {
    /// Native sample rate of the delivered batches in Hz.
    fn sample_rate(&self) -> u32;
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value drops the `cpal::Stream`, which stops the hardware
/// stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl ActiveCapture for StreamHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone input built on top of `cpal`.
///
/// The device is looked up on every [`start`](CaptureDevice::start), so a
/// microphone plugged in after construction is picked up by the next session.
///
/// ```rust,no_run
/// use emotion_stream::audio::{AudioCapture, CaptureDevice};
///
/// let mut capture = AudioCapture::default_input();
/// let handle = capture
///     .start(Box::new(|batch| println!("{} samples", batch.len())))
///     .unwrap();
/// println!("capturing at {} Hz", handle.sample_rate());
/// // dropping `handle` stops the stream
/// ```
#[derive(Debug, Clone, Default)]
pub struct AudioCapture {
    /// Input device name; `None` selects the host default.
    device_name: Option<String>,
}

impl AudioCapture {
    /// Capture from the system default input device.
    pub fn default_input() -> Self {
        Self { device_name: None }
    }

    /// Capture from the input device whose name is `name`, or the default
    /// device when `name` is `None`.
    pub fn with_device(name: Option<String>) -> Self {
        Self { device_name: name }
    }

    fn open_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.clone())),
        }
    }
}

impl CaptureDevice for AudioCapture {
    /// Queries the device's preferred stream configuration so no manual
    /// setup is needed.  Send failures inside the callback are the
    /// callback's concern; the audio thread never panics.
    fn start(
        &mut self,
        mut on_batch: BatchCallback,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let device = self.open_device()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                on_batch(first_channel(data, channels).into_owned());
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        log::info!("capture: input stream started ({sample_rate} Hz, {channels} ch)");

        Ok(Box::new(StreamHandle {
            _stream: stream,
            sample_rate,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
