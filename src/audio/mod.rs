//! Audio pipeline — capture/decode → resample → chunking + rolling waveform.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → SampleBatch (channel 0) ─┐
//! Uploaded file → WavDecoder → DecodedAudio ────────────┤
//!                                                       ▼
//!                                        Resampler (native → 16 kHz)
//!                                          │                     │
//!                                          ▼                     ▼
//!                                  ChunkAccumulator     RollingWaveformBuffer
//!                                          │                     │
//!                                    Chunk → Predictor     snapshot → Renderer
//! ```

pub mod accumulator;
pub mod capture;
pub mod decode;
pub mod resample;
pub mod waveform;

pub use accumulator::{sanitize, sanitize_sample, ChunkAccumulator};
pub use capture::{
    ActiveCapture, AudioCapture, BatchCallback, CaptureDevice, CaptureError, StreamHandle,
};
pub use decode::{DecodeError, DecodedAudio, Decoder, WavDecoder};
pub use resample::{first_channel, resample, ResampleQuality, Resampler};
pub use waveform::{compress, Renderer, RollingWaveformBuffer};

// ---------------------------------------------------------------------------
// Sample types
// ---------------------------------------------------------------------------

/// One amplitude value, nominally in `[-1.0, 1.0]`.  NaN is invalid and is
/// replaced with `0.0` before any downstream use.
pub type Sample = f32;

/// The samples delivered by one capture callback, in order.
pub type SampleBatch = Vec<Sample>;

/// A unit of audio submitted to the predictor.
///
/// Chunks emitted by [`ChunkAccumulator`] always hold exactly the configured
/// chunk length.  One-shot submissions (upload, bounded recording) carry the
/// whole clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Mono samples, NaN-free.
    pub samples: Vec<Sample>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Chunk {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
