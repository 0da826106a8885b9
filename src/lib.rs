//! Real-time audio streaming core for a speech emotion classifier.
//!
//! Audio arrives from a microphone or an uploaded WAV file, is converted to
//! 16 kHz mono, and is handed to a [`Predictor`](predict::Predictor) either
//! as one clip (upload, bounded recording) or as fixed one-second chunks
//! (continuous analysis).  A rolling waveform buffer feeds a renderer while
//! capture is running.
//!
//! * [`audio`]   — capture, decode, resampling, chunking, waveform buffer.
//! * [`stream`]  — the controller state machine and its event loop.
//! * [`predict`] — the classifier seam and its result types.
//! * [`config`]  — TOML settings.
//! * [`error`]   — the crate error type.

pub mod audio;
pub mod config;
pub mod error;
pub mod predict;
pub mod stream;

pub use audio::{Chunk, ChunkAccumulator, Resampler, RollingWaveformBuffer, Sample};
pub use config::AppConfig;
pub use error::StreamError;
pub use predict::{Emotion, PredictError, Prediction, Predictor};
pub use stream::{ControllerHandle, ControllerState, SharedStatus, StreamController, StreamMode};
