//! Configuration module for the emotion stream.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for streaming,
//! the predictor collaborator and the waveform view, `AppPaths` for the
//! platform config directory, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, PredictorConfig, StreamConfig, WaveformConfig};
