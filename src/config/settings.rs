//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing keys fall back to their defaults.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::ResampleQuality;

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Capture, resampling and chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Rate every submission is converted to (the classifier expects 16 000).
    pub target_sample_rate: u32,
    /// Length of one continuous-mode chunk in seconds.
    pub chunk_secs: f32,
    /// Hard ceiling for a bounded recording; it stops itself after this.
    pub max_recording_secs: u64,
    /// Seconds of audio kept in the rolling waveform buffer.
    pub waveform_secs: u32,
    /// Nearest-neighbour (default) or linear interpolation.
    pub resample_quality: ResampleQuality,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            chunk_secs: 1.0,
            max_recording_secs: 20,
            waveform_secs: 10,
            resample_quality: ResampleQuality::Nearest,
            input_device: None,
        }
    }
}

impl StreamConfig {
    /// Samples per continuous chunk: `floor(target_sample_rate * chunk_secs)`,
    /// at least 1.
    pub fn chunk_len(&self) -> usize {
        let len = (self.target_sample_rate as f64 * self.chunk_secs as f64).floor();
        (len.max(0.0) as usize).max(1)
    }

    /// Rolling waveform capacity in samples at the target rate, at least 1.
    pub fn waveform_capacity(&self) -> usize {
        (self.target_sample_rate as usize * self.waveform_secs as usize).max(1)
    }

    pub fn max_recording(&self) -> Duration {
        Duration::from_secs(self.max_recording_secs)
    }
}

// ---------------------------------------------------------------------------
// PredictorConfig
// ---------------------------------------------------------------------------

/// Settings for the classifier service.
///
/// The stream core never opens connections itself; `base_url` is read by the
/// [`Predictor`](crate::predict::Predictor) implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Base URL of the classifier service.
    pub base_url: String,
    /// Model requested by `StreamController::load_configured_model`.
    pub model_name: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            model_name: "XGBoost".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// WaveformConfig
// ---------------------------------------------------------------------------

/// Live waveform rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Points per snapshot handed to the renderer.
    pub width: usize,
    /// Milliseconds between redraws.
    pub frame_interval_ms: u64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 512,
            frame_interval_ms: 16,
        }
    }
}

impl WaveformConfig {
    /// Redraw interval, at least 1 ms.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use emotion_stream::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.stream.chunk_len() > 0);
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub predictor: PredictorConfig,
    pub waveform: WaveformConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
