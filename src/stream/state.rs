//! Controller state machine and the shared status snapshot.
//!
//! [`ControllerState`] is derived from the controller's active session.  The
//! UI (an external collaborator) reads [`SharedStatus`] to bind its status
//! line, probability chart and waveform.
//!
//! [`SharedStatus`] is a type alias for `Arc<Mutex<StatusSnapshot>>`, cheap to
//! clone and safe to share across threads.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::predict::{Prediction, EMOTION_COUNT};

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

/// States of the stream controller.
///
/// ```text
/// Idle ──start_recording──▶ Recording ──stop / 20 s ceiling──▶ Idle
/// Idle ──start_continuous─▶ Continuous ──stop_continuous────▶ Idle
/// Idle ──upload───────────▶ Idle          (one-shot, no session kept)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// No capture session.
    #[default]
    Idle,

    /// Bounded recording: samples are collected for one submission on stop.
    Recording,

    /// Continuous streaming: fixed-size chunks are submitted as they fill.
    Continuous,
}

impl ControllerState {
    /// Returns `true` while a capture session owns the input device.
    ///
    /// ```
    /// use emotion_stream::stream::ControllerState;
    ///
    /// assert!(!ControllerState::Idle.is_active());
    /// assert!(ControllerState::Recording.is_active());
    /// assert!(ControllerState::Continuous.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        !matches!(self, ControllerState::Idle)
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Recording => "recording",
            ControllerState::Continuous => "continuous analysis",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Message shown before anything has happened.
pub const INITIAL_MESSAGE: &str =
    "Select a model and load it, then either record or upload audio to predict emotion.";

/// Everything a renderer or status line needs, updated by the controller.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: ControllerState,

    /// Latest status line ("Predicting...", "Predicted Emotion: …", "Error: …").
    pub message: String,

    /// Probabilities from the latest applied prediction.
    pub probabilities: [f32; EMOTION_COUNT],

    /// Label from the latest applied prediction.
    pub predicted_emotion: Option<String>,

    /// Latest error, cleared when a new session starts.
    pub error: Option<String>,

    /// `true` once the predictor acknowledged a model load.
    pub model_loaded: bool,

    /// `true` while a one-shot (upload / recording) prediction is in flight.
    pub prediction_pending: bool,

    /// Predictions applied so far, across all sessions.
    pub predictions: u64,

    /// Latest waveform snapshot handed to the renderer.
    pub waveform: Vec<f32>,
}

impl StatusSnapshot {
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            message: INITIAL_MESSAGE.into(),
            probabilities: [0.0; EMOTION_COUNT],
            predicted_emotion: None,
            error: None,
            model_loaded: false,
            prediction_pending: false,
            predictions: 0,
            waveform: Vec::new(),
        }
    }

    /// Record a prediction and set the status line to its label.
    pub fn apply_prediction(&mut self, prediction: &Prediction) {
        self.probabilities = prediction.probabilities;
        self.predicted_emotion = Some(prediction.predicted_emotion.clone());
        self.message = format!("Predicted Emotion: {}", prediction.predicted_emotion);
        self.predictions += 1;
    }

    /// Record an error and set the status line to `Error: <message>`.
    pub fn apply_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.message = format!("Error: {message}");
        self.error = Some(message);
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SharedStatus
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`StatusSnapshot`].
///
/// Lock for a short critical section only; never hold the lock across
/// `.await` points.
pub type SharedStatus = Arc<Mutex<StatusSnapshot>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(StatusSnapshot::new()))
}

/// Copy of the current snapshot, recovering from a poisoned lock.
pub fn read_status(status: &SharedStatus) -> StatusSnapshot {
    status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
