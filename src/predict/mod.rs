//! Classifier collaborator.
//!
//! This module provides:
//! * [`Predictor`] — async trait implemented by classifier backends.
//! * [`Prediction`] — one response: six probabilities plus a label.
//! * [`Emotion`] — the six classes in probability-vector order.
//! * [`PredictError`] — transport / server / parse failures.

pub mod emotion;
pub mod predictor;

pub use emotion::{Emotion, Prediction, EMOTION_COUNT};
pub use predictor::{PredictError, Predictor};
