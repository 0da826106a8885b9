//! Core `Predictor` trait.
//!
//! The classifier is a remote service.  Its transport is owned by whoever
//! implements [`Predictor`]; the stream controller only hands over chunks
//! and surfaces the outcome.  Failures are reported per chunk and never
//! retried here.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::Chunk;
use crate::predict::emotion::Prediction;

// ---------------------------------------------------------------------------
// PredictError
// ---------------------------------------------------------------------------

/// Errors a predictor backend can report.
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    /// The service could not be reached.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-2xx status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Predictor trait
// ---------------------------------------------------------------------------

/// Async interface to the emotion classifier.
///
/// Implementors must be `Send + Sync` so submissions can run as independent
/// tasks sharing one `Arc<dyn Predictor>`.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Ask the service to load `model_name`; returns its status message.
    async fn load_model(&self, model_name: &str) -> Result<String, PredictError>;

    /// Classify one chunk of mono audio at `chunk.sample_rate`.
    async fn predict(&self, chunk: Chunk) -> Result<Prediction, PredictError>;
}

// Compile-time assertion: Box<dyn Predictor> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Predictor>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
