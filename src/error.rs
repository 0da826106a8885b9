//! Crate-level error taxonomy.
//!
//! Every variant is recoverable at the session boundary; nothing here is
//! fatal to the process.
//!
//! | Variant | Raised | Effect |
//! |---------|--------|--------|
//! | `InvalidRate` | before a session is created | no state change |
//! | `ModeConflict` | before a session is created | active session untouched |
//! | `PredictionPending` | before a session is created | no state change |
//! | `Decode` | upload / recording stop | back to `Idle` |
//! | `Device` | recording / continuous start | stays `Idle` |
//! | `Transport` | per submission | stream keeps running |

use thiserror::Error;

use crate::audio::{CaptureError, DecodeError};
use crate::predict::PredictError;
use crate::stream::{ControllerState, StreamMode};

#[derive(Debug, Error)]
pub enum StreamError {
    /// A sample rate of zero was supplied.
    #[error("invalid sample rate conversion: {rate_in} Hz -> {rate_out} Hz")]
    InvalidRate { rate_in: u32, rate_out: u32 },

    #[error("failed to decode audio: {0}")]
    Decode(#[from] DecodeError),

    #[error("audio device error: {0}")]
    Device(#[from] CaptureError),

    /// An exclusive mode was requested while another one is active.
    #[error("cannot start {requested} while {active} is active")]
    ModeConflict {
        requested: StreamMode,
        active: ControllerState,
    },

    /// A one-shot prediction is still in flight.
    #[error("please wait for the current prediction to complete")]
    PredictionPending,

    #[error("prediction failed: {0}")]
    Transport(#[from] PredictError),

    /// The controller loop has exited; the handle can no longer reach it.
    #[error("stream controller is not running")]
    ControllerClosed,
}
