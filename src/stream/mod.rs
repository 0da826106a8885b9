//! Stream controller and its session machinery.
//!
//! # State machine
//!
//! ```text
//! Idle ──start_recording──▶ Recording ──stop_recording / ceiling──▶ Idle
//! Idle ──start_continuous─▶ Continuous ──stop_continuous──────────▶ Idle
//! Idle ──upload───────────▶ Idle
//! ```
//!
//! Only one capture session exists at a time.  Results coming back for a
//! session that has already ended are dropped.

pub mod controller;
pub mod session;
pub mod state;
pub mod timer;

pub use controller::{ControllerCommand, ControllerEvent, ControllerHandle, StreamController};
pub use session::{Finished, Ingested, SessionId, StreamMode, StreamSession};
pub use state::{
    new_shared_status, read_status, ControllerState, SharedStatus, StatusSnapshot,
    INITIAL_MESSAGE,
};
pub use timer::RecordingTimer;
