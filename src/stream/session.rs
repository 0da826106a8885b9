//! One capture lifecycle.
//!
//! A [`StreamSession`] owns everything a running capture needs: the device
//! guard, the resampler, the rolling waveform buffer, the mode-specific
//! accumulation buffer and (for bounded recordings) the ceiling timer.
//! [`StreamSession::finish`] consumes it, which releases all of them.

use std::fmt;

use crate::audio::{
    sanitize, ActiveCapture, Chunk, ChunkAccumulator, Resampler, RollingWaveformBuffer, Sample,
};
use crate::stream::state::ControllerState;
use crate::stream::timer::RecordingTimer;

// ---------------------------------------------------------------------------
// StreamMode
// ---------------------------------------------------------------------------

/// The three ways audio reaches the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Decode a file, resample once, submit once.
    Upload,
    /// Capture up to the ceiling, resample once on stop, submit once.
    BoundedRecording,
    /// Resample every batch and submit each complete chunk.
    Continuous,
}

impl StreamMode {
    pub fn label(&self) -> &'static str {
        match self {
            StreamMode::Upload => "upload",
            StreamMode::BoundedRecording => "recording",
            StreamMode::Continuous => "continuous analysis",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Monotonically increasing session number, used to drop stale batches and
/// results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// StreamSession
// ---------------------------------------------------------------------------

enum SessionBuffer {
    /// Raw samples at the device rate, resampled once on finish.
    Recording(Vec<Sample>),
    Continuous(ChunkAccumulator),
}

/// Result of feeding one batch into a session.
#[derive(Debug, Default)]
pub struct Ingested {
    /// Complete chunks ready for submission, in arrival order.
    pub chunks: Vec<Chunk>,
    /// NaN samples replaced in this batch.
    pub sanitized: usize,
}

/// What is left once a session ends.
#[derive(Debug)]
pub enum Finished {
    /// A bounded recording: the whole clip at the target rate, NaN-free.
    Recording { clip: Chunk, sanitized: usize },
    /// A continuous stream: the partial remainder that was discarded.
    Continuous { discarded: usize },
}

pub struct StreamSession {
    id: SessionId,
    capture: Box<dyn ActiveCapture>,
    resampler: Resampler,
    waveform: RollingWaveformBuffer,
    buffer: SessionBuffer,
    timer: Option<RecordingTimer>,
}

impl StreamSession {
    /// A bounded recording session.  `timer` enforces the ceiling.
    pub fn recording(
        id: SessionId,
        capture: Box<dyn ActiveCapture>,
        resampler: Resampler,
        waveform_capacity: usize,
        timer: RecordingTimer,
    ) -> Self {
        Self {
            id,
            capture,
            resampler,
            waveform: RollingWaveformBuffer::new(waveform_capacity),
            buffer: SessionBuffer::Recording(Vec::new()),
            timer: Some(timer),
        }
    }

    /// A continuous session emitting chunks of `chunk_len` samples at the
    /// resampler's output rate.
    pub fn continuous(
        id: SessionId,
        capture: Box<dyn ActiveCapture>,
        resampler: Resampler,
        waveform_capacity: usize,
        chunk_len: usize,
    ) -> Self {
        let accumulator = ChunkAccumulator::new(chunk_len, resampler.rate_out());
        Self {
            id,
            capture,
            resampler,
            waveform: RollingWaveformBuffer::new(waveform_capacity),
            buffer: SessionBuffer::Continuous(accumulator),
            timer: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> ControllerState {
        match self.buffer {
            SessionBuffer::Recording(_) => ControllerState::Recording,
            SessionBuffer::Continuous(_) => ControllerState::Continuous,
        }
    }

    pub fn mode(&self) -> StreamMode {
        match self.buffer {
            SessionBuffer::Recording(_) => StreamMode::BoundedRecording,
            SessionBuffer::Continuous(_) => StreamMode::Continuous,
        }
    }

    /// Native rate reported by the capture device.
    pub fn native_rate(&self) -> u32 {
        self.capture.sample_rate()
    }

    /// Feed one capture batch (device rate).
    ///
    /// The batch is resampled to the target rate for the waveform tap.  A
    /// recording keeps the raw batch; a continuous session pushes the
    /// resampled batch into its accumulator and returns any complete chunks.
    pub fn ingest(&mut self, batch: &[Sample]) -> Ingested {
        let resampled = self.resampler.process(batch);
        self.waveform.write(&resampled);

        match &mut self.buffer {
            SessionBuffer::Recording(raw) => {
                raw.extend_from_slice(batch);
                Ingested::default()
            }
            SessionBuffer::Continuous(acc) => {
                let chunks = acc.push(&resampled);
                Ingested {
                    chunks,
                    sanitized: acc.take_sanitized(),
                }
            }
        }
    }

    /// `width` points of the rolling waveform for the renderer.
    pub fn snapshot(&self, width: usize) -> Vec<f32> {
        self.waveform.snapshot(width)
    }

    /// Samples buffered so far (raw for a recording, pending for a stream).
    pub fn buffered(&self) -> usize {
        match &self.buffer {
            SessionBuffer::Recording(raw) => raw.len(),
            SessionBuffer::Continuous(acc) => acc.pending(),
        }
    }

    /// End the session: cancel the timer, release the device, and hand back
    /// what the buffer held.
    pub fn finish(self) -> Finished {
        let Self {
            id,
            capture,
            resampler,
            buffer,
            timer,
            ..
        } = self;

        if let Some(timer) = timer {
            timer.cancel();
        }
        drop(capture);
        log::debug!("session {id}: capture released");

        match buffer {
            SessionBuffer::Recording(raw) => {
                let mut samples = resampler.process(&raw).into_owned();
                let sanitized = sanitize(&mut samples);
                Finished::Recording {
                    clip: Chunk::new(samples, resampler.rate_out()),
                    sanitized,
                }
            }
            SessionBuffer::Continuous(mut acc) => Finished::Continuous {
                discarded: acc.flush().len(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
