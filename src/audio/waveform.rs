//! Rolling waveform buffer for the live visualisation.
//!
//! [`RollingWaveformBuffer`] keeps the most recent `capacity` samples in a
//! fixed array with a wrap-around write cursor.  The frame loop calls
//! [`RollingWaveformBuffer::snapshot`] to get exactly `width` points for the
//! [`Renderer`], independent of how much audio has been written so far.
//!
//! The buffer is observational only.  Writes never fail or block and it has
//! no back-pressure relationship with chunk extraction.
//!
//! # Example
//!
//! ```rust
//! use emotion_stream::audio::RollingWaveformBuffer;
//!
//! let mut wave = RollingWaveformBuffer::new(16_000 * 10);
//! wave.write(&[0.25_f32; 1_024]);
//!
//! let points = wave.snapshot(200);
//! assert_eq!(points.len(), 200);
//! ```

use crate::audio::accumulator::sanitize_sample;
use crate::audio::Sample;

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Sink for waveform snapshots (a canvas, a terminal meter, a test probe).
///
/// Rendering never fails the pipeline; implementations swallow their own
/// errors.
pub trait Renderer {
    fn render(&mut self, points: &[f32]);
}

// ---------------------------------------------------------------------------
// compress
// ---------------------------------------------------------------------------

/// Signed-log compression `sign(v) * ln(1 + |v|)`, used so low-amplitude
/// structure stays visible next to loud passages.
#[inline]
pub fn compress(v: Sample) -> f32 {
    v.signum() * v.abs().ln_1p()
}

// ---------------------------------------------------------------------------
// RollingWaveformBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity circular sample buffer.
///
/// ## Overflow behaviour
///
/// Writes past the end of the array wrap to offset 0 and overwrite the
/// oldest samples.  The array is allocated once and never resized.
pub struct RollingWaveformBuffer {
    buf: Vec<Sample>,
    /// Index of the *next* write position; also the oldest sample once the
    /// buffer has wrapped.
    cursor: usize,
}

impl RollingWaveformBuffer {
    /// Create a zero-filled buffer holding `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWaveformBuffer capacity must be > 0");
        Self {
            buf: vec![0.0; capacity],
            cursor: 0,
        }
    }

    /// Copy `batch` in at the cursor, wrapping at the array tail.
    ///
    /// The cursor advances by `batch.len() % capacity`.  When the batch is
    /// longer than the array only its last `capacity` samples survive, which
    /// is what writing it sample by sample would leave behind.  NaN samples
    /// are stored as `0.0`.
    pub fn write(&mut self, batch: &[Sample]) {
        let capacity = self.buf.len();
        let skip = batch.len().saturating_sub(capacity);
        let data = &batch[skip..];
        let start = (self.cursor + skip) % capacity;

        let head = data.len().min(capacity - start);
        let (front, wrapped) = data.split_at(head);

        for (dst, &src) in self.buf[start..start + head].iter_mut().zip(front) {
            *dst = sanitize_sample(src);
        }
        for (dst, &src) in self.buf[..wrapped.len()].iter_mut().zip(wrapped) {
            *dst = sanitize_sample(src);
        }

        self.cursor = (self.cursor + batch.len() % capacity) % capacity;
    }

    /// Sample `width` evenly spaced points, oldest first, and apply
    /// [`compress`] to each.
    ///
    /// The stride is `ceil(capacity / width)` and reads start at the cursor,
    /// so the result is in time order whatever the wrap point.  Always returns
    /// exactly `width` points.
    pub fn snapshot(&self, width: usize) -> Vec<f32> {
        if width == 0 {
            return Vec::new();
        }
        let capacity = self.buf.len();
        let stride = capacity.div_ceil(width);

        (0..width)
            .map(|i| compress(self.buf[(self.cursor + i * stride) % capacity]))
            .collect()
    }

    /// Zero the buffer and reset the cursor.
    pub fn clear(&mut self) {
        self.buf.fill(0.0);
        self.cursor = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The full array in time order (oldest first), without compression.
    pub fn ordered(&self) -> Vec<Sample> {
        let (newest, oldest) = self.buf.split_at(self.cursor);
        oldest.iter().chain(newest).copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
