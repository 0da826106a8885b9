//! Growable accumulation buffer that emits fixed-size [`Chunk`]s.
//!
//! Every capture callback pushes a batch of samples; once at least
//! `chunk_len` samples are buffered, whole chunks are sliced off the front
//! and returned in arrival order.  The remainder stays buffered for the next
//! push.  A partial remainder is never emitted by [`ChunkAccumulator::push`];
//! the caller decides what to do with it via [`ChunkAccumulator::flush`].
//!
//! # Example
//!
//! ```rust
//! use emotion_stream::audio::ChunkAccumulator;
//!
//! let mut acc = ChunkAccumulator::new(1_000, 16_000);
//! assert!(acc.push(&[0.0; 500]).is_empty());
//! let chunks = acc.push(&[0.0; 500]);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].len(), 1_000);
//!
//! assert!(acc.push(&[0.0; 500]).is_empty());
//! assert_eq!(acc.flush().len(), 500);
//! ```

use crate::audio::{Chunk, Sample};

// ---------------------------------------------------------------------------
// NaN sanitization
// ---------------------------------------------------------------------------

/// Replace a NaN sample with `0.0`; every other value passes through.
#[inline]
pub fn sanitize_sample(sample: Sample) -> Sample {
    if sample.is_nan() {
        0.0
    } else {
        sample
    }
}

/// Replace every NaN in `samples` with `0.0` in place.
///
/// Returns the number of samples that were replaced.
pub fn sanitize(samples: &mut [Sample]) -> usize {
    let mut replaced = 0;
    for s in samples.iter_mut().filter(|s| s.is_nan()) {
        *s = 0.0;
        replaced += 1;
    }
    replaced
}

// ---------------------------------------------------------------------------
// ChunkAccumulator
// ---------------------------------------------------------------------------

/// Append-only buffer that drains in whole chunks of `chunk_len` samples.
///
/// The backing `Vec` grows geometrically and is not capped.  A stream whose
/// pushes never reach `chunk_len` grows without bound, so the owning session
/// must be stopped by its caller.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: Vec<Sample>,
    chunk_len: usize,
    sample_rate: u32,
    /// NaN samples replaced since the last [`take_sanitized`](Self::take_sanitized).
    sanitized: usize,
}

impl ChunkAccumulator {
    /// Create an accumulator emitting chunks of `chunk_len` samples tagged
    /// with `sample_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_len == 0`.
    pub fn new(chunk_len: usize, sample_rate: u32) -> Self {
        assert!(chunk_len > 0, "ChunkAccumulator chunk_len must be > 0");
        Self {
            buffer: Vec::with_capacity(chunk_len),
            chunk_len,
            sample_rate,
            sanitized: 0,
        }
    }

    /// Append `batch` and return every complete chunk now available.
    ///
    /// NaN samples are replaced with `0.0` as they are appended.  The buffer
    /// is drained by `floor(len / chunk_len) * chunk_len` samples in a single
    /// step; the remainder is kept.
    pub fn push(&mut self, batch: &[Sample]) -> Vec<Chunk> {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(batch);
        self.sanitized += sanitize(&mut self.buffer[start..]);

        let drain_len = (self.buffer.len() / self.chunk_len) * self.chunk_len;
        if drain_len == 0 {
            return Vec::new();
        }

        let chunks = self.buffer[..drain_len]
            .chunks_exact(self.chunk_len)
            .map(|samples| Chunk::new(samples.to_vec(), self.sample_rate))
            .collect();
        self.buffer.drain(..drain_len);

        chunks
    }

    /// Take the buffered partial remainder (`< chunk_len` samples), leaving
    /// the accumulator empty.
    pub fn flush(&mut self) -> Vec<Sample> {
        std::mem::take(&mut self.buffer)
    }

    /// Number of samples waiting for the next chunk.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of NaN samples replaced since the last call, resetting the
    /// counter.
    pub fn take_sanitized(&mut self) -> usize {
        std::mem::take(&mut self.sanitized)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
