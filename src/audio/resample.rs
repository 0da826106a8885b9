//! Sample-rate conversion and channel extraction.
//!
//! The classifier expects **16 kHz mono `f32`** audio.  This module provides
//! the two conversion steps applied to every capture batch and decoded clip:
//!
//! 1. [`first_channel`] — keep channel 0 of interleaved multi-channel audio.
//! 2. [`resample`] / [`Resampler`] — convert from any source rate to any
//!    target rate.
//!
//! ## Quality note
//!
//! The default [`ResampleQuality::Nearest`] mode picks `input[floor(i * ratio)]`
//! for each output index.  There is no anti-aliasing filter, so it is lossy
//! and aliasing-prone above 2× rate changes.  [`ResampleQuality::Linear`]
//! interpolates between the picked sample and its successor and produces the
//! same output length.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::audio::Sample;
use crate::error::StreamError;

// ---------------------------------------------------------------------------
// first_channel
// ---------------------------------------------------------------------------

/// Extract channel 0 from interleaved audio.
///
/// * If `channels == 1` the input is returned unchanged (borrowed).
/// * If `channels == 0` an empty slice is returned.
/// * A trailing partial frame is ignored.
///
/// ```rust
/// use emotion_stream::audio::first_channel;
///
/// let stereo = [0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// assert_eq!(first_channel(&stereo, 2).as_ref(), &[0.5, 0.2]);
/// ```
pub fn first_channel(samples: &[Sample], channels: u16) -> Cow<'_, [Sample]> {
    match channels {
        0 => Cow::Borrowed(&[]),
        1 => Cow::Borrowed(samples),
        n => Cow::Owned(
            samples
                .chunks_exact(n as usize)
                .map(|frame| frame[0])
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// ResampleQuality
// ---------------------------------------------------------------------------

/// How output samples are picked from the source sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleQuality {
    /// `output[i] = input[floor(i * ratio)]`.
    #[default]
    Nearest,
    /// Linear interpolation between `input[floor(i * ratio)]` and the next
    /// sample.
    Linear,
}

// ---------------------------------------------------------------------------
// Resampler
// ---------------------------------------------------------------------------

/// A validated `rate_in → rate_out` conversion.
///
/// Construct once per session with [`Resampler::new`] so an invalid rate is
/// reported before any state is created, then call
/// [`process`](Self::process) for every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    rate_in: u32,
    rate_out: u32,
    quality: ResampleQuality,
}

impl Resampler {
    /// Create a nearest-neighbour resampler.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRate`] when either rate is zero.
    pub fn new(rate_in: u32, rate_out: u32) -> Result<Self, StreamError> {
        Self::with_quality(rate_in, rate_out, ResampleQuality::Nearest)
    }

    /// Create a resampler with an explicit [`ResampleQuality`].
    pub fn with_quality(
        rate_in: u32,
        rate_out: u32,
        quality: ResampleQuality,
    ) -> Result<Self, StreamError> {
        if rate_in == 0 || rate_out == 0 {
            return Err(StreamError::InvalidRate { rate_in, rate_out });
        }
        Ok(Self {
            rate_in,
            rate_out,
            quality,
        })
    }

    pub fn rate_in(&self) -> u32 {
        self.rate_in
    }

    pub fn rate_out(&self) -> u32 {
        self.rate_out
    }

    /// `true` when input and output rates match and [`process`](Self::process)
    /// borrows its input.
    pub fn is_identity(&self) -> bool {
        self.rate_in == self.rate_out
    }

    /// Number of output samples produced for `input_len` input samples:
    /// `floor(input_len * rate_out / rate_in)`.
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len as u64 * self.rate_out as u64 / self.rate_in as u64) as usize
    }

    /// Convert `input` to the output rate.
    ///
    /// Identity conversions borrow `input`; everything else allocates exactly
    /// [`output_len`](Self::output_len) samples.  Index arithmetic is done in
    /// integers so `floor(i * ratio)` is exact for every rate pair.
    pub fn process<'a>(&self, input: &'a [Sample]) -> Cow<'a, [Sample]> {
        if self.is_identity() {
            return Cow::Borrowed(input);
        }

        let rate_in = self.rate_in as u64;
        let rate_out = self.rate_out as u64;
        let output_len = self.output_len(input.len());
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len as u64 {
            let scaled = i * rate_in;
            let idx = (scaled / rate_out) as usize;

            let sample = match self.quality {
                ResampleQuality::Nearest => input[idx],
                ResampleQuality::Linear => {
                    let frac = (scaled % rate_out) as f32 / rate_out as f32;
                    let next = input.get(idx + 1).copied().unwrap_or(input[idx]);
                    input[idx] * (1.0 - frac) + next * frac
                }
            };
            output.push(sample);
        }

        Cow::Owned(output)
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `input` from `rate_in` Hz to `rate_out` Hz with nearest-neighbour
/// selection.
///
/// ```rust
/// use emotion_stream::audio::resample;
///
/// let input = [0.0_f32, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
/// let out = resample(&input, 16_000, 8_000).unwrap();
/// assert_eq!(out.as_ref(), &[0.0, 2.0, 4.0, 6.0]);
///
/// // Same rate: returned unchanged.
/// assert_eq!(resample(&input, 16_000, 16_000).unwrap().as_ref(), &input);
/// ```
///
/// # Errors
///
/// Returns [`StreamError::InvalidRate`] when either rate is zero.
pub fn resample(
    input: &[Sample],
    rate_in: u32,
    rate_out: u32,
) -> Result<Cow<'_, [Sample]>, StreamError> {
    Ok(Resampler::new(rate_in, rate_out)?.process(input))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
