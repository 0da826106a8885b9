//! Decoding of uploaded / recorded audio containers.
//!
//! [`Decoder`] turns an encoded byte buffer into channel 0 of the audio plus
//! its native sample rate.  [`WavDecoder`] handles RIFF/WAVE files through
//! `hound`, normalising integer PCM of any bit depth to `[-1.0, 1.0]`.

use std::io::Cursor;

use thiserror::Error;

use crate::audio::Sample;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed or unsupported WAV data.
    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio container has no channels")]
    NoChannels,

    #[error("audio container holds no samples")]
    Empty,
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// Channel 0 of a decoded clip at its native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

pub trait Decoder {
    /// Decode `bytes` into channel 0 and its native sample rate.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError>;
}

/// WAV decoder backed by `hound`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(DecodeError::NoChannels);
        }

        let interleaved: Vec<Sample> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples: Vec<Sample> = interleaved.into_iter().step_by(channels).collect();
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        log::debug!(
            "decode: {} samples @ {} Hz ({} ch, {} bit {:?})",
            samples.len(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
