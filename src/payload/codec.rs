// Transport codec for audio payloads
// Samples travel as raw little-endian f32 bytes, base64-encoded, alongside
// the sample rate and frame count

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64 audio data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("audio data length {0} is not a multiple of 4 bytes")]
    Truncated(usize),
    #[error("payload carries no samples")]
    Empty,
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("frame count must be positive")]
    ZeroFrameCount,
}

/// One unit of audio as it crosses the transport boundary.
///
/// Field names on the wire are `audioBase64`, `sampleRate` and `frameCount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPayload {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub frame_count: u32,
}

/// Decoded form of a payload, ready to hand to an output sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono samples in [-1.0, 1.0], already truncated to the frame count.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate.max(1) as u64
    }
}

impl AudioPayload {
    /// Decode the base64 sample data into an [`AudioClip`].
    ///
    /// Only the first `frame_count` samples are kept; a payload may carry
    /// padding beyond that. A `frame_count` larger than the decoded length
    /// is clamped rather than rejected.
    pub fn decode(&self) -> Result<AudioClip, PayloadError> {
        if self.sample_rate == 0 {
            return Err(PayloadError::ZeroSampleRate);
        }
        if self.frame_count == 0 {
            return Err(PayloadError::ZeroFrameCount);
        }

        let bytes = STANDARD.decode(&self.audio_base64)?;
        if bytes.len() % 4 != 0 {
            return Err(PayloadError::Truncated(bytes.len()));
        }

        let mut samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if samples.is_empty() {
            return Err(PayloadError::Empty);
        }

        let frames = (self.frame_count as usize).min(samples.len());
        samples.truncate(frames);

        Ok(AudioClip {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// Producer-side encode contract.
///
/// Normalizes once by the peak absolute amplitude (an all-zero buffer is
/// left untouched), serializes the samples as raw little-endian f32 bytes
/// and base64-encodes them. An empty buffer or a zero sample rate produces
/// no payload at all.
pub fn encode_payload(samples: &[f32], sample_rate: u32) -> Option<AudioPayload> {
    if samples.is_empty() || sample_rate == 0 {
        return None;
    }

    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));

    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        let value = if peak > 0.0 { sample / peak } else { sample };
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    Some(AudioPayload {
        audio_base64: STANDARD.encode(&bytes),
        sample_rate,
        frame_count: samples.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn encode_normalizes_by_peak() {
        let payload = encode_payload(&[2.0, -4.0, 1.0], 16_000).unwrap();
        let clip = payload.decode().unwrap();

        assert_eq!(clip.samples.len(), 3);
        assert_abs_diff_eq!(clip.samples[0], 0.5);
        assert_abs_diff_eq!(clip.samples[1], -1.0);
        assert_abs_diff_eq!(clip.samples[2], 0.25);
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[test]
    fn encode_leaves_silence_untouched() {
        let payload = encode_payload(&[0.0, 0.0, 0.0], 8_000).unwrap();
        let clip = payload.decode().unwrap();
        assert_eq!(clip.samples, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn encode_refuses_empty_input() {
        assert!(encode_payload(&[], 16_000).is_none());
        assert!(encode_payload(&[0.5], 0).is_none());
    }

    #[test]
    fn decode_truncates_to_frame_count() {
        let mut payload = encode_payload(&[0.1, 0.2, 0.3, 0.4], 16_000).unwrap();
        payload.frame_count = 2;

        let clip = payload.decode().unwrap();
        assert_eq!(clip.samples.len(), 2);
    }

    #[test]
    fn decode_clamps_oversized_frame_count() {
        let mut payload = encode_payload(&[0.1, 0.2], 16_000).unwrap();
        payload.frame_count = 100;

        let clip = payload.decode().unwrap();
        assert_eq!(clip.samples.len(), 2);
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let payload = AudioPayload {
            audio_base64: "not base64 at all!!!".into(),
            sample_rate: 16_000,
            frame_count: 1,
        };
        assert!(matches!(payload.decode(), Err(PayloadError::Base64(_))));
    }

    #[test]
    fn decode_rejects_partial_samples() {
        let payload = AudioPayload {
            audio_base64: STANDARD.encode([0u8, 0, 0, 0, 0, 0]),
            sample_rate: 16_000,
            frame_count: 1,
        };
        assert!(matches!(payload.decode(), Err(PayloadError::Truncated(6))));
    }

    #[test]
    fn decode_rejects_zero_metadata() {
        let good = encode_payload(&[0.5], 16_000).unwrap();

        let mut bad_rate = good.clone();
        bad_rate.sample_rate = 0;
        assert!(matches!(bad_rate.decode(), Err(PayloadError::ZeroSampleRate)));

        let mut bad_frames = good;
        bad_frames.frame_count = 0;
        assert!(matches!(
            bad_frames.decode(),
            Err(PayloadError::ZeroFrameCount)
        ));
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let payload = encode_payload(&[0.5, -0.5], 24_000).unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert!(value.get("audioBase64").is_some());
        assert_eq!(value["sampleRate"], 24_000);
        assert_eq!(value["frameCount"], 2);
    }

    #[test]
    fn wire_round_trip() {
        let payload = encode_payload(&[0.25, -0.75, 0.5], 22_050).unwrap();
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: AudioPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.decode().unwrap(), payload.decode().unwrap());
    }
}
