//! `Utterance` — spec.md §3.

use std::time::Instant;

pub const INPUT_SAMPLE_RATE_HZ: u32 = voicebridge_audio::SAMPLE_RATE_HZ;

/// A contiguous span of speech, frozen at VAD emit time. Audio bytes are
/// 16-bit signed PCM, matching Capture's output format exactly (no
/// resampling at this boundary).
#[derive(Debug, Clone)]
pub struct Utterance {
    pub samples: Vec<i16>,
    pub start_timestamp: Instant,
    pub end_timestamp: Instant,
    pub average_speech_probability: f32,
    /// True when cut by the max-utterance guard rather than by silence
    /// (spec.md §3, §4.2 end condition b).
    pub partial: bool,
    pub sequence: u64,
}

impl Utterance {
    pub fn duration_ms(&self) -> f32 {
        (self.samples.len() as f32 * 1000.0) / INPUT_SAMPLE_RATE_HZ as f32
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * 2
    }

    /// `spec.md` §3 invariant: audio bytes length equals duration × sample
    /// rate × 2 (16-bit samples).
    pub fn pcm_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_bytes_length_matches_invariant() {
        let utt = Utterance {
            samples: vec![0i16; 8000],
            start_timestamp: Instant::now(),
            end_timestamp: Instant::now(),
            average_speech_probability: 0.8,
            partial: false,
            sequence: 0,
        };
        assert_eq!(utt.pcm_bytes().len(), utt.byte_len());
        assert_eq!(utt.byte_len(), utt.samples.len() * 2);
    }
}
