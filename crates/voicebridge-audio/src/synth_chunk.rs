//! `SynthChunk` — spec.md §3. Lives in this crate (rather than
//! `voicebridge-tts`, which produces it) because the Output Sink is the
//! stage with the strongest invariants over it (ordering, no interleaving);
//! TTS depends on this crate for the type rather than the reverse.

use std::time::Instant;

pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;

#[derive(Debug, Clone)]
pub struct SynthChunk {
    pub samples: Vec<i16>,
    pub sequence: u64,
    pub is_final: bool,
    pub origin_timestamp: Instant,
    /// Cumulative pipeline latency at the moment this chunk was produced by
    /// TTS; Output overwrites this with the enqueue-time measurement per
    /// spec.md §8 invariant 5 before it is counted in metrics.
    pub cumulative_latency_ms: u64,
}

impl SynthChunk {
    pub fn silence(sequence: u64, duration_ms: u64, origin_timestamp: Instant) -> Self {
        let sample_count = (OUTPUT_SAMPLE_RATE_HZ as u64 * duration_ms / 1000) as usize;
        Self {
            samples: vec![0i16; sample_count],
            sequence,
            is_final: true,
            origin_timestamp,
            cumulative_latency_ms: 0,
        }
    }
}
