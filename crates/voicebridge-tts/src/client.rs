//! Synthesizer client boundary (spec.md §4.5 "Subsession protocol").
//!
//! One subsession per utterance sequence: Beginning-of-Stream with voice
//! settings, a run of appended-text-suffix sends, End-of-Stream, then the
//! audio chunks that arrived in response.

use async_trait::async_trait;

use voicebridge_foundation::config::LatencyPreset;
use voicebridge_foundation::error::TtsError;

#[derive(Debug, Clone)]
pub struct SynthesizerSessionParams {
    /// `None` selects the synthesizer's default, non-cloned voice — used by
    /// the fallback chain's alternate-synthesizer tier (spec.md §4.5
    /// fallback step 3: "non-cloned voice").
    pub voice_id: Option<String>,
    pub stability: f32,
    pub similarity: f32,
    pub style: f32,
    pub latency_preset: LatencyPreset,
}

/// Raw PCM handed back by a session; the stage assigns the utterance
/// `sequence` and decides which chunk is final, so the client need not
/// track either.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub samples: Vec<i16>,
}

#[async_trait]
pub trait SynthesizerSession: Send {
    /// Forwards only the newly appended text since the last call (spec.md
    /// §4.5 subsession protocol step 2); the very first call carries the
    /// whole initial prefix.
    async fn send_text(&mut self, text_suffix: &str) -> Result<(), TtsError>;

    async fn end_stream(&mut self) -> Result<(), TtsError>;

    /// `Ok(None)` marks the stream as fully drained after End-of-Stream.
    async fn next_chunk(&mut self) -> Result<Option<SynthesizedAudio>, TtsError>;
}

#[async_trait]
pub trait SynthesizerClient: Send + Sync {
    async fn open_subsession(
        &self,
        params: SynthesizerSessionParams,
    ) -> Result<Box<dyn SynthesizerSession>, TtsError>;

    /// Fallback tier 2 (spec.md §4.5): a one-shot non-streaming request
    /// against the same vendor, given the full text known so far.
    async fn synthesize_once(
        &self,
        text: &str,
        params: SynthesizerSessionParams,
    ) -> Result<Vec<i16>, TtsError>;
}
