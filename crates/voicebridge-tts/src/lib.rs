//! TTS (Synthesizer) stage (spec.md §4.5): persistent streaming subsession
//! per utterance with a 4-tier fallback chain.

pub mod client;
pub mod mock;
pub mod stage;
pub mod ws_client;

pub use client::{
    SynthesizedAudio, SynthesizerClient, SynthesizerSession, SynthesizerSessionParams,
};
pub use stage::run_tts_stage;
