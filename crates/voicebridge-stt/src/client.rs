//! Recognizer client boundary (spec.md §6 "Recognizer client").
//!
//! A connection-oriented streaming session: `open` negotiates language,
//! sample rate, encoding, and endpointing; `send_audio`/`recv` drive the
//! duplex exchange; `close` tears it down. Shaped like the teacher's
//! `coldvox-stt::plugin::SttPlugin` trait boundary but session-oriented
//! rather than call-oriented, since spec.md §4.3 requires one persistent
//! connection reused across utterances rather than per-utterance
//! initialization.

use async_trait::async_trait;

use voicebridge_foundation::error::SttError;

use crate::types::WordTiming;

#[derive(Debug, Clone)]
pub struct RecognizerSessionParams {
    pub language_code: String,
    pub sample_rate_hz: u32,
    pub encoding: String,
    pub endpointing_ms: u32,
    pub interim_results: bool,
}

#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    Interim {
        text: String,
        confidence: f32,
    },
    Final {
        text: String,
        confidence: f32,
        word_timings: Option<Vec<WordTiming>>,
    },
}

/// One persistent duplex session to the recognizer. Implementations must
/// tolerate `send_audio` being called many times (once per Utterance)
/// before `close`.
#[async_trait]
pub trait RecognizerSession: Send {
    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), SttError>;

    /// Signals that the current Utterance's audio is complete, so the
    /// recognizer's own endpointing (configured to match VAD) can finalize
    /// without waiting for more bytes on this logical turn.
    async fn end_utterance(&mut self) -> Result<(), SttError>;

    /// Returns `None` when the transport closed cleanly (not expected in
    /// steady state; treated as a transport error by the stage).
    async fn recv(&mut self) -> Result<Option<RecognizerEvent>, SttError>;

    async fn keepalive(&mut self) -> Result<(), SttError>;

    async fn close(&mut self) -> Result<(), SttError>;
}

#[async_trait]
pub trait RecognizerClient: Send + Sync {
    async fn open(
        &self,
        params: RecognizerSessionParams,
    ) -> Result<Box<dyn RecognizerSession>, SttError>;
}
