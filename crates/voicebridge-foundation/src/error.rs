//! Shared error taxonomy (spec.md §7).
//!
//! Mirrors the teacher's `coldvox-foundation::error` shape: one top-level
//! enum wrapping a per-domain enum per stage, each domain enum a flat
//! `thiserror` derive. Kept in one crate (rather than one per stage) so the
//! Orchestrator can classify any stage's failure without depending on every
//! stage crate.

use std::time::Duration;
use thiserror::Error;

/// The five error kinds of spec.md §7, used by the Orchestrator to decide
/// mode transitions without matching on concrete error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid credentials, out-of-range parameter, unknown device. Fatal at
    /// startup; never encountered in steady state.
    Configuration,
    /// Input or output device unavailable.
    Device,
    /// Connection closed, network timeout, protocol framing error.
    Transport,
    /// Remote service returned a well-formed rejection (rate-limit, auth).
    Semantic,
    /// A downstream channel has been empty longer than expected.
    Starvation,
}

#[derive(Error, Debug)]
pub enum VoiceBridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Vad(#[from] VadError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error("component failed health check: {component}")]
    HealthCheckFailed { component: String },

    #[error("fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("transient error, will retry: {0}")]
    Transient(String),
}

impl VoiceBridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoiceBridgeError::Config(_) => ErrorKind::Configuration,
            VoiceBridgeError::Audio(e) => e.kind(),
            VoiceBridgeError::Vad(_) => ErrorKind::Transport,
            VoiceBridgeError::Stt(e) => e.kind(),
            VoiceBridgeError::Translate(e) => e.kind(),
            VoiceBridgeError::Tts(e) => e.kind(),
            VoiceBridgeError::HealthCheckFailed { .. } => ErrorKind::Starvation,
            VoiceBridgeError::Fatal(_) => ErrorKind::Configuration,
            VoiceBridgeError::Transient(_) => ErrorKind::Transport,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("device disconnected")]
    DeviceDisconnected,

    #[error("format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("no audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("fatal audio error: {0}")]
    Fatal(String),
}

impl AudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::DeviceNotFound { .. }
            | AudioError::DeviceDisconnected
            | AudioError::FormatNotSupported { .. } => ErrorKind::Device,
            AudioError::NoDataTimeout { .. } => ErrorKind::Starvation,
            AudioError::Fatal(_) => ErrorKind::Configuration,
        }
    }
}

#[derive(Error, Debug)]
pub enum VadError {
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    #[error("model initialization failed: {0}")]
    ModelInitFailed(String),
}

#[derive(Error, Debug)]
pub enum SttError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("recognizer rejected request: {0}")]
    Semantic(String),

    #[error("transcription timed out after {0:?}")]
    Timeout(Duration),
}

impl SttError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SttError::Transport(_) | SttError::Timeout(_) => ErrorKind::Transport,
            SttError::AuthenticationFailed(_) => ErrorKind::Semantic,
            SttError::Semantic(_) => ErrorKind::Semantic,
        }
    }
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("model rejected request: {0}")]
    Semantic(String),

    #[error("translation timed out after {0:?}")]
    Timeout(Duration),
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::Transport(_) | TranslateError::Timeout(_) => ErrorKind::Transport,
            TranslateError::Semantic(_) => ErrorKind::Semantic,
        }
    }
}

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("synthesizer rejected request: {0}")]
    Semantic(String),

    #[error("subsession timed out after {0:?}")]
    Timeout(Duration),

    #[error("all fallback tiers exhausted: {0}")]
    FallbackExhausted(String),
}

impl TtsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TtsError::Transport(_) | TtsError::Timeout(_) => ErrorKind::Transport,
            TtsError::Semantic(_) => ErrorKind::Semantic,
            TtsError::FallbackExhausted(_) => ErrorKind::Transport,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub name: String,
    pub is_current: bool,
    pub is_available: bool,
}
