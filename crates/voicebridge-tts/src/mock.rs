//! Scriptable synthesizer client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use voicebridge_foundation::error::TtsError;

use crate::client::{
    SynthesizedAudio, SynthesizerClient, SynthesizerSession, SynthesizerSessionParams,
};

type SessionResult = Result<Box<dyn SynthesizerSession>, TtsError>;
type OneShotResult = Result<Vec<i16>, TtsError>;

#[derive(Default)]
pub struct ScriptedSynthesizerClient {
    sessions: Mutex<VecDeque<SessionResult>>,
    one_shots: Mutex<VecDeque<OneShotResult>>,
    open_count: Arc<AtomicUsize>,
    one_shot_count: Arc<AtomicUsize>,
}

impl ScriptedSynthesizerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_session(&self, session: SessionResult) {
        self.sessions.lock().push_back(session);
    }

    pub fn push_one_shot(&self, result: OneShotResult) {
        self.one_shots.lock().push_back(result);
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn one_shot_count(&self) -> usize {
        self.one_shot_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesizerClient for ScriptedSynthesizerClient {
    async fn open_subsession(
        &self,
        _params: SynthesizerSessionParams,
    ) -> Result<Box<dyn SynthesizerSession>, TtsError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TtsError::Transport("no scripted session queued".to_string())))
    }

    async fn synthesize_once(
        &self,
        _text: &str,
        _params: SynthesizerSessionParams,
    ) -> Result<Vec<i16>, TtsError> {
        self.one_shot_count.fetch_add(1, Ordering::SeqCst);
        self.one_shots
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TtsError::Transport("no scripted one-shot queued".to_string())))
    }
}

/// A session whose `send_text`/`end_stream` calls always succeed and which
/// yields a fixed, scripted set of chunks only after `end_stream`.
pub struct MockSession {
    chunks: VecDeque<SynthesizedAudio>,
    ended: bool,
    fail_send: bool,
}

impl MockSession {
    pub fn new(chunks: Vec<Vec<i16>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(|samples| SynthesizedAudio { samples }).collect(),
            ended: false,
            fail_send: false,
        }
    }

    pub fn boxed(chunks: Vec<Vec<i16>>) -> Box<dyn SynthesizerSession> {
        Box::new(Self::new(chunks))
    }

    /// A session whose `send_text` always fails, for exercising the
    /// mid-stream recovery path.
    pub fn failing() -> Box<dyn SynthesizerSession> {
        Box::new(Self {
            chunks: VecDeque::new(),
            ended: false,
            fail_send: true,
        })
    }
}

#[async_trait]
impl SynthesizerSession for MockSession {
    async fn send_text(&mut self, _text_suffix: &str) -> Result<(), TtsError> {
        if self.fail_send {
            return Err(TtsError::Transport("mock send failure".to_string()));
        }
        Ok(())
    }

    async fn end_stream(&mut self) -> Result<(), TtsError> {
        self.ended = true;
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<SynthesizedAudio>, TtsError> {
        if !self.ended {
            return Ok(None);
        }
        Ok(self.chunks.pop_front())
    }
}
