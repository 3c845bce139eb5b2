//! Scriptable recognizer client for tests (SPEC_FULL.md §8 "Tests
//! exercising them are written against mock `RecognizerClient`... not
//! against real network services"), grounded on the shape of the teacher's
//! `coldvox-stt::plugins::mock::MockPlugin`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use voicebridge_foundation::error::SttError;

use crate::client::{RecognizerClient, RecognizerEvent, RecognizerSession, RecognizerSessionParams};

type SessionResult = Result<Box<dyn RecognizerSession>, SttError>;

/// Each `open()` call pops the next scripted outcome off the front of the
/// queue, so a test can script "first attempt fails, second succeeds" for
/// reconnection-with-backoff scenarios (spec.md §4.3 "Connection
/// discipline").
pub struct ScriptedRecognizerClient {
    sessions: Mutex<VecDeque<SessionResult>>,
    open_count: Arc<AtomicUsize>,
}

impl Default for ScriptedRecognizerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRecognizerClient {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            open_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push_session(&self, session: SessionResult) {
        self.sessions.lock().push_back(session);
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognizerClient for ScriptedRecognizerClient {
    async fn open(
        &self,
        _params: RecognizerSessionParams,
    ) -> Result<Box<dyn RecognizerSession>, SttError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SttError::Transport("no scripted session queued".to_string())))
    }
}

/// A queue of pre-scripted events (and/or a trailing error) replayed in
/// order by `recv()`. `send_audio`/`end_utterance` just count calls so
/// tests can assert the "re-sent at most once" reconnection invariant.
pub struct MockSession {
    events: VecDeque<Result<RecognizerEvent, SttError>>,
    pub send_audio_calls: Arc<AtomicUsize>,
    pub end_utterance_calls: Arc<AtomicUsize>,
    pub closed: Arc<std::sync::atomic::AtomicBool>,
}

impl MockSession {
    pub fn new(events: Vec<Result<RecognizerEvent, SttError>>) -> Self {
        Self {
            events: events.into_iter().collect(),
            send_audio_calls: Arc::new(AtomicUsize::new(0)),
            end_utterance_calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn boxed(events: Vec<Result<RecognizerEvent, SttError>>) -> Box<dyn RecognizerSession> {
        Box::new(Self::new(events))
    }
}

#[async_trait]
impl RecognizerSession for MockSession {
    async fn send_audio(&mut self, _pcm: &[u8]) -> Result<(), SttError> {
        self.send_audio_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_utterance(&mut self) -> Result<(), SttError> {
        self.end_utterance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RecognizerEvent>, SttError> {
        match self.events.pop_front() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn keepalive(&mut self) -> Result<(), SttError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SttError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
