//! Scriptable translator client for tests (mirrors
//! `voicebridge_stt::mock::ScriptedRecognizerClient`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use voicebridge_foundation::error::TranslateError;

use crate::client::{TranslateRequest, TranslationEvent, TranslationStream, TranslatorClient};

type StreamResult = Result<Box<dyn TranslationStream>, TranslateError>;

pub struct ScriptedTranslatorClient {
    streams: Mutex<VecDeque<StreamResult>>,
    call_count: Arc<AtomicUsize>,
}

impl Default for ScriptedTranslatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTranslatorClient {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push_stream(&self, stream: StreamResult) {
        self.streams.lock().push_back(stream);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslatorClient for ScriptedTranslatorClient {
    async fn translate(&self, _request: TranslateRequest) -> StreamResult {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.streams
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TranslateError::Transport("no scripted stream queued".to_string())))
    }
}

pub struct MockStream {
    events: VecDeque<Result<TranslationEvent, TranslateError>>,
}

impl MockStream {
    pub fn new(events: Vec<Result<TranslationEvent, TranslateError>>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    pub fn boxed(events: Vec<Result<TranslationEvent, TranslateError>>) -> Box<dyn TranslationStream> {
        Box::new(Self::new(events))
    }

    /// Convenience for tests: wraps a list of word deltas ending in `End`.
    pub fn from_words(words: &[&str]) -> Box<dyn TranslationStream> {
        let mut events: Vec<Result<TranslationEvent, TranslateError>> = words
            .iter()
            .map(|w| Ok(TranslationEvent::Delta(format!("{w} "))))
            .collect();
        events.push(Ok(TranslationEvent::End));
        Self::boxed(events)
    }
}

#[async_trait]
impl TranslationStream for MockStream {
    async fn next_event(&mut self) -> Result<Option<TranslationEvent>, TranslateError> {
        match self.events.pop_front() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
