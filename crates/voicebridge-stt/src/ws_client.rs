//! WebSocket-backed `RecognizerClient` (spec.md §6 "Recognizer client").
//!
//! A generic streaming-ASR wire shape: connect, send one JSON `start`
//! control frame, then binary PCM frames; receive JSON result frames. Most
//! vendor streaming STT APIs (the shape this spec is modeled on) use some
//! variant of this over a websocket, so this client is the production
//! counterpart to `mock::ScriptedRecognizerClient` — tests exercise the
//! stage against the mock, per SPEC_FULL.md §8.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use voicebridge_foundation::error::SttError;

use crate::client::{RecognizerClient, RecognizerEvent, RecognizerSession, RecognizerSessionParams};
use crate::types::WordTiming;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Serialize)]
struct StartFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    language_code: &'a str,
    sample_rate_hz: u32,
    encoding: &'a str,
    endpointing_ms: u32,
    interim_results: bool,
}

#[derive(Deserialize)]
struct ResultFrame {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    words: Option<Vec<WireWordTiming>>,
}

#[derive(Deserialize)]
struct WireWordTiming {
    word: String,
    start_ms: u32,
    end_ms: u32,
}

pub struct WebSocketRecognizerClient {
    endpoint: String,
    api_key: String,
}

impl WebSocketRecognizerClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl RecognizerClient for WebSocketRecognizerClient {
    async fn open(
        &self,
        params: RecognizerSessionParams,
    ) -> Result<Box<dyn RecognizerSession>, SttError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let (mut ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SttError::Transport(e.to_string()))?;

        let start = StartFrame {
            kind: "start",
            language_code: &params.language_code,
            sample_rate_hz: params.sample_rate_hz,
            encoding: &params.encoding,
            endpointing_ms: params.endpointing_ms,
            interim_results: params.interim_results,
        };
        let payload = serde_json::to_string(&start).map_err(|e| SttError::Transport(e.to_string()))?;
        ws.send(Message::Text(payload))
            .await
            .map_err(|e| SttError::Transport(e.to_string()))?;

        Ok(Box::new(WebSocketRecognizerSession { ws }))
    }
}

struct WebSocketRecognizerSession {
    ws: WsStream,
}

#[async_trait]
impl RecognizerSession for WebSocketRecognizerSession {
    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), SttError> {
        self.ws
            .send(Message::Binary(pcm.to_vec()))
            .await
            .map_err(|e| SttError::Transport(e.to_string()))
    }

    async fn end_utterance(&mut self) -> Result<(), SttError> {
        self.ws
            .send(Message::Text(r#"{"type":"end_utterance"}"#.to_string()))
            .await
            .map_err(|e| SttError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<RecognizerEvent>, SttError> {
        loop {
            let Some(msg) = self.ws.next().await else {
                return Ok(None);
            };
            let msg = msg.map_err(|e| SttError::Transport(e.to_string()))?;
            let Message::Text(text) = msg else { continue };

            let frame: ResultFrame =
                serde_json::from_str(&text).map_err(|e| SttError::Transport(e.to_string()))?;

            return match frame.kind.as_str() {
                "interim" => Ok(Some(RecognizerEvent::Interim {
                    text: frame.text,
                    confidence: frame.confidence,
                })),
                "final" => Ok(Some(RecognizerEvent::Final {
                    text: frame.text,
                    confidence: frame.confidence,
                    word_timings: frame.words.map(|words| {
                        words
                            .into_iter()
                            .map(|w| WordTiming {
                                word: w.word,
                                start_ms: w.start_ms,
                                end_ms: w.end_ms,
                            })
                            .collect()
                    }),
                })),
                "error" => Err(SttError::Semantic(frame.text)),
                other => {
                    tracing::debug!(frame_type = other, "ignoring unrecognized recognizer frame");
                    continue;
                }
            };
        }
    }

    async fn keepalive(&mut self) -> Result<(), SttError> {
        self.ws
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SttError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SttError> {
        self.ws
            .close(None)
            .await
            .map_err(|e| SttError::Transport(e.to_string()))
    }
}
