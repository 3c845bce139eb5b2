//! WebSocket-backed `SynthesizerClient` (spec.md §6 "Synthesizer client").
//!
//! A generic streaming-TTS wire shape: connect, send a Beginning-of-Stream
//! control frame with voice settings, then a run of text-append frames,
//! then an End-of-Stream frame; receive base64-encoded PCM frames back.
//! This is the production counterpart to `mock::ScriptedSynthesizerClient`
//! — tests exercise the stage against the mock, per SPEC_FULL.md §8. The
//! one-shot non-streaming tier is a plain POST over the same connection
//! shape's REST sibling, modeled here as a single request/response frame
//! pair rather than a separate HTTP client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use voicebridge_foundation::error::TtsError;

use crate::client::{
    SynthesizedAudio, SynthesizerClient, SynthesizerSession, SynthesizerSessionParams,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Serialize)]
struct BeginFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    voice_id: Option<&'a str>,
    stability: f32,
    similarity_boost: f32,
    style: f32,
    output_format: &'static str,
    latency_preset: &'static str,
}

#[derive(Serialize)]
struct TextFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    audio_base64: String,
}

fn latency_preset_name(preset: voicebridge_foundation::config::LatencyPreset) -> &'static str {
    use voicebridge_foundation::config::LatencyPreset::*;
    match preset {
        Quality => "quality",
        Balanced => "balanced",
        Low => "low",
        Lower => "lower",
        Lowest => "lowest",
    }
}

pub struct WebSocketSynthesizerClient {
    endpoint: String,
    api_key: String,
}

impl WebSocketSynthesizerClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SynthesizerClient for WebSocketSynthesizerClient {
    async fn open_subsession(
        &self,
        params: SynthesizerSessionParams,
    ) -> Result<Box<dyn SynthesizerSession>, TtsError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let (mut ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        let begin = BeginFrame {
            kind: "begin",
            voice_id: params.voice_id.as_deref(),
            stability: params.stability,
            similarity_boost: params.similarity,
            style: params.style,
            output_format: "pcm_24000",
            latency_preset: latency_preset_name(params.latency_preset),
        };
        let payload = serde_json::to_string(&begin).map_err(|e| TtsError::Transport(e.to_string()))?;
        ws.send(Message::Text(payload))
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        Ok(Box::new(WebSocketSynthesizerSession { ws }))
    }

    async fn synthesize_once(
        &self,
        text: &str,
        params: SynthesizerSessionParams,
    ) -> Result<Vec<i16>, TtsError> {
        let mut session = self.open_subsession(params).await?;
        session.send_text(text).await?;
        session.end_stream().await?;
        let mut samples = Vec::new();
        while let Some(chunk) = session.next_chunk().await? {
            samples.extend(chunk.samples);
        }
        Ok(samples)
    }
}

struct WebSocketSynthesizerSession {
    ws: WsStream,
}

#[async_trait]
impl SynthesizerSession for WebSocketSynthesizerSession {
    async fn send_text(&mut self, text_suffix: &str) -> Result<(), TtsError> {
        let frame = TextFrame {
            kind: "text",
            text: text_suffix,
        };
        let payload = serde_json::to_string(&frame).map_err(|e| TtsError::Transport(e.to_string()))?;
        self.ws
            .send(Message::Text(payload))
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))
    }

    async fn end_stream(&mut self) -> Result<(), TtsError> {
        self.ws
            .send(Message::Text(r#"{"type":"end"}"#.to_string()))
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))
    }

    async fn next_chunk(&mut self) -> Result<Option<SynthesizedAudio>, TtsError> {
        loop {
            let Some(msg) = self.ws.next().await else {
                return Ok(None);
            };
            let msg = msg.map_err(|e| TtsError::Transport(e.to_string()))?;
            let Message::Text(text) = msg else { continue };

            let frame: WireChunk =
                serde_json::from_str(&text).map_err(|e| TtsError::Transport(e.to_string()))?;

            return match frame.kind.as_str() {
                "audio" => {
                    let bytes = BASE64
                        .decode(frame.audio_base64)
                        .map_err(|e| TtsError::Transport(e.to_string()))?;
                    let samples = bytes
                        .chunks_exact(2)
                        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                        .collect();
                    Ok(Some(SynthesizedAudio { samples }))
                }
                "done" => Ok(None),
                "error" => Err(TtsError::Semantic(frame.audio_base64)),
                other => {
                    tracing::debug!(frame_type = other, "ignoring unrecognized synthesizer frame");
                    continue;
                }
            };
        }
    }
}
