//! Translator stage task (spec.md §4.4).
//!
//! Speculative forwarding: once the first token of a stream arrives, the
//! stage begins emitting growing-prefix `Translation` records downstream
//! every ~60 ms or every 4 tokens, whichever fires first, so TTS can begin
//! synthesizing before the translation finishes (spec.md §4.4
//! "Rationale").

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voicebridge_foundation::backoff::{Backoff, BackoffParams};
use voicebridge_foundation::config::TranslatorConfig;
use voicebridge_foundation::error::{ErrorKind, TranslateError};
use voicebridge_foundation::CancelSignal;
use voicebridge_stt::Transcript;
use voicebridge_telemetry::health::{HealthEvent, HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;

use crate::client::{TranslateRequest, TranslationEvent, TranslatorClient};
use crate::types::Translation;

const TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(5);
const EMIT_CADENCE: Duration = Duration::from_millis(60);
const EMIT_TOKEN_STRIDE: u32 = 4;

pub async fn run_translate_stage(
    client: Arc<dyn TranslatorClient>,
    config: TranslatorConfig,
    mut input: mpsc::Receiver<Transcript>,
    output: mpsc::Sender<Translation>,
    metrics: PipelineMetrics,
    health: HealthSender,
    cancel: CancelSignal,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            maybe_transcript = input.recv() => {
                let Some(transcript) = maybe_transcript else { break };
                metrics.set_queue_depth(Stage::Translator, input.len());

                let started = Instant::now();
                match process_transcript(&client, &config, &transcript, &output, &health).await {
                    Ok(()) => {
                        metrics.increment_processed(Stage::Translator);
                        metrics.record_latency(Stage::Translator, started.elapsed());
                    }
                    Err(e) => {
                        // process_transcript already reported the FatalError
                        // (with the precise ErrorKind) once retries were
                        // exhausted; this arm just updates metrics.
                        metrics.increment_error(Stage::Translator);
                        warn!(sequence = transcript.sequence, error = %e, "translation failed");
                    }
                }
            }
        }
    }

    info!("Translator stage stopped");
}

async fn process_transcript(
    client: &Arc<dyn TranslatorClient>,
    config: &TranslatorConfig,
    transcript: &Transcript,
    output: &mpsc::Sender<Translation>,
    health: &HealthSender,
) -> Result<(), TranslateError> {
    let deadline = transcript.origin_timestamp + TRANSCRIPT_TIMEOUT;
    let request = TranslateRequest {
        system_prompt: config.system_prompt.clone(),
        user_text: transcript.text.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut backoff = Backoff::new(BackoffParams::translator_default());

    loop {
        match attempt_stream(client, &request, transcript, output, deadline).await {
            Ok(()) => return Ok(()),
            Err(e) => match backoff.next() {
                Some(delay) => {
                    debug!(sequence = transcript.sequence, error = %e, "retrying translation");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let _ = health
                        .send(HealthEvent::FatalError {
                            stage: Stage::Translator,
                            kind: ErrorKind::Transport,
                            message: e.to_string(),
                        })
                        .await;
                    return Err(e);
                }
            },
        }
    }
}

/// One connect-and-drain attempt. Returns `Ok(())` once a final
/// `Translation` has been emitted downstream, whether the stream completed
/// normally or was cut short by the hard timeout (spec.md §4.4: "on
/// timeout, whatever text has been received is emitted as the final
/// Translation" — not itself an error).
async fn attempt_stream(
    client: &Arc<dyn TranslatorClient>,
    request: &TranslateRequest,
    transcript: &Transcript,
    output: &mpsc::Sender<Translation>,
    deadline: Instant,
) -> Result<(), TranslateError> {
    let mut stream = client.translate(request.clone()).await?;

    let mut accumulated = String::new();
    let mut tokens_since_emit: u32 = 0;
    let mut last_emit = Instant::now();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            emit(output, transcript, accumulated, true).await;
            return Ok(());
        }

        let event = match tokio::time::timeout(remaining, stream.next_event()).await {
            Ok(Ok(Some(event))) => event,
            Ok(Ok(None)) => {
                emit(output, transcript, accumulated, true).await;
                return Ok(());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                emit(output, transcript, accumulated, true).await;
                return Ok(());
            }
        };

        match event {
            TranslationEvent::Delta(delta) => {
                accumulated.push_str(&delta);
                tokens_since_emit += 1;
                if tokens_since_emit >= EMIT_TOKEN_STRIDE || last_emit.elapsed() >= EMIT_CADENCE {
                    emit(output, transcript, accumulated.clone(), false).await;
                    tokens_since_emit = 0;
                    last_emit = Instant::now();
                }
            }
            TranslationEvent::End => {
                emit(output, transcript, accumulated, true).await;
                return Ok(());
            }
        }
    }
}

async fn emit(
    output: &mpsc::Sender<Translation>,
    transcript: &Transcript,
    translated_text: String,
    is_final: bool,
) {
    let translation = Translation {
        original_text: transcript.text.clone(),
        translated_text,
        sequence: transcript.sequence,
        origin_timestamp: transcript.origin_timestamp,
        translation_latency_ms: transcript.origin_timestamp.elapsed().as_millis() as u64,
        is_final,
    };
    // Blocking send by design (spec.md §5: STT→MT and MT→TTS both "block").
    let _ = output.send(translation).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStream, ScriptedTranslatorClient};

    fn transcript(sequence: u64, text: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            language: "es-ES".to_string(),
            confidence: 0.9,
            word_timings: None,
            sequence,
            origin_timestamp: Instant::now(),
            processing_latency_ms: 100,
        }
    }

    #[tokio::test]
    async fn growing_prefix_ends_with_one_final_record() {
        let client = Arc::new(ScriptedTranslatorClient::new());
        client.push_stream(Ok(MockStream::from_words(&["hello", "how", "are", "you"])));

        let (tx, mut rx) = mpsc::channel(16);
        let request = TranslateRequest {
            system_prompt: "translate".to_string(),
            user_text: "hola como estas".to_string(),
            temperature: 0.3,
            max_tokens: 256,
        };
        let t = transcript(0, "hola como estas");
        let deadline = Instant::now() + Duration::from_secs(5);

        attempt_stream(&(client.clone() as Arc<dyn TranslatorClient>), &request, &t, &tx, deadline)
            .await
            .unwrap();
        drop(tx);

        let mut records = Vec::new();
        while let Some(r) = rx.recv().await {
            records.push(r);
        }

        assert!(records.len() >= 1);
        let finals = records.iter().filter(|r| r.is_final).count();
        assert_eq!(finals, 1);
        assert!(records.last().unwrap().is_final);
        assert!(records.last().unwrap().translated_text.contains("hello"));
        assert!(records.last().unwrap().translated_text.contains("you"));

        // Monotonically growing prefix.
        for pair in records.windows(2) {
            assert!(pair[1].translated_text.len() >= pair[0].translated_text.len());
        }
    }

    #[tokio::test]
    async fn retries_on_transport_error_then_succeeds() {
        let client = Arc::new(ScriptedTranslatorClient::new());
        client.push_stream(Err(TranslateError::Transport("reset".to_string())));
        client.push_stream(Ok(MockStream::from_words(&["hello"])));

        let (tx, mut rx) = mpsc::channel(16);
        let config = TranslatorConfig::default();
        let t = transcript(1, "hola");

        process_transcript(&(client.clone() as Arc<dyn TranslatorClient>), &config, &t, &tx, &{
            let (health_tx, _rx) = voicebridge_telemetry::health::health_channel();
            health_tx
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(client.call_count(), 2);
        let mut saw_final = false;
        while let Some(r) = rx.recv().await {
            if r.is_final {
                saw_final = true;
            }
        }
        assert!(saw_final);
    }
}
