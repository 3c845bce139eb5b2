//! STT stage task (spec.md §4.3).
//!
//! Owns a single persistent `RecognizerSession` across Utterances,
//! reconnecting with backoff on transport errors and re-sending at most
//! once (spec.md §4.3 "Connection discipline"). Input is the blocking
//! VAD→STT channel; output is the blocking STT→Translator channel — both
//! "block" policy per spec.md §5, so this stage never drops an Utterance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voicebridge_foundation::backoff::{Backoff, BackoffParams};
use voicebridge_foundation::config::RecognizerConfig;
use voicebridge_foundation::error::{ErrorKind, SttError};
use voicebridge_foundation::CancelSignal;
use voicebridge_telemetry::health::{HealthEvent, HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;
use voicebridge_vad::Utterance;

use crate::client::{RecognizerClient, RecognizerEvent, RecognizerSession, RecognizerSessionParams};
use crate::reconcile::InterimReconciler;
use crate::types::{normalize_whitespace, Transcript, WordTiming};

const STABILIZE_AFTER: Duration = Duration::from_millis(500);
const UTTERANCE_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_IDLE: Duration = Duration::from_secs(10);

pub async fn run_stt_stage(
    client: Arc<dyn RecognizerClient>,
    config: RecognizerConfig,
    mut input: mpsc::Receiver<Utterance>,
    output: mpsc::Sender<Transcript>,
    metrics: PipelineMetrics,
    health: HealthSender,
    cancel: CancelSignal,
) {
    let mut session: Option<Box<dyn RecognizerSession>> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Some(mut s) = session.take() {
                    let _ = s.close().await;
                }
                break;
            }
            _ = tokio::time::sleep(KEEPALIVE_IDLE), if session.is_some() => {
                if let Some(s) = session.as_mut() {
                    if s.keepalive().await.is_err() {
                        warn!("stt keepalive failed; will reconnect on next utterance");
                        session = None;
                    }
                }
            }
            maybe_utterance = input.recv() => {
                let Some(utterance) = maybe_utterance else { break };
                metrics.set_queue_depth(Stage::Stt, input.len());

                match process_utterance(&client, &config, &mut session, &utterance, &metrics, &health).await {
                    Ok(Some(transcript)) => {
                        metrics.increment_processed(Stage::Stt);
                        metrics.record_latency(Stage::Stt, Duration::from_millis(transcript.processing_latency_ms));
                        if output.send(transcript).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(sequence = utterance.sequence, "transcript already forwarded as stabilized interim");
                    }
                    Err(e) => {
                        metrics.increment_error(Stage::Stt);
                        let kind = e.kind();
                        warn!(sequence = utterance.sequence, error = %e, "stt failed for utterance");
                        let _ = health.send(HealthEvent::FatalError {
                            stage: Stage::Stt,
                            kind,
                            message: e.to_string(),
                        }).await;
                        if kind == ErrorKind::Semantic {
                            break;
                        }
                    }
                }
            }
        }
    }

    info!("STT stage stopped");
}

async fn process_utterance(
    client: &Arc<dyn RecognizerClient>,
    config: &RecognizerConfig,
    session: &mut Option<Box<dyn RecognizerSession>>,
    utterance: &Utterance,
    metrics: &PipelineMetrics,
    health: &HealthSender,
) -> Result<Option<Transcript>, SttError> {
    let deadline = utterance.start_timestamp + UTTERANCE_TIMEOUT;
    let pcm = utterance.pcm_bytes();
    let mut already_resent = false;

    loop {
        if session.is_none() {
            *session = Some(ensure_connected(client, config, health).await?);
        }

        let result = {
            let s = session.as_mut().expect("session populated above");
            send_and_collect(s.as_mut(), &pcm, utterance, deadline, config, health).await
        };

        match result {
            Ok(transcript) => return Ok(transcript),
            Err(SttError::Transport(msg)) if !already_resent => {
                warn!(sequence = utterance.sequence, error = %msg, "stt transport error mid-utterance; reconnecting");
                metrics.increment_error(Stage::Stt);
                *session = None;
                already_resent = true;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn ensure_connected(
    client: &Arc<dyn RecognizerClient>,
    config: &RecognizerConfig,
    health: &HealthSender,
) -> Result<Box<dyn RecognizerSession>, SttError> {
    let params = RecognizerSessionParams {
        language_code: config.language_code.clone(),
        sample_rate_hz: voicebridge_vad::types::INPUT_SAMPLE_RATE_HZ,
        encoding: "pcm_s16le".to_string(),
        endpointing_ms: config.endpointing_ms,
        interim_results: true,
    };

    let mut backoff = Backoff::new(BackoffParams::stt_default());
    let mut last_err = None;

    loop {
        match client.open(params.clone()).await {
            Ok(session) => return Ok(session),
            Err(SttError::AuthenticationFailed(msg)) => {
                let _ = health
                    .send(HealthEvent::FatalError {
                        stage: Stage::Stt,
                        kind: ErrorKind::Semantic,
                        message: msg.clone(),
                    })
                    .await;
                return Err(SttError::AuthenticationFailed(msg));
            }
            Err(e) => {
                last_err = Some(e);
                match backoff.next() {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => {
                        let message = last_err.map(|e| e.to_string()).unwrap_or_default();
                        let _ = health
                            .send(HealthEvent::FatalError {
                                stage: Stage::Stt,
                                kind: ErrorKind::Transport,
                                message: message.clone(),
                            })
                            .await;
                        return Err(SttError::Transport(message));
                    }
                }
            }
        }
    }
}

async fn send_and_collect(
    session: &mut dyn RecognizerSession,
    pcm: &[u8],
    utterance: &Utterance,
    deadline: Instant,
    config: &RecognizerConfig,
    health: &HealthSender,
) -> Result<Option<Transcript>, SttError> {
    session.send_audio(pcm).await?;
    session.end_utterance().await?;

    let mut reconciler = InterimReconciler::new(STABILIZE_AFTER, Instant::now());

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SttError::Timeout(UTTERANCE_TIMEOUT));
        }

        let event = match tokio::time::timeout(remaining, session.recv()).await {
            Ok(Ok(Some(event))) => event,
            Ok(Ok(None)) => return Err(SttError::Transport("recognizer closed connection".to_string())),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(SttError::Timeout(UTTERANCE_TIMEOUT)),
        };

        match event {
            RecognizerEvent::Interim { text, confidence } => {
                if let Some(stabilized) = reconciler.observe_interim(&text, Instant::now()) {
                    return Ok(Some(build_transcript(stabilized, confidence, None, utterance, config)));
                }
            }
            RecognizerEvent::Final { text, confidence, word_timings } => {
                let normalized = normalize_whitespace(&text);
                if let Some(already) = reconciler.already_forwarded() {
                    if already != normalized && !normalized.is_empty() {
                        let _ = health
                            .send(HealthEvent::Correction {
                                sequence: utterance.sequence,
                                stabilized_text: already.to_string(),
                                final_text: normalized,
                            })
                            .await;
                    }
                    return Ok(None);
                }
                if normalized.is_empty() {
                    continue;
                }
                return Ok(Some(build_transcript(normalized, confidence, word_timings, utterance, config)));
            }
        }
    }
}

fn build_transcript(
    text: String,
    confidence: f32,
    word_timings: Option<Vec<WordTiming>>,
    utterance: &Utterance,
    config: &RecognizerConfig,
) -> Transcript {
    Transcript {
        text,
        language: config.language_code.clone(),
        confidence,
        word_timings,
        sequence: utterance.sequence,
        origin_timestamp: utterance.start_timestamp,
        processing_latency_ms: utterance.end_timestamp.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSession, ScriptedRecognizerClient};
    use voicebridge_telemetry::health::health_channel;
    use voicebridge_telemetry::PipelineMetrics;

    fn config() -> RecognizerConfig {
        RecognizerConfig::default()
    }

    fn utterance(sequence: u64) -> Utterance {
        Utterance {
            samples: vec![0i16; 8000],
            start_timestamp: Instant::now(),
            end_timestamp: Instant::now(),
            average_speech_probability: 0.8,
            partial: false,
            sequence,
        }
    }

    #[tokio::test]
    async fn final_only_stream_yields_one_transcript() {
        let client = Arc::new(ScriptedRecognizerClient::new());
        client.push_session(Ok(MockSession::boxed(vec![Ok(RecognizerEvent::Final {
            text: "hola como estas".to_string(),
            confidence: 0.95,
            word_timings: None,
        })])));

        let (health_tx, mut health_rx) = health_channel();
        let mut session = None;
        let metrics = PipelineMetrics::new();
        let transcript = process_utterance(&(client.clone() as Arc<dyn RecognizerClient>), &config(), &mut session, &utterance(0), &metrics, &health_tx)
            .await
            .unwrap()
            .expect("expected a transcript");

        assert_eq!(transcript.text, "hola como estas");
        assert_eq!(client.open_count(), 1);
        drop(health_tx);
        assert!(health_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_triggers_resend_on_fresh_session() {
        let client = Arc::new(ScriptedRecognizerClient::new());
        client.push_session(Ok(MockSession::boxed(vec![Err(SttError::Transport(
            "connection reset".to_string(),
        ))])));
        client.push_session(Ok(MockSession::boxed(vec![Ok(RecognizerEvent::Final {
            text: "hola".to_string(),
            confidence: 0.9,
            word_timings: None,
        })])));

        let (health_tx, _health_rx) = health_channel();
        let mut session = None;
        let metrics = PipelineMetrics::new();
        let transcript = process_utterance(&(client.clone() as Arc<dyn RecognizerClient>), &config(), &mut session, &utterance(1), &metrics, &health_tx)
            .await
            .unwrap()
            .expect("expected a transcript after reconnect");

        assert_eq!(transcript.text, "hola");
        assert_eq!(client.open_count(), 2);
    }

    #[tokio::test]
    async fn empty_final_after_discardable_interims_is_skipped() {
        let client = Arc::new(ScriptedRecognizerClient::new());
        client.push_session(Ok(MockSession::boxed(vec![
            Ok(RecognizerEvent::Interim { text: "...".to_string(), confidence: 0.1 }),
            Ok(RecognizerEvent::Final {
                text: "bien gracias".to_string(),
                confidence: 0.92,
                word_timings: None,
            }),
        ])));

        let (health_tx, _health_rx) = health_channel();
        let mut session = None;
        let metrics = PipelineMetrics::new();
        let transcript = process_utterance(&(client.clone() as Arc<dyn RecognizerClient>), &config(), &mut session, &utterance(3), &metrics, &health_tx)
            .await
            .unwrap()
            .expect("final transcript should still be forwarded");

        assert_eq!(transcript.text, "bien gracias");
    }
}
