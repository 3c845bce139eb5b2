//! TTS stage task (spec.md §4.5): one subsession per utterance, 4-tier
//! fallback chain on failure.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, warn};

use voicebridge_audio::synth_chunk::{SynthChunk, OUTPUT_SAMPLE_RATE_HZ};
use voicebridge_foundation::backoff::{Backoff, BackoffParams};
use voicebridge_foundation::config::SynthesizerConfig;
use voicebridge_foundation::error::TtsError;
use voicebridge_foundation::CancelSignal;
use voicebridge_telemetry::health::{HealthEvent, HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;
use voicebridge_translate::Translation;

use crate::client::{SynthesizerClient, SynthesizerSession, SynthesizerSessionParams};

/// Roughly how many characters a synthesizer speaks per second; used only
/// to size the silence chunk emitted by fallback tier 4.
const ESTIMATED_CHARS_PER_SECOND: f64 = 15.0;
const MIN_SILENCE_MS: u64 = 200;

struct ActiveSession {
    sequence: u64,
    session: Box<dyn SynthesizerSession>,
    sent_text: String,
}

pub async fn run_tts_stage(
    primary: Arc<dyn SynthesizerClient>,
    alternate: Arc<dyn SynthesizerClient>,
    config: SynthesizerConfig,
    voice_id: String,
    mut input: mpsc::Receiver<Translation>,
    output: mpsc::Sender<SynthChunk>,
    metrics: PipelineMetrics,
    health: HealthSender,
    cancel: CancelSignal,
) {
    let mut active: Option<ActiveSession> = None;
    // Set once a sequence has been terminated early by a fallback tier, so
    // later growing-prefix records for the same sequence are ignored until
    // its `final` record (or a new sequence) arrives.
    let mut skip_until: Option<u64> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            maybe_translation = input.recv() => {
                let Some(translation) = maybe_translation else { break };
                metrics.set_queue_depth(Stage::Tts, input.len());

                let started = Instant::now();
                handle_translation(
                    &primary,
                    &alternate,
                    &config,
                    &voice_id,
                    &mut active,
                    &mut skip_until,
                    translation,
                    &output,
                    &health,
                )
                .await;
                metrics.increment_processed(Stage::Tts);
                metrics.record_latency(Stage::Tts, started.elapsed());
            }
        }
    }

    info!("TTS stage stopped");
}

async fn handle_translation(
    primary: &Arc<dyn SynthesizerClient>,
    alternate: &Arc<dyn SynthesizerClient>,
    config: &SynthesizerConfig,
    voice_id: &str,
    active: &mut Option<ActiveSession>,
    skip_until: &mut Option<u64>,
    translation: Translation,
    output: &mpsc::Sender<SynthChunk>,
    health: &HealthSender,
) {
    if let Some(skip_seq) = *skip_until {
        if skip_seq == translation.sequence {
            if translation.is_final {
                *skip_until = None;
            }
            return;
        }
        *skip_until = None;
    }

    if active.as_ref().map(|a| a.sequence) != Some(translation.sequence) {
        *active = None;
        match open_with_fallback(primary, alternate, config, voice_id, &translation, health).await {
            OpenOutcome::Session(session) => {
                *active = Some(ActiveSession {
                    sequence: translation.sequence,
                    session,
                    sent_text: String::new(),
                });
            }
            OpenOutcome::Completed(samples) => {
                let chunk = silence_or_samples_chunk(samples, &translation);
                let _ = output.send(chunk).await;
                if !translation.is_final {
                    *skip_until = Some(translation.sequence);
                }
                return;
            }
        }
    }

    let session_state = active.as_mut().expect("just opened or matched above");
    let suffix = translation.translated_text[session_state.sent_text.len()..].to_string();
    session_state.sent_text = translation.translated_text.clone();

    if let Err(e) = session_state.session.send_text(&suffix).await {
        warn!(sequence = translation.sequence, error = %e, "tts send_text failed, recovering");
        *active = None;
        let samples = recover(primary, alternate, config, voice_id, &translation, health).await;
        let chunk = silence_or_samples_chunk(samples, &translation);
        let _ = output.send(chunk).await;
        if !translation.is_final {
            *skip_until = Some(translation.sequence);
        }
        return;
    }

    if !translation.is_final {
        return;
    }

    if let Err(e) = session_state.session.end_stream().await {
        warn!(sequence = translation.sequence, error = %e, "tts end_stream failed, recovering");
        *active = None;
        let samples = recover(primary, alternate, config, voice_id, &translation, health).await;
        let chunk = silence_or_samples_chunk(samples, &translation);
        let _ = output.send(chunk).await;
        return;
    }

    match drain_all(session_state.session.as_mut()).await {
        Ok(raw_chunks) => forward(raw_chunks, &translation, output).await,
        Err(e) => {
            warn!(sequence = translation.sequence, error = %e, "tts drain failed, recovering");
            let samples = recover(primary, alternate, config, voice_id, &translation, health).await;
            let chunk = silence_or_samples_chunk(samples, &translation);
            let _ = output.send(chunk).await;
        }
    }
    *active = None;
}

enum OpenOutcome {
    Session(Box<dyn SynthesizerSession>),
    /// One of the non-streaming fallback tiers already produced the full
    /// utterance's audio (or silence); nothing more follows for this
    /// sequence until the next one starts.
    Completed(Vec<i16>),
}

async fn open_with_fallback(
    primary: &Arc<dyn SynthesizerClient>,
    alternate: &Arc<dyn SynthesizerClient>,
    config: &SynthesizerConfig,
    voice_id: &str,
    translation: &Translation,
    health: &HealthSender,
) -> OpenOutcome {
    let params = primary_params(config, voice_id);

    let mut backoff = Backoff::new(BackoffParams::tts_stream_retry());
    loop {
        match primary.open_subsession(params.clone()).await {
            Ok(session) => return OpenOutcome::Session(session),
            Err(e) => match backoff.next() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    warn!(error = %e, "tts streaming open exhausted, falling back");
                    break;
                }
            },
        }
    }

    OpenOutcome::Completed(recover(primary, alternate, config, voice_id, translation, health).await)
}

/// Runs fallback tiers 2–4 (spec.md §4.5): one-shot same-vendor request,
/// alternate synthesizer with a non-cloned voice, then silence.
async fn recover(
    primary: &Arc<dyn SynthesizerClient>,
    alternate: &Arc<dyn SynthesizerClient>,
    config: &SynthesizerConfig,
    voice_id: &str,
    translation: &Translation,
    health: &HealthSender,
) -> Vec<i16> {
    let params = primary_params(config, voice_id);
    if let Ok(samples) = primary.synthesize_once(&translation.translated_text, params).await {
        let _ = health
            .send(HealthEvent::FallbackEngaged {
                stage: Stage::Tts,
                detail: "one-shot non-streaming request".to_string(),
            })
            .await;
        return samples;
    }

    let alt_params = alternate_params(config);
    if let Ok(samples) = alternate
        .synthesize_once(&translation.translated_text, alt_params)
        .await
    {
        let _ = health
            .send(HealthEvent::FallbackEngaged {
                stage: Stage::Tts,
                detail: "alternate synthesizer, non-cloned voice".to_string(),
            })
            .await;
        return samples;
    }

    let _ = health
        .send(HealthEvent::FatalError {
            stage: Stage::Tts,
            kind: voicebridge_foundation::ErrorKind::Transport,
            message: "all synthesis tiers exhausted, emitting silence".to_string(),
        })
        .await;
    vec![0i16; silence_sample_count(&translation.translated_text)]
}

fn primary_params(config: &SynthesizerConfig, voice_id: &str) -> SynthesizerSessionParams {
    SynthesizerSessionParams {
        voice_id: Some(voice_id.to_string()),
        stability: config.stability,
        similarity: config.similarity,
        style: config.style,
        latency_preset: config.latency_preset,
    }
}

fn alternate_params(config: &SynthesizerConfig) -> SynthesizerSessionParams {
    SynthesizerSessionParams {
        voice_id: None,
        stability: config.stability,
        similarity: config.similarity,
        style: config.style,
        latency_preset: config.latency_preset,
    }
}

fn silence_sample_count(text: &str) -> usize {
    let estimated_ms =
        ((text.chars().count() as f64 / ESTIMATED_CHARS_PER_SECOND) * 1000.0) as u64;
    let duration_ms = estimated_ms.max(MIN_SILENCE_MS);
    (OUTPUT_SAMPLE_RATE_HZ as u64 * duration_ms / 1000) as usize
}

async fn drain_all(session: &mut dyn SynthesizerSession) -> Result<Vec<Vec<i16>>, TtsError> {
    let mut chunks = Vec::new();
    while let Some(chunk) = session.next_chunk().await? {
        chunks.push(chunk.samples);
    }
    Ok(chunks)
}

async fn forward(raw_chunks: Vec<Vec<i16>>, translation: &Translation, output: &mpsc::Sender<SynthChunk>) {
    if raw_chunks.is_empty() {
        let chunk = silence_or_samples_chunk(Vec::new(), translation);
        let _ = output.send(chunk).await;
        return;
    }
    let last = raw_chunks.len() - 1;
    for (i, samples) in raw_chunks.into_iter().enumerate() {
        let chunk = SynthChunk {
            samples,
            sequence: translation.sequence,
            is_final: i == last,
            origin_timestamp: translation.origin_timestamp,
            cumulative_latency_ms: translation.origin_timestamp.elapsed().as_millis() as u64,
        };
        let _ = output.send(chunk).await;
    }
}

fn silence_or_samples_chunk(samples: Vec<i16>, translation: &Translation) -> SynthChunk {
    let samples = if samples.is_empty() {
        vec![0i16; silence_sample_count(&translation.translated_text)]
    } else {
        samples
    };
    SynthChunk {
        samples,
        sequence: translation.sequence,
        is_final: true,
        origin_timestamp: translation.origin_timestamp,
        cumulative_latency_ms: translation.origin_timestamp.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSession, ScriptedSynthesizerClient};

    fn translation(sequence: u64, text: &str, is_final: bool) -> Translation {
        Translation {
            original_text: "hola".to_string(),
            translated_text: text.to_string(),
            sequence,
            origin_timestamp: Instant::now(),
            translation_latency_ms: 10,
            is_final,
        }
    }

    #[tokio::test]
    async fn streaming_happy_path_marks_last_chunk_final() {
        let primary = Arc::new(ScriptedSynthesizerClient::new());
        primary.push_session(Ok(MockSession::boxed(vec![vec![1, 2, 3], vec![4, 5, 6]])));
        let alternate = Arc::new(ScriptedSynthesizerClient::new());

        let (tx, mut rx) = mpsc::channel(16);
        let config = SynthesizerConfig::default();
        let (health_tx, _rx) = voicebridge_telemetry::health::health_channel();

        let mut active = None;
        let mut skip = None;
        handle_translation(
            &(primary.clone() as Arc<dyn SynthesizerClient>),
            &(alternate.clone() as Arc<dyn SynthesizerClient>),
            &config,
            "voice-1",
            &mut active,
            &mut skip,
            translation(0, "hello", true),
            &tx,
            &health_tx,
        )
        .await;
        drop(tx);

        let mut chunks = Vec::new();
        while let Some(c) = rx.recv().await {
            chunks.push(c);
        }
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].is_final);
        assert!(chunks[1].is_final);
        assert!(chunks.iter().all(|c| c.sequence == 0));
    }

    #[tokio::test]
    async fn growing_prefix_sends_only_appended_suffix() {
        let primary = Arc::new(ScriptedSynthesizerClient::new());
        primary.push_session(Ok(MockSession::boxed(vec![vec![1]])));
        let alternate = Arc::new(ScriptedSynthesizerClient::new());

        let (tx, mut rx) = mpsc::channel(16);
        let config = SynthesizerConfig::default();
        let (health_tx, _rx) = voicebridge_telemetry::health::health_channel();

        let mut active = None;
        let mut skip = None;

        handle_translation(
            &(primary.clone() as Arc<dyn SynthesizerClient>),
            &(alternate.clone() as Arc<dyn SynthesizerClient>),
            &config,
            "voice-1",
            &mut active,
            &mut skip,
            translation(0, "hello ", false),
            &tx,
            &health_tx,
        )
        .await;
        assert_eq!(primary.open_count(), 1);

        handle_translation(
            &(primary.clone() as Arc<dyn SynthesizerClient>),
            &(alternate.clone() as Arc<dyn SynthesizerClient>),
            &config,
            "voice-1",
            &mut active,
            &mut skip,
            translation(0, "hello world", true),
            &tx,
            &health_tx,
        )
        .await;
        // Still a single subsession opened for the whole sequence.
        assert_eq!(primary.open_count(), 1);
        drop(tx);

        let mut chunks = Vec::new();
        while let Some(c) = rx.recv().await {
            chunks.push(c);
        }
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_final);
    }

    #[tokio::test]
    async fn all_tiers_failing_emits_final_silence() {
        let primary = Arc::new(ScriptedSynthesizerClient::new());
        primary.push_session(Err(TtsError::Transport("down".to_string())));
        primary.push_session(Err(TtsError::Transport("down".to_string())));
        primary.push_session(Err(TtsError::Transport("down".to_string())));
        primary.push_one_shot(Err(TtsError::Transport("down".to_string())));
        let alternate = Arc::new(ScriptedSynthesizerClient::new());
        alternate.push_one_shot(Err(TtsError::Transport("down".to_string())));

        let (tx, mut rx) = mpsc::channel(16);
        let config = SynthesizerConfig::default();
        let (health_tx, mut health_rx) = voicebridge_telemetry::health::health_channel();

        let mut active = None;
        let mut skip = None;
        handle_translation(
            &(primary.clone() as Arc<dyn SynthesizerClient>),
            &(alternate.clone() as Arc<dyn SynthesizerClient>),
            &config,
            "voice-1",
            &mut active,
            &mut skip,
            translation(7, "hello there", true),
            &tx,
            &health_tx,
        )
        .await;
        drop(tx);
        drop(health_tx);

        let chunk = rx.recv().await.expect("silence chunk");
        assert!(chunk.is_final);
        assert_eq!(chunk.sequence, 7);
        assert!(chunk.samples.iter().all(|&s| s == 0));
        assert!(!chunk.samples.is_empty());

        let mut saw_fatal = false;
        while let Some(event) = health_rx.recv().await {
            if matches!(event, HealthEvent::FatalError { stage: Stage::Tts, .. }) {
                saw_fatal = true;
            }
        }
        assert!(saw_fatal);
    }

    #[tokio::test]
    async fn mid_stream_failure_recovers_with_one_shot() {
        let primary = Arc::new(ScriptedSynthesizerClient::new());
        primary.push_session(Ok(MockSession::failing()));
        primary.push_one_shot(Ok(vec![9, 9, 9]));
        let alternate = Arc::new(ScriptedSynthesizerClient::new());

        let (tx, mut rx) = mpsc::channel(16);
        let config = SynthesizerConfig::default();
        let (health_tx, _rx) = voicebridge_telemetry::health::health_channel();

        let mut active = None;
        let mut skip = None;
        handle_translation(
            &(primary.clone() as Arc<dyn SynthesizerClient>),
            &(alternate.clone() as Arc<dyn SynthesizerClient>),
            &config,
            "voice-1",
            &mut active,
            &mut skip,
            translation(2, "hello", true),
            &tx,
            &health_tx,
        )
        .await;
        drop(tx);

        let chunk = rx.recv().await.expect("fallback chunk");
        assert_eq!(chunk.samples, vec![9, 9, 9]);
        assert!(chunk.is_final);
    }
}
