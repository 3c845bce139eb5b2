//! Orchestrator (spec.md §4.7): wires every stage, owns their lifecycles,
//! and supervises pipeline mode.
//!
//! Shaped after the teacher's `app::runtime::{AppRuntimeOptions, AppHandle}`
//! split: a builder that takes injectable collaborators (here, the three
//! remote-service clients and the speech detector, since constructing them
//! from credentials is out of scope per spec.md §1) and a handle holding
//! every stage's `JoinHandle` plus the two device streams. Unlike the
//! teacher, wiring is entirely fixed at `build()` time — spec.md §9 "single
//! builder, no later mutation of wiring".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voicebridge_audio::channel::{drop_oldest_channel, DropOldestSender};
use voicebridge_audio::frame::AudioFrame;
use voicebridge_audio::synth_chunk::SynthChunk;
use voicebridge_audio::{
    start_capture, start_output, CaptureConfig, CaptureStage, OutputConfig, OutputStage,
};
use voicebridge_foundation::error::VoiceBridgeError;
use voicebridge_foundation::mode::{
    mode_for_fatal_error, DegradedReason, ModeManager, PassthroughReason, PipelineMode,
};
use voicebridge_foundation::{CancelSignal, VoiceBridgeConfig};
use voicebridge_stt::{RecognizerClient, Transcript};
use voicebridge_telemetry::health::{health_channel, HealthEvent, HealthReceiver, Stage};
use voicebridge_telemetry::PipelineMetrics;
use voicebridge_translate::{Translation, TranslatorClient};
use voicebridge_tts::SynthesizerClient;
use voicebridge_vad::{EnergyDetector, SpeechDetector};

use crate::router::run_passthrough_router;
use crate::session_log::{template_path, SessionLog, SessionLogRecord};

/// Capacity of the drop-oldest hops (spec.md §5: Capture→VAD and TTS→Output,
/// "drop oldest", roughly 1.5s of audio at 30ms frames / 50 chunks).
const DROP_OLDEST_CAPACITY: usize = 50;
/// Capacity of the blocking hops (VAD→STT, STT→Translator, Translator→TTS).
const BLOCKING_CHANNEL_CAPACITY: usize = 10;
const PASSTHROUGH_PROBE_INTERVAL: Duration = Duration::from_secs(30);

pub struct OrchestratorBuilder {
    config: VoiceBridgeConfig,
    recognizer: Option<Arc<dyn RecognizerClient>>,
    translator: Option<Arc<dyn TranslatorClient>>,
    synthesizer_primary: Option<Arc<dyn SynthesizerClient>>,
    synthesizer_alternate: Option<Arc<dyn SynthesizerClient>>,
    vad_detector: Option<Box<dyn SpeechDetector>>,
}

impl OrchestratorBuilder {
    pub fn new(config: VoiceBridgeConfig) -> Self {
        Self {
            config,
            recognizer: None,
            translator: None,
            synthesizer_primary: None,
            synthesizer_alternate: None,
            vad_detector: None,
        }
    }

    pub fn with_recognizer(mut self, client: Arc<dyn RecognizerClient>) -> Self {
        self.recognizer = Some(client);
        self
    }

    pub fn with_translator(mut self, client: Arc<dyn TranslatorClient>) -> Self {
        self.translator = Some(client);
        self
    }

    /// `primary` is the cloned-voice synthesizer; `alternate` is the
    /// non-cloned-voice fallback used by TTS fallback tier 3 (spec.md §4.5).
    pub fn with_synthesizers(
        mut self,
        primary: Arc<dyn SynthesizerClient>,
        alternate: Arc<dyn SynthesizerClient>,
    ) -> Self {
        self.synthesizer_primary = Some(primary);
        self.synthesizer_alternate = Some(alternate);
        self
    }

    pub fn with_vad_detector(mut self, detector: Box<dyn SpeechDetector>) -> Self {
        self.vad_detector = Some(detector);
        self
    }

    /// Wires and starts every stage. Returns a running `Orchestrator`;
    /// there is no later step to attach or replace a collaborator.
    pub async fn build(self) -> Result<Orchestrator, VoiceBridgeError> {
        let recognizer = self
            .recognizer
            .ok_or_else(|| VoiceBridgeError::Fatal("no recognizer client configured".to_string()))?;
        let translator = self
            .translator
            .ok_or_else(|| VoiceBridgeError::Fatal("no translator client configured".to_string()))?;
        let synthesizer_primary = self.synthesizer_primary.ok_or_else(|| {
            VoiceBridgeError::Fatal("no primary synthesizer client configured".to_string())
        })?;
        let synthesizer_alternate = self.synthesizer_alternate.ok_or_else(|| {
            VoiceBridgeError::Fatal("no alternate synthesizer client configured".to_string())
        })?;
        let vad_detector: Box<dyn SpeechDetector> = self
            .vad_detector
            .unwrap_or_else(|| Box::new(EnergyDetector::default()));

        let config = self.config;
        let metrics = PipelineMetrics::new();
        let mode = Arc::new(ModeManager::new());
        let cancel = CancelSignal::new();
        let (health_tx, health_rx) = health_channel();

        let started_at = Instant::now();
        let session_log_path = config
            .pipeline
            .session_log_path
            .as_deref()
            .map(|pattern| template_path(pattern, chrono::Utc::now()));
        let session_log = Arc::new(match session_log_path.as_deref() {
            Some(path) => SessionLog::open(Some(path))?,
            None => SessionLog::disabled(),
        });

        if config.pipeline.passthrough_forced {
            mode.transition(PipelineMode::Passthrough(PassthroughReason::Forced))
                .ok();
        }

        // Channel topology (spec.md §5). Every blocking hop is doubled: the
        // stage's own output feeds a small tap task that records session-log
        // bookkeeping and forwards unchanged, so no stage needs to know the
        // log exists.
        let (capture_tx, capture_rx) = drop_oldest_channel::<AudioFrame>(DROP_OLDEST_CAPACITY);
        let (router_to_vad_tx, router_to_vad_rx) = drop_oldest_channel::<AudioFrame>(DROP_OLDEST_CAPACITY);
        let (synth_output_tx, synth_output_rx) = drop_oldest_channel::<SynthChunk>(DROP_OLDEST_CAPACITY);

        let (vad_to_stt_tx, vad_to_stt_rx) = mpsc::channel::<voicebridge_vad::Utterance>(BLOCKING_CHANNEL_CAPACITY);
        let (stt_out_tx, stt_out_rx) = mpsc::channel::<Transcript>(BLOCKING_CHANNEL_CAPACITY);
        let (stt_to_translate_tx, stt_to_translate_rx) = mpsc::channel::<Transcript>(BLOCKING_CHANNEL_CAPACITY);
        let (translate_out_tx, translate_out_rx) = mpsc::channel::<Translation>(BLOCKING_CHANNEL_CAPACITY);
        let (translate_to_tts_tx, translate_to_tts_rx) = mpsc::channel::<Translation>(BLOCKING_CHANNEL_CAPACITY);
        let (tts_internal_tx, tts_internal_rx) = mpsc::channel::<SynthChunk>(BLOCKING_CHANNEL_CAPACITY);

        // Start outside-in so nothing produces into a channel before its
        // consumer exists (Output, then the remote-service stages, then
        // local audio). Mirrors the teacher's capture-last bring-up order.
        let output_stage = start_output(
            OutputConfig {
                device_id: config.audio.output_device_id.clone(),
                silent: matches!(config.output_mode, voicebridge_foundation::config::OutputMode::Silent),
                ..Default::default()
            },
            synth_output_rx,
            metrics.clone(),
            health_tx.clone(),
        )
        .await?;

        let tap_state: Arc<SyncMutex<HashMap<u64, PartialRecord>>> =
            Arc::new(SyncMutex::new(HashMap::new()));

        let tts_bridge_handle = tokio::spawn(bridge_tts_output(
            tts_internal_rx,
            synth_output_tx.clone(),
            tap_state.clone(),
            session_log.clone(),
            metrics.clone(),
        ));

        let tts_handle = tokio::spawn(voicebridge_tts::run_tts_stage(
            synthesizer_primary,
            synthesizer_alternate,
            config.synthesizer.clone(),
            config.voice_id.clone(),
            translate_to_tts_rx,
            tts_internal_tx,
            metrics.clone(),
            health_tx.clone(),
            cancel.clone(),
        ));

        let translate_tap_handle = tokio::spawn(tap_translate(
            translate_out_rx,
            translate_to_tts_tx,
            tap_state.clone(),
        ));
        let translate_handle = tokio::spawn(voicebridge_translate::run_translate_stage(
            translator,
            config.translator.clone(),
            stt_to_translate_rx,
            translate_out_tx,
            metrics.clone(),
            health_tx.clone(),
            cancel.clone(),
        ));

        let stt_tap_handle = tokio::spawn(tap_stt(
            stt_out_rx,
            stt_to_translate_tx,
            tap_state.clone(),
            started_at,
        ));
        let stt_handle = tokio::spawn(voicebridge_stt::run_stt_stage(
            recognizer,
            config.recognizer.clone(),
            vad_to_stt_rx,
            stt_out_tx,
            metrics.clone(),
            health_tx.clone(),
            cancel.clone(),
        ));

        let vad_handle = tokio::spawn(voicebridge_vad::run_vad_stage(
            config.vad.clone(),
            vad_detector,
            router_to_vad_rx,
            vad_to_stt_tx,
            metrics.clone(),
            health_tx.clone(),
            cancel.clone(),
        ));

        let router_handle = tokio::spawn(run_passthrough_router(
            capture_rx,
            router_to_vad_tx,
            synth_output_tx.clone(),
            mode.clone(),
            metrics.clone(),
            cancel.clone(),
        ));

        let capture_stage = start_capture(
            CaptureConfig {
                device_id: config.audio.input_device_id.clone(),
                input_gain: config.audio.input_gain,
            },
            capture_tx.clone(),
            metrics.clone(),
            health_tx.clone(),
        )
        .await?;

        let supervisor_handle = tokio::spawn(run_supervisor(
            health_rx,
            mode.clone(),
            metrics.clone(),
            Duration::from_secs(config.pipeline.metrics_interval_s as u64),
            cancel.clone(),
        ));

        Ok(Orchestrator {
            metrics,
            mode,
            cancel,
            capture_stage: Some(capture_stage),
            output_stage: Some(output_stage),
            capture_tx,
            synth_output_tx,
            router_handle,
            vad_handle,
            stt_handle,
            stt_tap_handle,
            translate_handle,
            translate_tap_handle,
            tts_handle,
            tts_bridge_handle,
            supervisor_handle,
        })
    }
}

pub struct Orchestrator {
    pub metrics: PipelineMetrics,
    pub mode: Arc<ModeManager>,
    cancel: CancelSignal,
    capture_stage: Option<CaptureStage>,
    output_stage: Option<OutputStage>,
    capture_tx: DropOldestSender<AudioFrame>,
    synth_output_tx: DropOldestSender<SynthChunk>,
    router_handle: JoinHandle<()>,
    vad_handle: JoinHandle<()>,
    stt_handle: JoinHandle<()>,
    stt_tap_handle: JoinHandle<()>,
    translate_handle: JoinHandle<()>,
    translate_tap_handle: JoinHandle<()>,
    tts_handle: JoinHandle<()>,
    tts_bridge_handle: JoinHandle<()>,
    supervisor_handle: JoinHandle<()>,
}

impl Orchestrator {
    /// Forces passthrough regardless of mode history; used for the
    /// operator-triggered "mute the interpreter" case (spec.md §6).
    pub fn force_passthrough(&self) {
        let _ = self
            .mode
            .transition(PipelineMode::Passthrough(PassthroughReason::Forced));
    }

    pub fn current_mode(&self) -> PipelineMode {
        self.mode.current()
    }

    /// Cancels every stage, closes the two drop-oldest hops explicitly
    /// (their senders never self-close, spec.md §5), then tears down the
    /// two audio device streams. Cascades through the blocking `mpsc` hops
    /// for free: each stage drops its owned sender when its task returns,
    /// closing the next stage's receiver automatically.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        if let Some(stage) = self.capture_stage.take() {
            stage.stop();
        }
        self.capture_tx.close();

        let _ = self.router_handle.await;
        let _ = self.vad_handle.await;
        let _ = self.stt_handle.await;
        let _ = self.stt_tap_handle.await;
        let _ = self.translate_handle.await;
        let _ = self.translate_tap_handle.await;
        let _ = self.tts_handle.await;
        let _ = self.tts_bridge_handle.await;

        self.synth_output_tx.close();
        if let Some(stage) = self.output_stage.take() {
            stage.stop();
        }

        let _ = self.supervisor_handle.await;
        info!("orchestrator shut down");
    }
}

/// Per-utterance bookkeeping accumulated across the STT→Translator and
/// Translator→TTS taps, finalized into a `SessionLogRecord` once the TTS
/// bridge observes the sequence's last chunk (SPEC_FULL.md §6.7).
struct PartialRecord {
    origin_timestamp_ms: u64,
    original_text: String,
    stt_latency_ms: u64,
    translated_text: String,
    translation_latency_ms: u64,
}

async fn tap_stt(
    mut rx: mpsc::Receiver<Transcript>,
    tx: mpsc::Sender<Transcript>,
    state: Arc<SyncMutex<HashMap<u64, PartialRecord>>>,
    session_start: Instant,
) {
    while let Some(transcript) = rx.recv().await {
        state.lock().insert(
            transcript.sequence,
            PartialRecord {
                origin_timestamp_ms: transcript
                    .origin_timestamp
                    .saturating_duration_since(session_start)
                    .as_millis() as u64,
                original_text: transcript.text.clone(),
                stt_latency_ms: transcript.processing_latency_ms,
                translated_text: String::new(),
                translation_latency_ms: 0,
            },
        );
        if tx.send(transcript).await.is_err() {
            break;
        }
    }
}

async fn tap_translate(
    mut rx: mpsc::Receiver<Translation>,
    tx: mpsc::Sender<Translation>,
    state: Arc<SyncMutex<HashMap<u64, PartialRecord>>>,
) {
    while let Some(translation) = rx.recv().await {
        if translation.is_final {
            let mut guard = state.lock();
            let entry = guard.entry(translation.sequence).or_insert_with(|| PartialRecord {
                origin_timestamp_ms: 0,
                original_text: translation.original_text.clone(),
                stt_latency_ms: 0,
                translated_text: String::new(),
                translation_latency_ms: 0,
            });
            entry.translated_text = translation.translated_text.clone();
            entry.translation_latency_ms = translation.translation_latency_ms;
        }
        if tx.send(translation).await.is_err() {
            break;
        }
    }
}

/// Bridges TTS's internal blocking output onto the shared drop-oldest
/// TTS→Output hop, and finalizes the session log record for each sequence's
/// last chunk. Never calls `.close()` on the shared sender — the
/// Orchestrator does that once both producers of that channel (this bridge
/// and the passthrough router) have stopped.
async fn bridge_tts_output(
    mut rx: mpsc::Receiver<SynthChunk>,
    output: DropOldestSender<SynthChunk>,
    state: Arc<SyncMutex<HashMap<u64, PartialRecord>>>,
    session_log: Arc<SessionLog>,
    metrics: PipelineMetrics,
) {
    while let Some(chunk) = rx.recv().await {
        if chunk.is_final {
            if let Some(record) = state.lock().remove(&chunk.sequence) {
                session_log.record(&SessionLogRecord {
                    sequence: chunk.sequence,
                    origin_timestamp_ms: record.origin_timestamp_ms,
                    original_text: record.original_text,
                    translated_text: record.translated_text,
                    stt_latency_ms: record.stt_latency_ms,
                    translation_latency_ms: record.translation_latency_ms,
                    synthesis_latency_ms: chunk.cumulative_latency_ms,
                });
            }
        }
        let dropped = output.push(chunk);
        if dropped > 0 {
            metrics.increment_dropped_output_chunks();
        }
    }
}

/// Drains health events into mode transitions, logs a periodic snapshot,
/// and optimistically attempts Passthrough→Active recovery every 30s.
///
/// spec.md §9 Open Question: whether re-entry should be probe-gated or
/// optimistic. None of the three client traits expose a lightweight health
/// probe, and adding one purely for this would be scope creep beyond
/// spec.md's declared boundaries, so re-entry is optimistic: on the next
/// tick the mode flips back to `Active` and the next real failure
/// re-engages `Passthrough` via the same `FatalError` path.
async fn run_supervisor(
    mut health_rx: HealthReceiver,
    mode: Arc<ModeManager>,
    metrics: PipelineMetrics,
    metrics_interval: Duration,
    cancel: CancelSignal,
) {
    let mut metrics_tick = tokio::time::interval(metrics_interval);
    let mut probe_tick = tokio::time::interval(PASSTHROUGH_PROBE_INTERVAL);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = health_rx.recv() => {
                match event {
                    Some(event) => handle_health_event(event, &mode, &metrics),
                    None => break,
                }
            }
            _ = metrics_tick.tick() => {
                let snapshot = metrics.snapshot();
                info!(?snapshot, mode = ?mode.current(), "pipeline health snapshot");
            }
            _ = probe_tick.tick() => {
                if mode.is_passthrough() {
                    debug!("attempting optimistic passthrough recovery");
                    let _ = mode.transition(PipelineMode::Active);
                }
            }
        }
    }

    info!("supervisor stopped");
}

fn handle_health_event(event: HealthEvent, mode: &Arc<ModeManager>, metrics: &PipelineMetrics) {
    match event {
        HealthEvent::FatalError { stage, kind, message } => {
            warn!(?stage, ?kind, %message, "fatal stage error");
            metrics.increment_error(stage);
            if let Some(next) = mode_for_fatal_error(kind, passthrough_reason_for_stage(stage)) {
                if let Err(e) = mode.transition(next) {
                    debug!(%e, "ignored mode transition");
                }
            }
        }
        HealthEvent::FallbackEngaged { stage, detail } => {
            info!(?stage, %detail, "fallback engaged");
            if let Err(e) = mode.transition(PipelineMode::Degraded(DegradedReason::TtsFallback)) {
                debug!(%e, "ignored mode transition");
            }
        }
        HealthEvent::Recovered { stage } => {
            info!(?stage, "stage recovered");
            if let Err(e) = mode.transition(PipelineMode::Active) {
                debug!(%e, "ignored mode transition");
            }
        }
        HealthEvent::Correction { sequence, stabilized_text, final_text } => {
            debug!(sequence, stabilized = %stabilized_text, final = %final_text, "interim correction (no re-synthesis)");
        }
        HealthEvent::FrameDropped { stage, total_dropped } => {
            debug!(?stage, total_dropped, "frame dropped under backpressure");
        }
        HealthEvent::Starvation { stage, idle_ms } => {
            warn!(?stage, idle_ms, "stage starved");
        }
    }
}

fn passthrough_reason_for_stage(stage: Stage) -> PassthroughReason {
    match stage {
        Stage::Stt => PassthroughReason::Stt,
        Stage::Translator => PassthroughReason::Translator,
        Stage::Tts => PassthroughReason::Tts,
        // PassthroughReason has no dedicated Capture/VAD bucket; both are
        // local-audio-path failures, same as an output device fault.
        Stage::Capture | Stage::Vad | Stage::Output => PassthroughReason::OutputDevice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicebridge_foundation::ErrorKind;

    fn transcript(sequence: u64, text: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            language: "es-ES".to_string(),
            confidence: 0.9,
            word_timings: None,
            sequence,
            origin_timestamp: Instant::now(),
            processing_latency_ms: 120,
        }
    }

    fn translation(sequence: u64, text: &str, is_final: bool) -> Translation {
        Translation {
            original_text: "hola".to_string(),
            translated_text: text.to_string(),
            sequence,
            origin_timestamp: Instant::now(),
            translation_latency_ms: 40,
            is_final,
        }
    }

    fn synth_chunk(sequence: u64, is_final: bool) -> SynthChunk {
        SynthChunk {
            samples: vec![1, 2, 3],
            sequence,
            is_final,
            origin_timestamp: Instant::now(),
            cumulative_latency_ms: 200,
        }
    }

    #[tokio::test]
    async fn tap_stt_records_state_and_forwards_unchanged() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let state = Arc::new(SyncMutex::new(HashMap::new()));
        let started = Instant::now();
        let handle = tokio::spawn(tap_stt(in_rx, out_tx, state.clone(), started));

        in_tx.send(transcript(3, "hola mundo")).await.unwrap();
        drop(in_tx);
        handle.await.unwrap();

        let forwarded = out_rx.recv().await.unwrap();
        assert_eq!(forwarded.text, "hola mundo");
        let record = state.lock().remove(&3).expect("state recorded");
        assert_eq!(record.original_text, "hola mundo");
        assert_eq!(record.stt_latency_ms, 120);
    }

    #[tokio::test]
    async fn tap_translate_only_updates_state_on_final_record() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let state = Arc::new(SyncMutex::new(HashMap::new()));
        let handle = tokio::spawn(tap_translate(in_rx, out_tx, state.clone()));

        in_tx.send(translation(5, "hello ", false)).await.unwrap();
        in_tx.send(translation(5, "hello world", true)).await.unwrap();
        drop(in_tx);
        handle.await.unwrap();

        assert!(out_rx.recv().await.is_some());
        assert!(out_rx.recv().await.is_some());
        let record = state.lock().remove(&5).expect("state recorded on final");
        assert_eq!(record.translated_text, "hello world");
        assert_eq!(record.translation_latency_ms, 40);
    }

    #[tokio::test]
    async fn bridge_writes_session_log_only_on_final_chunk_and_forwards_every_chunk() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = drop_oldest_channel::<SynthChunk>(8);
        let state = Arc::new(SyncMutex::new(HashMap::new()));
        state.lock().insert(
            9,
            PartialRecord {
                origin_timestamp_ms: 10,
                original_text: "hola".to_string(),
                stt_latency_ms: 90,
                translated_text: "hello".to_string(),
                translation_latency_ms: 30,
            },
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let session_log = Arc::new(SessionLog::open(Some(path.to_str().unwrap())).unwrap());
        let metrics = PipelineMetrics::new();

        let handle = tokio::spawn(bridge_tts_output(
            in_rx,
            out_tx,
            state.clone(),
            session_log,
            metrics,
        ));

        in_tx.send(synth_chunk(9, false)).await.unwrap();
        in_tx.send(synth_chunk(9, true)).await.unwrap();
        drop(in_tx);
        handle.await.unwrap();

        assert!(out_rx.recv().await.is_some());
        assert!(out_rx.recv().await.is_some());
        assert!(state.lock().get(&9).is_none());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(value["translated_text"], "hello");
        assert_eq!(value["synthesis_latency_ms"], 200);
    }

    #[test]
    fn fatal_transport_error_on_stt_engages_passthrough() {
        let mode = Arc::new(ModeManager::new());
        let metrics = PipelineMetrics::new();
        handle_health_event(
            HealthEvent::FatalError {
                stage: Stage::Stt,
                kind: ErrorKind::Transport,
                message: "connection dropped".to_string(),
            },
            &mode,
            &metrics,
        );
        assert_eq!(
            mode.current(),
            PipelineMode::Passthrough(PassthroughReason::Stt)
        );
    }

    #[test]
    fn fallback_engaged_moves_to_degraded() {
        let mode = Arc::new(ModeManager::new());
        let metrics = PipelineMetrics::new();
        handle_health_event(
            HealthEvent::FallbackEngaged {
                stage: Stage::Tts,
                detail: "alternate synthesizer".to_string(),
            },
            &mode,
            &metrics,
        );
        assert_eq!(
            mode.current(),
            PipelineMode::Degraded(DegradedReason::TtsFallback)
        );
    }

    #[test]
    fn configuration_errors_never_trigger_passthrough() {
        let mode = Arc::new(ModeManager::new());
        let metrics = PipelineMetrics::new();
        handle_health_event(
            HealthEvent::FatalError {
                stage: Stage::Stt,
                kind: ErrorKind::Configuration,
                message: "bad credentials".to_string(),
            },
            &mode,
            &metrics,
        );
        assert_eq!(mode.current(), PipelineMode::Active);
    }
}
