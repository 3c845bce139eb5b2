//! VAD stage task (spec.md §4.2).
//!
//! Reads from the drop-oldest Capture→VAD channel and writes to the
//! blocking VAD→STT channel (spec.md §5 backpressure table: "Utterances
//! are precious and must not be dropped" — §4.2 "Emit").

use tokio::sync::mpsc;
use tracing::{debug, info};

use voicebridge_audio::{AudioFrame, DropOldestReceiver};
use voicebridge_foundation::config::VadConfig;
use voicebridge_foundation::CancelSignal;
use voicebridge_telemetry::health::{HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;

use crate::detector::SpeechDetector;
use crate::state::UtteranceSegmenter;
use crate::types::Utterance;

pub async fn run_vad_stage(
    config: VadConfig,
    mut detector: Box<dyn SpeechDetector>,
    mut input: DropOldestReceiver<AudioFrame>,
    output: mpsc::Sender<Utterance>,
    metrics: PipelineMetrics,
    _health: HealthSender,
    cancel: CancelSignal,
) {
    let mut segmenter = UtteranceSegmenter::new(&config);

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                segmenter.discard();
                break;
            }
            frame = input.recv() => match frame {
                Some(frame) => frame,
                None => {
                    segmenter.discard();
                    break;
                }
            },
        };

        let probability = match detector.probability(&frame.samples) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "VAD detector error; treating frame as non-speech");
                0.0
            }
        };

        metrics.set_queue_depth(Stage::Vad, input.len());

        if let Some(utterance) = segmenter.process(&frame, probability) {
            metrics.increment_processed(Stage::Vad);
            debug!(
                sequence = utterance.sequence,
                partial = utterance.partial,
                duration_ms = utterance.duration_ms(),
                "emitting utterance"
            );
            // Blocking send by design: spec.md §4.2 forbids dropping
            // Utterances even under backpressure.
            if output.send(utterance).await.is_err() {
                break;
            }
        }
    }

    info!("VAD stage stopped");
}
