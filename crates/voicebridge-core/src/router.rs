//! Passthrough router (spec.md §4.7): sits where VAD's input otherwise
//! would, deciding per frame whether it feeds the remote pipeline (Active
//! / Degraded) or is resampled straight to Output (Passthrough).
//!
//! Kept as its own task rather than a branch inside VAD so VAD's state
//! machine never has to reason about mode — it simply stops receiving
//! frames while passthrough is engaged.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use voicebridge_audio::channel::{DropOldestReceiver, DropOldestSender};
use voicebridge_audio::frame::AudioFrame;
use voicebridge_audio::resampler::StreamResampler;
use voicebridge_audio::synth_chunk::{SynthChunk, OUTPUT_SAMPLE_RATE_HZ};
use voicebridge_foundation::CancelSignal;
use voicebridge_foundation::ModeManager;
use voicebridge_telemetry::health::Stage;
use voicebridge_telemetry::PipelineMetrics;

pub async fn run_passthrough_router(
    mut input: DropOldestReceiver<AudioFrame>,
    vad_output: DropOldestSender<AudioFrame>,
    synth_output: DropOldestSender<SynthChunk>,
    mode: Arc<ModeManager>,
    metrics: PipelineMetrics,
    cancel: CancelSignal,
) {
    let mut resampler = StreamResampler::new(voicebridge_audio::frame::SAMPLE_RATE_HZ, OUTPUT_SAMPLE_RATE_HZ);
    let mut passthrough_sequence: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            maybe_frame = input.recv() => {
                let Some(frame) = maybe_frame else { break };

                if mode.is_passthrough() {
                    let samples = resampler.process(&frame.samples);
                    let chunk = SynthChunk {
                        samples,
                        sequence: passthrough_sequence,
                        is_final: true,
                        origin_timestamp: Instant::now(),
                        cumulative_latency_ms: 0,
                    };
                    passthrough_sequence += 1;
                    let dropped = synth_output.push(chunk);
                    if dropped > 0 {
                        metrics.increment_dropped_output_chunks();
                    }
                } else {
                    let dropped = vad_output.push(frame);
                    if dropped > 0 {
                        metrics.increment_dropped_capture_frames();
                    }
                    metrics.set_queue_depth(Stage::Vad, 0);
                }
            }
        }
    }

    vad_output.close();
    info!("passthrough router stopped");
}
