//! Output Sink stage (spec.md §4.6).
//!
//! Structured like `capture.rs`: a `cpal` output stream owns the
//! device-side thread and only ever touches a short-critical-section
//! buffer; a separate async task receives `SynthChunk`s, resamples,
//! anti-click-fades, and feeds the ring buffer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{info, warn};

use voicebridge_foundation::error::AudioError;
use voicebridge_telemetry::health::{HealthEvent, HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;

use crate::channel::DropOldestReceiver;
use crate::device::DeviceManager;
use crate::resampler::StreamResampler;
use crate::synth_chunk::{SynthChunk, OUTPUT_SAMPLE_RATE_HZ};

/// ~50 ms of audio at 24 kHz mono (spec.md §4.6 "Jitter absorption").
const JITTER_BUFFER_SAMPLES: usize = (OUTPUT_SAMPLE_RATE_HZ as usize * 50) / 1000;
const DEFAULT_FADE_MS: u32 = 5;

pub struct OutputConfig {
    pub device_id: Option<String>,
    pub silent: bool,
    pub fade_ms: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            silent: false,
            fade_ms: DEFAULT_FADE_MS,
        }
    }
}

struct RingBuffer {
    samples: Mutex<VecDeque<i16>>,
    silent: AtomicBool,
}

pub struct OutputStage {
    _stream: Stream,
    running: Arc<AtomicBool>,
}

impl OutputStage {
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub async fn start_output(
    config: OutputConfig,
    input: DropOldestReceiver<SynthChunk>,
    metrics: PipelineMetrics,
    health: HealthSender,
) -> Result<OutputStage, AudioError> {
    let device_manager = DeviceManager::new();
    let device = device_manager.open_output(config.device_id.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
    info!(device = %name, silent = config.silent, "opening output device");

    let (stream_config, sample_format) = negotiate_output_config(&device)?;
    let device_rate = stream_config.sample_rate.0;

    let ring = Arc::new(RingBuffer {
        samples: Mutex::new(VecDeque::with_capacity(JITTER_BUFFER_SAMPLES * 2)),
        silent: AtomicBool::new(config.silent),
    });

    let stream = build_output_stream(&device, &stream_config, sample_format, ring.clone())?;
    stream.play().map_err(|e| AudioError::Fatal(e.to_string()))?;

    let running = Arc::new(AtomicBool::new(true));
    spawn_feed_task(
        ring,
        input,
        metrics,
        health,
        running.clone(),
        device_rate,
        config.fade_ms,
    );

    Ok(OutputStage {
        _stream: stream,
        running,
    })
}

fn negotiate_output_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), AudioError> {
    if let Ok(default_config) = device.default_output_config() {
        return Ok((
            StreamConfig {
                channels: 1,
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }
    Err(AudioError::FormatNotSupported {
        format: "no supported output configuration".to_string(),
    })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    ring: Arc<RingBuffer>,
) -> Result<Stream, AudioError> {
    let err_fn = |err: cpal::StreamError| warn!("output stream error: {err}");

    let fill_ring = ring.clone();
    let fill_i16 = move |out: &mut [i16]| {
        let mut samples = fill_ring.samples.lock();
        let silent = fill_ring.silent.load(Ordering::Relaxed);
        for slot in out.iter_mut() {
            *slot = match samples.pop_front() {
                Some(s) if !silent => s,
                _ => 0,
            };
        }
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _| fill_i16(data),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _| {
                let mut buf = vec![0i16; data.len()];
                fill_i16(&mut buf);
                for (slot, &s) in data.iter_mut().zip(buf.iter()) {
                    *slot = s as f32 / 32768.0;
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?}"),
            })
        }
    }
    .map_err(|e| AudioError::Fatal(e.to_string()))?;

    Ok(stream)
}

fn spawn_feed_task(
    ring: Arc<RingBuffer>,
    mut input: DropOldestReceiver<SynthChunk>,
    metrics: PipelineMetrics,
    health: HealthSender,
    running: Arc<AtomicBool>,
    device_rate: u32,
    fade_ms: u32,
) {
    tokio::spawn(async move {
        let mut resampler = StreamResampler::new(OUTPUT_SAMPLE_RATE_HZ, device_rate);
        let mut current_sequence: Option<u64> = None;

        while running.load(Ordering::SeqCst) {
            let Some(chunk) = input.recv().await else {
                break;
            };

            let starts_new_sequence = current_sequence != Some(chunk.sequence);
            current_sequence = Some(chunk.sequence);

            let mut samples = chunk.samples.clone();
            if starts_new_sequence && !samples.is_empty() {
                apply_fade_in(&mut samples, device_rate, fade_ms);
            }
            if chunk.is_final {
                apply_fade_out(&mut samples, device_rate, fade_ms);
            }

            let resampled = resampler.process(&samples);
            {
                let mut buf = ring.samples.lock();
                buf.extend(resampled);
            }

            metrics.increment_processed(Stage::Output);
            let latency = chunk.origin_timestamp.elapsed();
            metrics.record_latency(Stage::Output, latency);

            if chunk.is_final {
                let _ = health
                    .send(HealthEvent::Recovered { stage: Stage::Output })
                    .await;
            }
        }
        info!("output feed task stopped");
    });
}

/// Linear ramp over the first `fade_ms` (spec.md §4.6 "Anti-click"). Ramps
/// must not cross sequence boundaries, so this only ever operates on a
/// single chunk's samples.
fn apply_fade_in(samples: &mut [i16], sample_rate: u32, fade_ms: u32) {
    let fade_samples = ((sample_rate as u64 * fade_ms as u64) / 1000) as usize;
    let n = fade_samples.min(samples.len());
    for (i, sample) in samples.iter_mut().take(n).enumerate() {
        let gain = i as f32 / n.max(1) as f32;
        *sample = (*sample as f32 * gain) as i16;
    }
}

fn apply_fade_out(samples: &mut [i16], sample_rate: u32, fade_ms: u32) {
    let fade_samples = ((sample_rate as u64 * fade_ms as u64) / 1000) as usize;
    let n = fade_samples.min(samples.len());
    let len = samples.len();
    for (i, sample) in samples.iter_mut().rev().take(n).enumerate() {
        let gain = i as f32 / n.max(1) as f32;
        *sample = (*sample as f32 * gain) as i16;
    }
    let _ = len;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_in_ramps_from_zero() {
        let mut samples = vec![10_000i16; 100];
        apply_fade_in(&mut samples, 1_000, 10);
        assert_eq!(samples[0], 0);
        assert!(samples[9] < 10_000);
    }

    #[test]
    fn fade_out_ramps_to_zero() {
        let mut samples = vec![10_000i16; 100];
        apply_fade_out(&mut samples, 1_000, 10);
        assert_eq!(samples[99], 0);
    }

    #[test]
    fn silence_chunk_has_correct_sample_count() {
        let chunk = SynthChunk::silence(0, 500, std::time::Instant::now());
        assert_eq!(chunk.samples.len(), OUTPUT_SAMPLE_RATE_HZ as usize / 2);
        assert!(chunk.is_final);
    }
}
