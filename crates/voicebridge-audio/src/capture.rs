//! Capture stage (spec.md §4.1).
//!
//! The `cpal` stream callback runs on a device-owned thread; the pipeline
//! side only ever touches a short-critical-section `Mutex<VecDeque<i16>>`
//! (spec.md §5 suspension-point discipline), mirroring the teacher's
//! `AudioCapture`/`AudioChunker` split but collapsed into one stage since
//! VoiceBridge's target rate (16 kHz mono) rarely needs the teacher's
//! multi-format conversion ladder — only resampling and mono-down-mix.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use voicebridge_foundation::error::AudioError;
use voicebridge_telemetry::health::{HealthEvent, HealthSender, Stage};
use voicebridge_telemetry::PipelineMetrics;

use crate::channel::DropOldestSender;
use crate::device::DeviceManager;
use crate::frame::{apply_gain, AudioFrame, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::resampler::StreamResampler;

pub struct CaptureConfig {
    pub device_id: Option<String>,
    pub input_gain: f32,
}

struct SharedBuffer {
    samples: Mutex<VecDeque<i16>>,
    stream_error: AtomicBool,
}

/// Owns the open device stream and the async draining task. Dropping this
/// stops the stream (spec.md §4.1 `Stop`: "drains and closes").
pub struct CaptureStage {
    _stream: Arc<Mutex<Stream>>,
    running: Arc<AtomicBool>,
}

impl CaptureStage {
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub async fn start_capture(
    config: CaptureConfig,
    output: DropOldestSender<AudioFrame>,
    metrics: PipelineMetrics,
    health: HealthSender,
) -> Result<CaptureStage, AudioError> {
    let device_manager = DeviceManager::new();
    let device = device_manager.open_input(config.device_id.as_deref())?;

    let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
    info!(device = %name, "opening capture device");

    let (stream_config, sample_format) = negotiate_input_config(&device)?;
    let device_rate = stream_config.sample_rate.0;
    let device_channels = stream_config.channels;

    let buffer = Arc::new(SharedBuffer {
        samples: Mutex::new(VecDeque::with_capacity(FRAME_SIZE_SAMPLES * 8)),
        stream_error: AtomicBool::new(false),
    });

    let stream = build_input_stream(&device, &stream_config, sample_format, buffer.clone())?;
    stream.play().map_err(|e| AudioError::Fatal(e.to_string()))?;
    let stream = Arc::new(Mutex::new(stream));

    let running = Arc::new(AtomicBool::new(true));
    spawn_drain_task(
        buffer,
        output,
        metrics,
        health,
        running.clone(),
        device_rate,
        device_channels,
        config.input_gain,
        config.device_id,
        stream_config,
        sample_format,
        stream.clone(),
    );

    Ok(CaptureStage {
        _stream: stream,
        running,
    })
}

fn negotiate_input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), AudioError> {
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }
    Err(AudioError::FormatNotSupported {
        format: "no supported input configuration".to_string(),
    })
}

fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    buffer: Arc<SharedBuffer>,
) -> Result<Stream, AudioError> {
    let err_buffer = buffer.clone();
    let err_fn = move |err: cpal::StreamError| {
        error!("capture stream error: {err}");
        err_buffer.stream_error.store(true, Ordering::SeqCst);
    };

    let push_buffer = buffer.clone();
    let handle_i16 = move |data: &[i16]| {
        let mut samples = push_buffer.samples.lock();
        samples.extend(data.iter().copied());
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| handle_i16(data),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
                    .collect();
                handle_i16(&converted);
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

/// Rebuilds and plays a fresh input stream on the same device (spec.md §4.1
/// "one automatic reopen attempt"). A second failure is left to the caller
/// to escalate to a fatal device error.
fn reopen_input_stream(
    device_id: Option<&str>,
    stream_config: &StreamConfig,
    sample_format: SampleFormat,
    buffer: Arc<SharedBuffer>,
) -> Result<Stream, AudioError> {
    let device_manager = DeviceManager::new();
    let device = device_manager.open_input(device_id)?;
    let stream = build_input_stream(&device, stream_config, sample_format, buffer)?;
    stream.play().map_err(|e| AudioError::Fatal(e.to_string()))?;
    Ok(stream)
}

#[allow(clippy::too_many_arguments)]
fn spawn_drain_task(
    buffer: Arc<SharedBuffer>,
    output: DropOldestSender<AudioFrame>,
    metrics: PipelineMetrics,
    health: HealthSender,
    running: Arc<AtomicBool>,
    device_rate: u32,
    device_channels: u16,
    gain: f32,
    device_id: Option<String>,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    stream_slot: Arc<Mutex<Stream>>,
) {
    tokio::spawn(async move {
        let mut resampler = StreamResampler::new(device_rate, SAMPLE_RATE_HZ);
        let mut frame_sequence: u64 = 0;
        let start = tokio::time::Instant::now();
        let mut samples_emitted: u64 = 0;
        // spec.md §4.1: one automatic reopen attempt before escalating to a
        // fatal device error. Reset once a read succeeds again.
        let mut reopened_since_last_success = false;

        while running.load(Ordering::SeqCst) {
            if buffer.stream_error.swap(false, Ordering::SeqCst) {
                if !reopened_since_last_success {
                    warn!("capture device reported a stream error, reopening stream");
                    reopened_since_last_success = true;
                    match reopen_input_stream(
                        device_id.as_deref(),
                        &stream_config,
                        sample_format,
                        buffer.clone(),
                    ) {
                        Ok(new_stream) => {
                            *stream_slot.lock() = new_stream;
                        }
                        Err(e) => {
                            error!("failed to reopen capture stream: {e}");
                            let _ = health
                                .send(HealthEvent::FatalError {
                                    stage: Stage::Capture,
                                    kind: voicebridge_foundation::ErrorKind::Device,
                                    message: format!("capture stream reopen failed: {e}"),
                                })
                                .await;
                        }
                    }
                } else {
                    error!("capture device failed again after reopen attempt");
                    let _ = health
                        .send(HealthEvent::FatalError {
                            stage: Stage::Capture,
                            kind: voicebridge_foundation::ErrorKind::Device,
                            message: "capture stream error persisted after reopen".to_string(),
                        })
                        .await;
                }
            }

            let raw: Vec<i16> = {
                let mut samples = buffer.samples.lock();
                samples.drain(..).collect()
            };

            if raw.is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                continue;
            }

            reopened_since_last_success = false;

            let mono = downmix(&raw, device_channels);
            let resampled = resampler.process(&mono);

            for chunk in resampled.chunks(FRAME_SIZE_SAMPLES) {
                if chunk.len() < FRAME_SIZE_SAMPLES {
                    // Partial trailing chunk: carried into the resampler's
                    // own buffering on the next call, not emitted early.
                    break;
                }
                let mut samples = chunk.to_vec();
                apply_gain(&mut samples, gain);

                let timestamp_ms = samples_emitted * 1000 / SAMPLE_RATE_HZ as u64;
                let timestamp = start + std::time::Duration::from_millis(timestamp_ms);
                samples_emitted += chunk.len() as u64;

                let frame = AudioFrame::new(samples, timestamp, frame_sequence);
                frame_sequence += 1;

                let dropped = output.push(frame);
                metrics.increment_processed(Stage::Capture);
                if dropped > 0 {
                    let _ = health
                        .send(HealthEvent::FrameDropped {
                            stage: Stage::Capture,
                            total_dropped: dropped,
                        })
                        .await;
                }
                metrics.set_queue_depth(Stage::Capture, output.total_dropped() as usize);
            }
        }

        info!("capture drain task stopped");
    });
}

fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
