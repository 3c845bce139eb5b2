//! Per-stage metrics snapshot (spec.md §3 PipelineMetrics, §4.7 health
//! snapshot).
//!
//! Shaped like the teacher's `coldvox-telemetry::pipeline_metrics`: atomics
//! behind `Arc` so every stage task holds a cheap clone and updates lock-free,
//! with percentile tracking the one spot that needs a lock (the reservoir
//! must be read-modified-written together).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::health::Stage;
use crate::percentile::PercentileTracker;

const STAGE_COUNT: usize = 6;

fn stage_index(stage: Stage) -> usize {
    match stage {
        Stage::Capture => 0,
        Stage::Vad => 1,
        Stage::Stt => 2,
        Stage::Translator => 3,
        Stage::Tts => 4,
        Stage::Output => 5,
    }
}

struct StageMetrics {
    queue_depth: AtomicUsize,
    error_count: AtomicU64,
    frames_processed: AtomicU64,
    latency: Mutex<PercentileTracker>,
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self {
            queue_depth: AtomicUsize::new(0),
            error_count: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            latency: Mutex::new(PercentileTracker::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageSnapshot {
    pub queue_depth: usize,
    pub error_count: u64,
    pub frames_processed: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    pub capture: StageSnapshot,
    pub vad: StageSnapshot,
    pub stt: StageSnapshot,
    pub translator: StageSnapshot,
    pub tts: StageSnapshot,
    pub output: StageSnapshot,
    pub dropped_capture_frames: u64,
    pub dropped_output_chunks: u64,
}

/// Shared metrics handle; cheap to clone, one instance per process handed to
/// every stage task and the Orchestrator.
#[derive(Clone)]
pub struct PipelineMetrics {
    stages: Arc<[StageMetrics; STAGE_COUNT]>,
    dropped_capture_frames: Arc<AtomicU64>,
    dropped_output_chunks: Arc<AtomicU64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            stages: Arc::new(Default::default()),
            dropped_capture_frames: Arc::new(AtomicU64::new(0)),
            dropped_output_chunks: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_depth(&self, stage: Stage, depth: usize) {
        self.stages[stage_index(stage)]
            .queue_depth
            .store(depth, Ordering::Relaxed);
    }

    pub fn increment_error(&self, stage: Stage) {
        self.stages[stage_index(stage)]
            .error_count
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processed(&self, stage: Stage) {
        self.stages[stage_index(stage)]
            .frames_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, stage: Stage, latency: Duration) {
        self.stages[stage_index(stage)].latency.lock().record(latency);
    }

    pub fn increment_dropped_capture_frames(&self) -> u64 {
        self.dropped_capture_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn increment_dropped_output_chunks(&self) -> u64 {
        self.dropped_output_chunks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn stage_snapshot(&self, stage: Stage) -> StageSnapshot {
        let metrics = &self.stages[stage_index(stage)];
        let latency = metrics.latency.lock();
        StageSnapshot {
            queue_depth: metrics.queue_depth.load(Ordering::Relaxed),
            error_count: metrics.error_count.load(Ordering::Relaxed),
            frames_processed: metrics.frames_processed.load(Ordering::Relaxed),
            p50_ms: latency.p50().map(|d| d.as_millis() as u64),
            p95_ms: latency.p95().map(|d| d.as_millis() as u64),
            p99_ms: latency.p99().map(|d| d.as_millis() as u64),
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            capture: self.stage_snapshot(Stage::Capture),
            vad: self.stage_snapshot(Stage::Vad),
            stt: self.stage_snapshot(Stage::Stt),
            translator: self.stage_snapshot(Stage::Translator),
            tts: self.stage_snapshot(Stage::Tts),
            output: self.stage_snapshot(Stage::Output),
            dropped_capture_frames: self.dropped_capture_frames.load(Ordering::Relaxed),
            dropped_output_chunks: self.dropped_output_chunks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_samples() {
        let metrics = PipelineMetrics::new();
        metrics.set_queue_depth(Stage::Stt, 3);
        metrics.increment_error(Stage::Stt);
        metrics.record_latency(Stage::Stt, Duration::from_millis(120));

        let snap = metrics.snapshot();
        assert_eq!(snap.stt.queue_depth, 3);
        assert_eq!(snap.stt.error_count, 1);
        assert_eq!(snap.stt.p50_ms, Some(120));
        assert_eq!(snap.capture.error_count, 0);
    }

    #[test]
    fn dropped_frame_counter_increments() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.increment_dropped_capture_frames(), 1);
        assert_eq!(metrics.increment_dropped_capture_frames(), 2);
        assert_eq!(metrics.snapshot().dropped_capture_frames, 2);
    }
}
