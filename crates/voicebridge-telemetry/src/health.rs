//! Health event channel (SPEC_FULL.md §10.4).
//!
//! Event-driven rather than polled: the teacher's `app::foundation::health`
//! runs a ticking `HealthMonitor` that calls out to registered checks on an
//! interval. Here, failures are discrete (a transport drop, a fallback
//! engagement, a correction), so stages push a typed event onto a bounded
//! `mpsc` channel the moment it happens and the Orchestrator drains it.

use tokio::sync::mpsc;

use voicebridge_foundation::ErrorKind;

pub const HEALTH_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Vad,
    Stt,
    Translator,
    Tts,
    Output,
}

#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// A stage hit an error it cannot recover from itself; carries the
    /// classification the Orchestrator needs to decide a mode transition.
    FatalError {
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
    /// A non-fatal fallback engaged (e.g. TTS fell back to an alternate
    /// synthesizer); pipeline mode should move to Degraded.
    FallbackEngaged { stage: Stage, detail: String },
    /// The primary path recovered after a fallback or passthrough episode.
    Recovered { stage: Stage },
    /// spec.md §9 Open Question: a stabilized interim was forwarded but the
    /// later final differed. Reported for observability; no re-synthesis.
    Correction {
        sequence: u64,
        stabilized_text: String,
        final_text: String,
    },
    /// Capture → VAD dropped a frame under backpressure (spec.md §4.1).
    FrameDropped { stage: Stage, total_dropped: u64 },
    /// A stage that should be producing has been silent longer than expected.
    Starvation { stage: Stage, idle_ms: u64 },
}

pub type HealthSender = mpsc::Sender<HealthEvent>;
pub type HealthReceiver = mpsc::Receiver<HealthEvent>;

pub fn health_channel() -> (HealthSender, HealthReceiver) {
    mpsc::channel(HEALTH_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (tx, mut rx) = health_channel();
        tx.send(HealthEvent::FrameDropped {
            stage: Stage::Capture,
            total_dropped: 1,
        })
        .await
        .unwrap();
        tx.send(HealthEvent::FrameDropped {
            stage: Stage::Capture,
            total_dropped: 2,
        })
        .await
        .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first, second) {
            (
                HealthEvent::FrameDropped { total_dropped: a, .. },
                HealthEvent::FrameDropped { total_dropped: b, .. },
            ) => assert!(a < b),
            _ => panic!("unexpected event variants"),
        }
    }
}
