//! Utterance state machine (spec.md §4.2), grounded on the shape of the
//! teacher's `coldvox-vad::state::VadStateMachine` (Idle/Speech plus
//! debounce counters) but producing frozen `Utterance` buffers instead of
//! `VadEvent` boundary markers, since downstream here needs the audio span
//! itself, not just start/end timestamps.

use std::collections::VecDeque;
use std::time::Instant;

use voicebridge_audio::{AudioFrame, SAMPLE_RATE_HZ};
use voicebridge_foundation::config::VadConfig;

use crate::types::Utterance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speech,
}

fn ms_to_samples(ms: u32) -> usize {
    (SAMPLE_RATE_HZ as u64 * ms as u64 / 1000) as usize
}

fn samples_to_ms(samples: usize) -> u32 {
    (samples as u64 * 1000 / SAMPLE_RATE_HZ as u64) as u32
}

/// Drives one continuous audio stream through the Idle/Speech state machine
/// of spec.md §4.2. Not `Send`-constrained on its own; the owning stage
/// task is the only thing that touches it.
pub struct UtteranceSegmenter {
    theta: f32,
    min_speech_samples: usize,
    min_silence_samples: usize,
    pad_samples: usize,
    max_utterance_samples: usize,

    state: State,
    pre_roll: VecDeque<i16>,
    buffer: Vec<i16>,
    samples_since_last_speech: usize,
    prob_sum: f64,
    prob_count: u64,
    start_timestamp: Option<Instant>,
    last_frame_timestamp: Option<Instant>,
    sequence: u64,
}

impl UtteranceSegmenter {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            theta: config.theta,
            min_speech_samples: ms_to_samples(config.min_speech_ms),
            min_silence_samples: ms_to_samples(config.min_silence_ms),
            pad_samples: ms_to_samples(config.pad_ms),
            max_utterance_samples: ms_to_samples(config.max_utterance_ms),
            state: State::Idle,
            pre_roll: VecDeque::new(),
            buffer: Vec::new(),
            samples_since_last_speech: 0,
            prob_sum: 0.0,
            prob_count: 0,
            start_timestamp: None,
            last_frame_timestamp: None,
            sequence: 0,
        }
    }

    /// Feeds one frame and its speech probability through the state
    /// machine. Returns a frozen `Utterance` when an end condition (a) or
    /// (b) of spec.md §4.2 fires.
    pub fn process(&mut self, frame: &AudioFrame, probability: f32) -> Option<Utterance> {
        self.last_frame_timestamp = Some(frame.capture_timestamp);

        match self.state {
            State::Idle => {
                if probability >= self.theta {
                    self.state = State::Speech;
                    self.start_timestamp = Some(frame.capture_timestamp);
                    self.buffer.clear();
                    self.buffer.extend(self.pre_roll.iter().copied());
                    self.buffer.extend_from_slice(&frame.samples);
                    self.samples_since_last_speech = 0;
                    self.prob_sum = probability as f64;
                    self.prob_count = 1;
                    None
                } else {
                    self.push_pre_roll(&frame.samples);
                    None
                }
            }
            State::Speech => {
                self.buffer.extend_from_slice(&frame.samples);
                self.prob_sum += probability as f64;
                self.prob_count += 1;

                if probability >= self.theta {
                    self.samples_since_last_speech = 0;
                } else {
                    self.samples_since_last_speech += frame.samples.len();
                }

                if self.samples_since_last_speech >= self.min_silence_samples {
                    return self.emit_on_silence();
                }
                if self.buffer.len() >= self.max_utterance_samples {
                    return Some(self.emit_partial());
                }
                None
            }
        }
    }

    /// spec.md §4.2 "downstream closed → drop buffered audio on shutdown".
    pub fn discard(&mut self) {
        self.state = State::Idle;
        self.buffer.clear();
        self.pre_roll.clear();
        self.samples_since_last_speech = 0;
        self.prob_sum = 0.0;
        self.prob_count = 0;
        self.start_timestamp = None;
    }

    fn push_pre_roll(&mut self, samples: &[i16]) {
        self.pre_roll.extend(samples.iter().copied());
        while self.pre_roll.len() > self.pad_samples {
            self.pre_roll.pop_front();
        }
    }

    fn average_probability(&self) -> f32 {
        if self.prob_count == 0 {
            0.0
        } else {
            (self.prob_sum / self.prob_count as f64) as f32
        }
    }

    /// End condition (a): trailing silence reached `min_silence_ms`. Trims
    /// the buffer back to `pad_ms` of trailing audio past the last
    /// theta-above frame — the full `min_silence_ms` window is only needed
    /// to make the end-of-speech decision, not to be carried into STT.
    fn emit_on_silence(&mut self) -> Option<Utterance> {
        let keep_trailing = self.pad_samples.min(self.samples_since_last_speech);
        let trim_from_end = self.samples_since_last_speech - keep_trailing;
        let emit_len = self.buffer.len().saturating_sub(trim_from_end);

        let duration_ms = samples_to_ms(emit_len);
        let start = self.start_timestamp.take().unwrap_or_else(Instant::now);
        let end = self.last_frame_timestamp.unwrap_or(start);
        let avg_prob = self.average_probability();

        let samples = self.buffer[..emit_len].to_vec();
        self.state = State::Idle;
        self.buffer.clear();
        self.samples_since_last_speech = 0;
        self.prob_sum = 0.0;
        self.prob_count = 0;
        self.pre_roll.clear();

        if duration_ms < samples_to_ms(self.min_speech_samples).max(1) && samples.len() < self.min_speech_samples {
            // Too short to count as an utterance (spec.md §8 boundary:
            // "minSpeech - 1 is not [emitted]"); treat as a false trigger.
            return None;
        }

        let sequence = self.next_sequence();
        Some(Utterance {
            samples,
            start_timestamp: start,
            end_timestamp: end,
            average_speech_probability: avg_prob,
            partial: false,
            sequence,
        })
    }

    /// End condition (b): max utterance duration reached. Emits everything
    /// accumulated so far as `partial=true` and keeps the state machine in
    /// `Speech` with an empty buffer so the next frame continues the same
    /// logical utterance with no gap (spec.md §4.2 end condition b).
    fn emit_partial(&mut self) -> Utterance {
        let start = self.start_timestamp.unwrap_or_else(Instant::now);
        let end = self.last_frame_timestamp.unwrap_or(start);
        let avg_prob = self.average_probability();
        let samples = std::mem::take(&mut self.buffer);

        self.start_timestamp = Some(end);
        self.samples_since_last_speech = 0;
        self.prob_sum = 0.0;
        self.prob_count = 0;

        let sequence = self.next_sequence();
        Utterance {
            samples,
            start_timestamp: start,
            end_timestamp: end,
            average_speech_probability: avg_prob,
            partial: true,
            sequence,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.sequence;
        self.sequence += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> VadConfig {
        VadConfig {
            theta: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 300,
            pad_ms: 100,
            max_utterance_ms: 15_000,
        }
    }

    fn frame(samples: Vec<i16>, seq: u64, t: Instant) -> AudioFrame {
        AudioFrame::new(samples, t, seq)
    }

    fn speech_frame_samples() -> Vec<i16> {
        vec![10_000i16; 480]
    }

    fn silence_frame_samples() -> Vec<i16> {
        vec![0i16; 480]
    }

    #[test]
    fn emits_after_min_speech_and_min_silence() {
        let mut seg = UtteranceSegmenter::new(&config());
        let mut t = Instant::now();
        let mut seq = 0u64;
        let mut emitted = None;

        // 250ms of speech: ceil(250/30) = 9 frames to cross min_speech.
        for _ in 0..9 {
            let f = frame(speech_frame_samples(), seq, t);
            seq += 1;
            t += Duration::from_millis(30);
            assert!(seg.process(&f, 0.9).is_none());
        }
        // 300ms of silence: 10 frames to cross min_silence.
        for i in 0..10 {
            let f = frame(silence_frame_samples(), seq, t);
            seq += 1;
            t += Duration::from_millis(30);
            let result = seg.process(&f, 0.1);
            if result.is_some() {
                emitted = result;
                assert!(i >= 9);
                break;
            }
        }
        let utt = emitted.expect("utterance should have been emitted");
        assert!(!utt.partial);
        assert!(utt.samples.len() >= ms_to_samples(250));
    }

    #[test]
    fn short_burst_below_min_speech_is_not_emitted() {
        let mut seg = UtteranceSegmenter::new(&config());
        let mut t = Instant::now();
        let mut seq = 0u64;

        // Only 2 frames (60ms) of speech, well under min_speech_ms.
        for _ in 0..2 {
            let f = frame(speech_frame_samples(), seq, t);
            seq += 1;
            t += Duration::from_millis(30);
            assert!(seg.process(&f, 0.9).is_none());
        }
        let mut emitted_anything = false;
        for _ in 0..15 {
            let f = frame(silence_frame_samples(), seq, t);
            seq += 1;
            t += Duration::from_millis(30);
            if seg.process(&f, 0.1).is_some() {
                emitted_anything = true;
            }
        }
        assert!(!emitted_anything);
    }

    #[test]
    fn max_utterance_splits_with_partial_flag_and_no_gap() {
        let cfg = VadConfig {
            max_utterance_ms: 300,
            ..config()
        };
        let mut seg = UtteranceSegmenter::new(&cfg);
        let mut t = Instant::now();
        let mut seq = 0u64;
        let mut saw_partial = false;

        for _ in 0..40 {
            let f = frame(speech_frame_samples(), seq, t);
            seq += 1;
            t += Duration::from_millis(30);
            if let Some(utt) = seg.process(&f, 0.9) {
                assert!(utt.partial);
                saw_partial = true;
                break;
            }
        }
        assert!(saw_partial);
        // Still in Speech: the very next frame should not re-trigger Idle
        // pre-roll behavior (it keeps accumulating into a new buffer).
        let f = frame(speech_frame_samples(), seq, t);
        assert!(seg.process(&f, 0.9).is_none());
    }

    #[test]
    fn discard_clears_buffered_audio() {
        let mut seg = UtteranceSegmenter::new(&config());
        let mut t = Instant::now();
        for i in 0..5u64 {
            let f = frame(speech_frame_samples(), i, t);
            t += Duration::from_millis(30);
            seg.process(&f, 0.9);
        }
        seg.discard();
        assert_eq!(seg.buffer.len(), 0);
    }
}
