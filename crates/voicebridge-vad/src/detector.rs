//! Frame-probability interface (spec.md §9: "the target shape treats the
//! VAD as an interface {probability(frame) → [0,1]}, satisfied by any
//! equivalent detector, including a precompiled lightweight model with
//! direct tensor API").
//!
//! `EnergyDetector` is grounded on the teacher's `coldvox-vad::energy`
//! module and stands in for the teacher's Silero ONNX model here: same
//! dBFS-to-probability mapping, no tensor runtime dependency, since the
//! streaming pipeline core treats the detector as a pluggable boundary, not
//! a specific model.

use voicebridge_foundation::error::VadError;

/// Satisfied by any frame-level speech detector: a 30 ms, 16 kHz mono i16
/// frame in, a probability in `[0, 1]` out.
pub trait SpeechDetector: Send {
    fn probability(&mut self, frame: &[i16]) -> Result<f32, VadError>;
}

/// Energy-based stand-in for a neural VAD model. Maps RMS dBFS onto `[0,
/// 1]` with a soft knee around the floor/ceiling so that loud speech
/// saturates to ~1.0 and silence decays to ~0.0, rather than a hard
/// threshold at the detector level (the hard threshold against `theta`
/// happens one layer up, in the state machine).
pub struct EnergyDetector {
    floor_db: f32,
    ceiling_db: f32,
}

impl Default for EnergyDetector {
    fn default() -> Self {
        Self {
            floor_db: -50.0,
            ceiling_db: -15.0,
        }
    }
}

impl EnergyDetector {
    pub fn new(floor_db: f32, ceiling_db: f32) -> Self {
        Self { floor_db, ceiling_db }
    }

    fn dbfs(frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return -100.0;
        }
        let sum_squares: i64 = frame.iter().map(|&s| (s as i64) * (s as i64)).sum();
        let mean_square = sum_squares as f64 / frame.len() as f64;
        let rms = (mean_square.sqrt() / 32768.0).max(1e-10) as f32;
        20.0 * rms.log10()
    }
}

impl SpeechDetector for EnergyDetector {
    fn probability(&mut self, frame: &[i16]) -> Result<f32, VadError> {
        let db = Self::dbfs(frame);
        let span = (self.ceiling_db - self.floor_db).max(1.0);
        let p = (db - self.floor_db) / span;
        Ok(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_low_probability() {
        let mut detector = EnergyDetector::default();
        let frame = vec![0i16; 480];
        assert!(detector.probability(&frame).unwrap() < 0.1);
    }

    #[test]
    fn loud_tone_has_high_probability() {
        let mut detector = EnergyDetector::default();
        let frame: Vec<i16> = (0..480)
            .map(|i| ((i as f32 * 0.2).sin() * 20_000.0) as i16)
            .collect();
        assert!(detector.probability(&frame).unwrap() > 0.8);
    }
}
