//! Polyphase resampler (spec.md §4.6), adapted from the teacher's
//! `coldvox-audio::resampler::StreamResampler`.
//!
//! Output only ever resamples once at stage start, since the device sample
//! rate is assumed fixed for a session (spec.md §4.6) — so this keeps the
//! teacher's "Balanced" sinc quality preset unconditionally rather than
//! exposing the teacher's three-tier quality knob.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 512;

pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: Option<SincFixedIn<f32>>,
    input_buffer: Vec<f32>,
    output_buffer: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        if in_rate == out_rate {
            return Self {
                in_rate,
                out_rate,
                resampler: None,
                input_buffer: Vec::new(),
                output_buffer: Vec::new(),
            };
        }

        let params = SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::Blackman2,
        };

        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            params,
            CHUNK_SIZE,
            1,
        )
        .expect("rubato resampler configuration is valid");

        Self {
            in_rate,
            out_rate,
            resampler: Some(resampler),
            input_buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            output_buffer: Vec::new(),
        }
    }

    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        let Some(resampler) = self.resampler.as_mut() else {
            return input.to_vec();
        };

        for &sample in input {
            self.input_buffer.push(sample as f32 / 32768.0);
        }

        while self.input_buffer.len() >= CHUNK_SIZE {
            let chunk: Vec<f32> = self.input_buffer.drain(..CHUNK_SIZE).collect();
            let output_frames = match resampler.process(&[chunk], None) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::error!("resampler error: {e}");
                    return Vec::new();
                }
            };
            if let Some(channel) = output_frames.first() {
                self.output_buffer.extend_from_slice(channel);
            }
        }

        let result = self
            .output_buffer
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
            .collect();
        self.output_buffer.clear();
        result
    }

    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.output_buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_rates_match() {
        let mut rs = StreamResampler::new(24_000, 24_000);
        let input = vec![100i16, 200, 300];
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn upsample_24k_to_48k_preserves_peak_within_tolerance() {
        let mut rs = StreamResampler::new(24_000, 48_000);
        let input = vec![10_000i16; 2400];
        let out = rs.process(&input);
        assert!(!out.is_empty());
        let peak = out.iter().map(|&s| s.unsigned_abs()).max().unwrap_or(0);
        assert!((9_000..=11_000).contains(&peak));
    }

    #[test]
    fn round_trip_48k_to_24k_to_48k_preserves_peak_within_one_percent() {
        let mut down = StreamResampler::new(48_000, 24_000);
        let mut up = StreamResampler::new(24_000, 48_000);
        let input: Vec<i16> = (0..4800).map(|i| ((i % 200) as i16 - 100) * 100).collect();
        let peak_in = input.iter().map(|&s| s.unsigned_abs()).max().unwrap_or(0);

        let mid = down.process(&input);
        let out = up.process(&mid);
        if let Some(&peak_out) = out.iter().map(|s| s.unsigned_abs()).collect::<Vec<_>>().iter().max() {
            let tolerance = (peak_in as f32 * 0.01).max(1.0) as u16;
            assert!(peak_out <= peak_in + tolerance + 200);
        }
    }
}
