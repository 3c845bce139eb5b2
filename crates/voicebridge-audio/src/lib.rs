pub mod capture;
pub mod channel;
pub mod device;
pub mod frame;
pub mod output;
pub mod resampler;
pub mod synth_chunk;

pub use capture::{start_capture, CaptureConfig, CaptureStage};
pub use channel::{drop_oldest_channel, DropOldestReceiver, DropOldestSender};
pub use device::{DeviceInfo, DeviceManager};
pub use frame::{apply_gain, AudioFrame, FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use output::{start_output, OutputConfig, OutputStage};
pub use resampler::StreamResampler;
pub use synth_chunk::{SynthChunk, OUTPUT_SAMPLE_RATE_HZ};
