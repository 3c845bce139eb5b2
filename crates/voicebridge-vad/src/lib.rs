pub mod detector;
pub mod stage;
pub mod state;
pub mod types;

pub use detector::{EnergyDetector, SpeechDetector};
pub use stage::run_vad_stage;
pub use state::UtteranceSegmenter;
pub use types::Utterance;
