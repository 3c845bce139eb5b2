pub mod backoff;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod mode;

pub use backoff::{Backoff, BackoffParams};
pub use cancel::CancelSignal;
pub use clock::{Clock, RealClock, SharedClock, TestClock};
pub use config::{ConfigError, VoiceBridgeConfig};
pub use error::{ErrorKind, VoiceBridgeError};
pub use mode::{mode_for_fatal_error, DegradedReason, ModeManager, PassthroughReason, PipelineMode};
