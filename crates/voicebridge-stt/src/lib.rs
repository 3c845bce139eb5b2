pub mod client;
pub mod mock;
pub mod reconcile;
pub mod stage;
pub mod types;
pub mod ws_client;

pub use client::{RecognizerClient, RecognizerEvent, RecognizerSession, RecognizerSessionParams};
pub use reconcile::InterimReconciler;
pub use stage::run_stt_stage;
pub use types::{Transcript, WordTiming};
