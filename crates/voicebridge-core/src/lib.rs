//! Orchestrator crate (spec.md §4.7): wires every stage crate together,
//! owns their lifecycles, and supervises pipeline mode and the
//! passthrough fallback path.

pub mod orchestrator;
pub mod router;
pub mod session_log;
pub mod tracing_init;

pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use router::run_passthrough_router;
pub use session_log::{template_path, SessionLog, SessionLogRecord};
pub use tracing_init::init_tracing;
