//! Pipeline mode state machine (spec.md §4.7).
//!
//! Shaped after the teacher's `coldvox-foundation::state::StateManager`: an
//! `RwLock`-guarded current state plus a broadcast of transitions, with
//! transitions validated against an explicit allow-list rather than set
//! unconditionally.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{ErrorKind, VoiceBridgeError};

/// Why the pipeline is in `Passthrough`, carried so the health snapshot can
/// report "mode=passthrough with reason=stt" per spec.md §8 scenario 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    Stt,
    Translator,
    Tts,
    OutputDevice,
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    TtsFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMode {
    Active,
    Degraded(DegradedReason),
    Passthrough(PassthroughReason),
}

pub struct ModeManager {
    state: Arc<RwLock<PipelineMode>>,
}

impl Default for ModeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PipelineMode::Active)),
        }
    }

    pub fn current(&self) -> PipelineMode {
        self.state.read().clone()
    }

    /// Validates the transition against the diagram in spec.md §4.7 before
    /// applying it. Invalid transitions are a caller bug, not a runtime
    /// fault, so they are reported but do not panic.
    pub fn transition(&self, new_mode: PipelineMode) -> Result<(), VoiceBridgeError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_mode),
            (PipelineMode::Active, PipelineMode::Passthrough(_))
                | (PipelineMode::Active, PipelineMode::Degraded(_))
                | (PipelineMode::Degraded(_), PipelineMode::Active)
                | (PipelineMode::Degraded(_), PipelineMode::Passthrough(_))
                | (PipelineMode::Passthrough(_), PipelineMode::Active)
        );

        if !valid {
            return Err(VoiceBridgeError::Fatal(format!(
                "invalid pipeline mode transition: {:?} -> {:?}",
                *current, new_mode
            )));
        }

        info!(from = ?*current, to = ?new_mode, "pipeline mode transition");
        *current = new_mode;
        Ok(())
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(*self.state.read(), PipelineMode::Passthrough(_))
    }
}

/// Maps a classified error to the mode transition it should trigger, per the
/// propagation table in spec.md §7.
pub fn mode_for_fatal_error(kind: ErrorKind, reason: PassthroughReason) -> Option<PipelineMode> {
    match kind {
        ErrorKind::Configuration => None,
        ErrorKind::Device | ErrorKind::Transport | ErrorKind::Semantic => {
            Some(PipelineMode::Passthrough(reason))
        }
        ErrorKind::Starvation => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_to_passthrough_is_valid() {
        let mgr = ModeManager::new();
        assert!(mgr
            .transition(PipelineMode::Passthrough(PassthroughReason::Stt))
            .is_ok());
        assert!(mgr.is_passthrough());
    }

    #[test]
    fn passthrough_to_degraded_is_invalid() {
        let mgr = ModeManager::new();
        mgr.transition(PipelineMode::Passthrough(PassthroughReason::Stt))
            .unwrap();
        let result = mgr.transition(PipelineMode::Degraded(DegradedReason::TtsFallback));
        assert!(result.is_err());
    }

    #[test]
    fn degraded_recovers_to_active() {
        let mgr = ModeManager::new();
        mgr.transition(PipelineMode::Degraded(DegradedReason::TtsFallback))
            .unwrap();
        assert!(mgr.transition(PipelineMode::Active).is_ok());
        assert_eq!(mgr.current(), PipelineMode::Active);
    }
}
