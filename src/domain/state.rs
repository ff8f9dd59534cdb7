//! Controller state machine (mutation guard)
//!
//! At most one mutating workflow runs at a time: a second request arriving
//! while one is in flight is rejected with [`BusyError`], never queued and
//! never interleaved, because interleaving would hand out segment ids out
//! of order. Renaming a session is deliberately not guarded.

use std::fmt;

use thiserror::Error;

/// Controller states
///
/// State machine:
///   IDLE -> RECORDING      (begin_recording)
///   RECORDING -> TRANSCRIBING (begin_transcribing)
///   RECORDING -> IDLE      (cancel_recording)
///   TRANSCRIBING -> IDLE   (finish)
///   IDLE -> RETRANSCRIBING (begin_retranscribe)
///   RETRANSCRIBING -> IDLE (finish)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Recording,
    Transcribing,
    /// Bulk re-transcription in flight, `done` of `total` segments finished
    Retranscribing { done: usize, total: usize },
}

impl ControllerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Retranscribing { .. } => "retranscribing",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retranscribing { done, total } => {
                write!(f, "retranscribing ({done} of {total})")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Rejection of a mutating request while another is in flight
#[derive(Debug, Clone, Error)]
#[error("busy: cannot {action} while {state}")]
pub struct BusyError {
    pub state: ControllerState,
    pub action: &'static str,
}

/// Guard enforcing single-flight execution of mutating workflows
#[derive(Debug, Default)]
pub struct MutationGuard {
    state: ControllerState,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ControllerState::Idle
    }

    fn busy(&self, action: &'static str) -> BusyError {
        BusyError {
            state: self.state,
            action,
        }
    }

    /// IDLE -> RECORDING
    pub fn begin_recording(&mut self) -> Result<(), BusyError> {
        if self.state != ControllerState::Idle {
            return Err(self.busy("start recording"));
        }
        self.state = ControllerState::Recording;
        Ok(())
    }

    /// RECORDING -> TRANSCRIBING
    pub fn begin_transcribing(&mut self) -> Result<(), BusyError> {
        if self.state != ControllerState::Recording {
            return Err(self.busy("stop recording"));
        }
        self.state = ControllerState::Transcribing;
        Ok(())
    }

    /// RECORDING -> IDLE (discard the capture, no segment committed)
    pub fn cancel_recording(&mut self) -> Result<(), BusyError> {
        if self.state != ControllerState::Recording {
            return Err(self.busy("cancel recording"));
        }
        self.state = ControllerState::Idle;
        Ok(())
    }

    /// IDLE -> RETRANSCRIBING
    pub fn begin_retranscribe(&mut self, total: usize) -> Result<(), BusyError> {
        if self.state != ControllerState::Idle {
            return Err(self.busy("retranscribe"));
        }
        self.state = ControllerState::Retranscribing { done: 0, total };
        Ok(())
    }

    /// Bump the per-segment progress of a bulk re-transcription
    pub fn advance_retranscribe(&mut self) {
        if let ControllerState::Retranscribing { done, total } = self.state {
            self.state = ControllerState::Retranscribing {
                done: done + 1,
                total,
            };
        }
    }

    /// Return to IDLE from any in-flight state, including error paths
    pub fn finish(&mut self) {
        self.state = ControllerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_guard_is_idle() {
        let guard = MutationGuard::new();
        assert!(guard.is_idle());
        assert_eq!(guard.state(), ControllerState::Idle);
    }

    #[test]
    fn happy_path_cycle() {
        let mut guard = MutationGuard::new();
        assert!(guard.begin_recording().is_ok());
        assert_eq!(guard.state(), ControllerState::Recording);
        assert!(guard.begin_transcribing().is_ok());
        assert_eq!(guard.state(), ControllerState::Transcribing);
        guard.finish();
        assert!(guard.is_idle());
    }

    #[test]
    fn second_recording_is_rejected() {
        let mut guard = MutationGuard::new();
        guard.begin_recording().unwrap();
        let err = guard.begin_recording().unwrap_err();
        assert_eq!(err.state, ControllerState::Recording);
    }

    #[test]
    fn retranscribe_while_recording_is_rejected() {
        let mut guard = MutationGuard::new();
        guard.begin_recording().unwrap();
        assert!(guard.begin_retranscribe(3).is_err());
    }

    #[test]
    fn recording_while_retranscribing_is_rejected() {
        let mut guard = MutationGuard::new();
        guard.begin_retranscribe(2).unwrap();
        assert!(guard.begin_recording().is_err());
        guard.advance_retranscribe();
        assert_eq!(
            guard.state(),
            ControllerState::Retranscribing { done: 1, total: 2 }
        );
        guard.finish();
        assert!(guard.is_idle());
    }

    #[test]
    fn cancel_only_from_recording() {
        let mut guard = MutationGuard::new();
        assert!(guard.cancel_recording().is_err());
        guard.begin_recording().unwrap();
        assert!(guard.cancel_recording().is_ok());
        assert!(guard.is_idle());
    }

    #[test]
    fn stop_without_recording_is_rejected() {
        let mut guard = MutationGuard::new();
        assert!(guard.begin_transcribing().is_err());
    }

    #[test]
    fn busy_error_names_state_and_action() {
        let mut guard = MutationGuard::new();
        guard.begin_recording().unwrap();
        let err = guard.begin_retranscribe(1).unwrap_err();
        assert_eq!(err.to_string(), "busy: cannot retranscribe while recording");
    }
}
