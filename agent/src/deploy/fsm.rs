//! Finite State Machine for a single image upload

use serde::{Deserialize, Serialize};

/// Upload state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Parsing the command payload
    Decoding,

    /// Asking the control plane for registry credentials
    FetchingCredential,

    /// Retagging the user image for the registry
    Tagging,

    /// Authenticating to the registry
    LoggingIn,

    /// Pushing, with retry
    Pushing,

    /// Reporting success to the control plane
    NotifyingSuccess,

    /// Upload finished and reported
    Done,

    /// Stopped at the first fatal error
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed)
    }
}

/// Upload event
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The current stage finished successfully
    Advance,

    /// The current stage failed
    Fail(String),
}

/// Upload FSM.
///
/// Stages run in a fixed order and none is revisited.
#[derive(Debug, Clone)]
pub struct UploadFsm {
    state: UploadState,
    failed_in: Option<UploadState>,
    error: Option<String>,
}

impl UploadFsm {
    /// Create a new FSM in decoding state
    pub fn new() -> Self {
        Self {
            state: UploadState::Decoding,
            failed_in: None,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Stage that was running when the upload failed
    pub fn failed_in(&self) -> Option<UploadState> {
        self.failed_in
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: UploadEvent) -> Result<UploadState, String> {
        let new_state = match (self.state, &event) {
            (state, _) if state.is_terminal() => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }

            (state, UploadEvent::Fail(err)) => {
                self.failed_in = Some(state);
                self.error = Some(err.clone());
                UploadState::Failed
            }

            (UploadState::Decoding, UploadEvent::Advance) => UploadState::FetchingCredential,
            (UploadState::FetchingCredential, UploadEvent::Advance) => UploadState::Tagging,
            (UploadState::Tagging, UploadEvent::Advance) => UploadState::LoggingIn,
            (UploadState::LoggingIn, UploadEvent::Advance) => UploadState::Pushing,
            (UploadState::Pushing, UploadEvent::Advance) => UploadState::NotifyingSuccess,
            (UploadState::NotifyingSuccess, UploadEvent::Advance) => UploadState::Done,

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for UploadFsm {
    fn default() -> Self {
        Self::new()
    }
}
