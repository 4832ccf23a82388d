//! # Registration Run
//!
//! [`RegistrationState`] is the runtime state enum; [`RegistrationRun`] holds
//! one upload's current state together with its transition log and progress
//! events, which the API exposes for polling.

use std::collections::VecDeque;

use chaintrain_core::{Timestamp, UploadId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// Nothing started yet.
    Idle,
    /// Splitting the file into chunks.
    Chunking,
    /// Storing chunks and the manifest in the blob store.
    Uploading,
    /// Computing the Merkle root.
    Merkle,
    /// Generating the dataset proof.
    Proof,
    /// Submitting to the ledger and awaiting finality.
    Registering,
    /// Registered and catalogued.
    Complete,
    /// Aborted; nothing was persisted.
    Failed,
}

impl RegistrationState {
    /// Every state, in pipeline order.
    pub const ALL: [RegistrationState; 8] = [
        Self::Idle,
        Self::Chunking,
        Self::Uploading,
        Self::Merkle,
        Self::Proof,
        Self::Registering,
        Self::Complete,
        Self::Failed,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Chunking => "chunking",
            Self::Uploading => "uploading",
            Self::Merkle => "merkle",
            Self::Proof => "proof",
            Self::Registering => "registering",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Parse a canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [RegistrationState] {
        match self {
            Self::Idle => &[Self::Chunking],
            Self::Chunking => &[Self::Uploading, Self::Failed],
            Self::Uploading => &[Self::Merkle, Self::Failed],
            Self::Merkle => &[Self::Proof, Self::Failed],
            Self::Proof => &[Self::Registering, Self::Failed],
            Self::Registering => &[Self::Complete, Self::Failed],
            Self::Complete | Self::Failed => &[],
        }
    }

    /// Whether `self → to` is allowed.
    pub fn can_transition_to(&self, to: RegistrationState) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Attempted transition is not allowed.
    #[error("invalid registration transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: RegistrationState,
        /// Attempted target state.
        to: RegistrationState,
    },
}

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before.
    pub from_state: RegistrationState,
    /// State after.
    pub to_state: RegistrationState,
    /// When it happened.
    pub timestamp: Timestamp,
    /// Failure reason, for transitions into `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A progress message emitted while a stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage that emitted the event.
    pub state: RegistrationState,
    /// Human-readable message, e.g. `chunk 3/10 stored`.
    pub message: String,
    /// Stage-local completion percentage, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    /// When it was emitted.
    pub timestamp: Timestamp,
}

/// Progress events kept per run; older ones are dropped first.
pub const MAX_PROGRESS_EVENTS: usize = 512;

/// One upload's pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRun {
    /// Upload identifier.
    pub upload_id: UploadId,
    /// Current stage.
    pub state: RegistrationState,
    /// Accepted transitions, oldest first.
    pub transition_log: Vec<TransitionRecord>,
    /// Most recent progress events, oldest first, at most
    /// [`MAX_PROGRESS_EVENTS`].
    pub events: VecDeque<ProgressEvent>,
    /// Events evicted from the front of `events`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub events_dropped: u64,
    /// Failure reason once `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the run was created.
    pub started_at: Timestamp,
}

impl RegistrationRun {
    /// A fresh run at `idle`.
    pub fn new(upload_id: UploadId) -> Self {
        Self {
            upload_id,
            state: RegistrationState::Idle,
            transition_log: Vec::new(),
            events: VecDeque::new(),
            events_dropped: 0,
            error: None,
            started_at: Timestamp::now(),
        }
    }

    /// Move to `to`, or reject the transition without changing anything.
    pub fn try_transition(&mut self, to: RegistrationState) -> Result<(), StateError> {
        self.transition(to, None)
    }

    /// Move to `failed` with a reason. Rejected from `idle` and terminal
    /// states.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), StateError> {
        let reason = reason.into();
        self.transition(RegistrationState::Failed, Some(reason.clone()))?;
        self.error = Some(reason);
        Ok(())
    }

    fn transition(
        &mut self,
        to: RegistrationState,
        reason: Option<String>,
    ) -> Result<(), StateError> {
        if !self.state.can_transition_to(to) {
            return Err(StateError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.transition_log.push(TransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: Timestamp::now(),
            reason,
        });
        self.state = to;
        Ok(())
    }

    /// Append a progress event for the current stage.
    pub fn record_progress(&mut self, message: impl Into<String>, percent: Option<u8>) {
        if self.events.len() == MAX_PROGRESS_EVENTS {
            self.events.pop_front();
            self.events_dropped += 1;
        }
        self.events.push_back(ProgressEvent {
            state: self.state,
            message: message.into(),
            percent: percent.map(|p| p.min(100)),
            timestamp: Timestamp::now(),
        });
    }

    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistrationState::*;

    fn run() -> RegistrationRun {
        RegistrationRun::new(UploadId::new("u1").unwrap())
    }

    #[test]
    fn happy_path() {
        let mut r = run();
        for s in [Chunking, Uploading, Merkle, Proof, Registering, Complete] {
            r.try_transition(s).unwrap();
        }
        assert!(r.is_terminal());
        assert_eq!(r.transition_log.len(), 6);
        assert_eq!(r.transition_log[0].from_state, Idle);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut r = run();
        r.try_transition(Chunking).unwrap();
        let err = r.try_transition(Merkle).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: Chunking,
                to: Merkle
            }
        );
        assert_eq!(r.state, Chunking);
        assert_eq!(err.to_string(), "invalid registration transition: chunking -> merkle");
    }

    #[test]
    fn failure_from_every_running_state() {
        for stop in [Chunking, Uploading, Merkle, Proof, Registering] {
            let mut r = run();
            for s in [Chunking, Uploading, Merkle, Proof, Registering] {
                r.try_transition(s).unwrap();
                if s == stop {
                    break;
                }
            }
            r.fail("blob store unavailable").unwrap();
            assert_eq!(r.state, Failed);
            assert_eq!(r.error.as_deref(), Some("blob store unavailable"));
        }
    }

    #[test]
    fn idle_and_terminal_cannot_fail() {
        let mut r = run();
        assert!(r.fail("x").is_err());
        r.try_transition(Chunking).unwrap();
        r.fail("x").unwrap();
        assert!(r.fail("again").is_err());
        assert!(r.try_transition(Chunking).is_err());
    }

    #[test]
    fn names_roundtrip() {
        for s in RegistrationState::ALL {
            assert_eq!(RegistrationState::from_name(s.as_str()), Some(s));
            assert_eq!(serde_json::to_value(s).unwrap(), s.as_str());
        }
        assert_eq!(RegistrationState::from_name("bogus"), None);
    }

    #[test]
    fn progress_events_are_tagged_with_stage() {
        let mut r = run();
        r.try_transition(Chunking).unwrap();
        r.try_transition(Uploading).unwrap();
        r.record_progress("chunk 1/2 stored", Some(50));
        r.record_progress("chunk 2/2 stored", Some(150));
        assert_eq!(r.events.len(), 2);
        assert_eq!(r.events[0].state, Uploading);
        assert_eq!(r.events[1].percent, Some(100));
    }

    #[test]
    fn progress_log_is_bounded() {
        let mut r = run();
        r.try_transition(Chunking).unwrap();
        let total = MAX_PROGRESS_EVENTS + 10;
        for i in 0..total {
            r.record_progress(format!("chunk {}/{total} stored", i + 1), None);
        }
        assert_eq!(r.events.len(), MAX_PROGRESS_EVENTS);
        assert_eq!(r.events_dropped, 10);
        assert_eq!(r.events[0].message, format!("chunk 11/{total} stored"));
        assert_eq!(
            r.events.back().unwrap().message,
            format!("chunk {total}/{total} stored")
        );
    }
}
