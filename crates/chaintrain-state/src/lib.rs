//! # chaintrain-state — Registration Pipeline State Machine
//!
//! A dataset upload moves through a fixed sequence of stages:
//!
//! ```text
//! idle → chunking → uploading → merkle → proof → registering → complete
//!            └──────────┴─────────┴───────┴──────────┴──→ failed
//! ```
//!
//! `failed` is reachable from every running stage. `complete` and `failed`
//! are terminal: a new upload starts a fresh [`RegistrationRun`] at `idle`.
//! Transitions are checked at runtime and rejected with
//! [`StateError::InvalidTransition`]; every accepted transition and progress
//! event is appended to the run's log.

pub mod registration;

pub use registration::{
    ProgressEvent, RegistrationRun, RegistrationState, StateError, TransitionRecord,
    MAX_PROGRESS_EVENTS,
};
