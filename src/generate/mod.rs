//! Asynchronous text generation
//!
//! One request at a time goes to a background worker; the main loop
//! polls for the outcome each tick and never blocks. Transient failures
//! are retried with exponential backoff inside the worker; terminal
//! failures surface as a Retry/Cancel choice. A randomized idle timer
//! lets the companion start exchanges on its own.

pub mod backend;
pub mod coordinator;
pub mod request;
pub mod selfspeak;

pub use backend::{FailingGenerator, Generator, ScriptedGenerator};
pub use coordinator::{
    BackoffPolicy, CompletedGeneration, GenerationCoordinator, RetryChoice, RetryResolution,
    RetryState,
};
pub use request::{GenerateError, GenerationOutcome, GenerationRequest};
pub use selfspeak::{pick_topic, SelfSpeakSchedule};
