//! The background generation capability
//!
//! The engine only sees the `Generator` trait; real model clients live
//! behind it. The scripted and failing implementations here drive the
//! demo binary and the test suite.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::dialogue::segment::DialogueSegment;
use crate::generate::request::{GenerateError, GenerationRequest};
use crate::history::ChatTurn;

/// A slow, possibly unreliable text-generation call
///
/// Runs on a background thread; may block and may take arbitrarily
/// long. Timeout handling is the implementation's own responsibility
/// (report it as `GenerateError::Timeout`).
pub trait Generator: Send + Sync {
    /// Produce the dialogue segments for one request
    fn generate(
        &self,
        request: &GenerationRequest,
        history: &[ChatTurn],
    ) -> Result<Vec<DialogueSegment>, GenerateError>;
}

/// Deterministic offline backend: pops canned responses in order, then
/// repeats a fallback
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Vec<DialogueSegment>>>,
    fallback: Vec<DialogueSegment>,
}

impl ScriptedGenerator {
    /// Create with a fallback response used once the script runs out
    pub fn new(fallback: Vec<DialogueSegment>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    /// Queue the next scripted response
    pub fn push_response(&self, segments: Vec<DialogueSegment>) {
        self.responses.lock().push_back(segments);
    }
}

impl Generator for ScriptedGenerator {
    fn generate(
        &self,
        _request: &GenerationRequest,
        _history: &[ChatTurn],
    ) -> Result<Vec<DialogueSegment>, GenerateError> {
        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Test double: fails a fixed number of times, then succeeds
pub struct FailingGenerator {
    remaining_failures: Mutex<u32>,
    error: GenerateError,
    success: Vec<DialogueSegment>,
    attempts: AtomicU32,
}

impl FailingGenerator {
    /// Fail `failures` times with `error`, then return `success`
    pub fn new(failures: u32, error: GenerateError, success: Vec<DialogueSegment>) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
            error,
            success,
            attempts: AtomicU32::new(0),
        }
    }

    /// Total calls made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Generator for FailingGenerator {
    fn generate(
        &self,
        _request: &GenerationRequest,
        _history: &[ChatTurn],
    ) -> Result<Vec<DialogueSegment>, GenerateError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.remaining_failures.lock();
        if *remaining > 0 {
            *remaining -= 1;
            Err(self.error.clone())
        } else {
            Ok(self.success.clone())
        }
    }
}
