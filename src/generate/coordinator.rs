//! Generation dispatch, polling, and bounded retry
//!
//! At most one request is ever in flight. The worker thread talks back
//! through a single-slot channel that the main loop polls every tick;
//! the main loop never waits on it. Retryable failures are retried with
//! exponential backoff inside the worker, invisibly to the UI, up to a
//! fixed attempt ceiling. Only after exhaustion (or a non-retryable
//! failure) does the user see a Retry/Cancel choice.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, TryRecvError};

use crate::generate::backend::Generator;
use crate::generate::request::{GenerateError, GenerationOutcome, GenerationRequest};
use crate::history::ChatTurn;

/// Exponential backoff settings for in-worker retries
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// First retry delay in milliseconds; doubles per retry
    pub base_ms: u64,
    /// Total attempt ceiling (1 initial + N-1 retries)
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            max_attempts: 4,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry_index` (0-based): base * 2^n
    pub fn delay(&self, retry_index: u32) -> Duration {
        let factor = 1u64 << retry_index.min(16);
        Duration::from_millis(self.base_ms.saturating_mul(factor))
    }
}

/// Exists between a terminal failure and the user's Retry/Cancel choice
#[derive(Debug, Clone)]
pub struct RetryState {
    /// The exact request to re-dispatch on Retry
    pub last_request: GenerationRequest,
    /// The failure being shown to the user
    pub error: GenerateError,
}

/// The user's answer to a surfaced failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryChoice {
    Retry,
    Cancel,
}

/// What resolving the choice led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryResolution {
    /// The prior request went back out
    Redispatched,
    /// Cancelled a normal exchange; back to user input
    ReturnToInput,
    /// Cancelled the mandatory greeting; the session ends
    EndSession,
}

/// A finished request paired with its outcome
#[derive(Debug)]
pub struct CompletedGeneration {
    /// The request that produced this outcome
    pub request: GenerationRequest,
    /// Success or classified failure
    pub outcome: GenerationOutcome,
}

/// Owns the single in-flight generation request
pub struct GenerationCoordinator {
    generator: Arc<dyn Generator>,
    backoff: BackoffPolicy,
    in_flight: bool,
    slot: Option<Receiver<GenerationOutcome>>,
    current: Option<GenerationRequest>,
    retry: Option<RetryState>,
}

impl GenerationCoordinator {
    /// Create a coordinator around a generation backend
    pub fn new(generator: Arc<dyn Generator>, backoff: BackoffPolicy) -> Self {
        Self {
            generator,
            backoff,
            in_flight: false,
            slot: None,
            current: None,
            retry: None,
        }
    }

    /// Whether a request is currently outstanding
    pub fn has_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether a failure awaits the user's Retry/Cancel decision
    pub fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    /// The pending failure, if any
    pub fn retry_state(&self) -> Option<&RetryState> {
        self.retry.as_ref()
    }

    /// Send a request to the background worker
    ///
    /// Rejected (returns false, logs) while another request is in
    /// flight or while a failure awaits resolution; a second dispatch
    /// is never queued.
    pub fn dispatch(&mut self, request: GenerationRequest, history: Vec<ChatTurn>) -> bool {
        if self.in_flight {
            log::warn!("generation dispatch rejected: a request is already in flight");
            return false;
        }
        if self.retry.is_some() {
            log::warn!("generation dispatch rejected: a failure awaits Retry/Cancel");
            return false;
        }

        let (tx, rx) = bounded::<GenerationOutcome>(1);
        let generator = Arc::clone(&self.generator);
        let worker_request = request.clone();
        let backoff = self.backoff;

        let spawned = thread::Builder::new()
            .name("patter-generate".to_string())
            .spawn(move || {
                let outcome = run_attempts(&*generator, &worker_request, &history, backoff);
                // The main loop may have gone away during shutdown
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(_) => {
                self.slot = Some(rx);
                self.current = Some(request);
                self.in_flight = true;
                true
            }
            Err(err) => {
                log::error!("failed to spawn generation worker: {}", err);
                false
            }
        }
    }

    /// Non-blocking check of the result slot; call once per tick
    ///
    /// On a terminal failure the coordinator stores `RetryState` so the
    /// UI can offer the Retry/Cancel choice.
    pub fn poll(&mut self) -> Option<CompletedGeneration> {
        let rx = self.slot.as_ref()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                log::error!("generation worker died without reporting an outcome");
                GenerationOutcome::Failure(GenerateError::ServerError(
                    "worker terminated unexpectedly".to_string(),
                ))
            }
        };

        self.slot = None;
        self.in_flight = false;
        let request = match self.current.take() {
            Some(request) => request,
            None => {
                // Cannot happen while dispatch pairs slot with current
                log::error!("outcome arrived with no recorded request");
                return None;
            }
        };

        if let GenerationOutcome::Failure(error) = &outcome {
            self.retry = Some(RetryState {
                last_request: request.clone(),
                error: error.clone(),
            });
        }

        Some(CompletedGeneration { request, outcome })
    }

    /// Apply the user's Retry/Cancel decision
    ///
    /// Returns None when no failure was pending.
    pub fn resolve_retry(
        &mut self,
        choice: RetryChoice,
        history: Vec<ChatTurn>,
    ) -> Option<RetryResolution> {
        let state = self.retry.take()?;
        match choice {
            RetryChoice::Retry => {
                log::info!("user chose retry; re-dispatching prior request");
                if self.dispatch(state.last_request.clone(), history) {
                    Some(RetryResolution::Redispatched)
                } else {
                    // Dispatch cannot be busy here; restore and report
                    self.retry = Some(state);
                    None
                }
            }
            RetryChoice::Cancel => {
                if state.last_request.is_initial_greeting {
                    log::info!("user cancelled the initial greeting; ending session");
                    Some(RetryResolution::EndSession)
                } else {
                    log::info!("user cancelled a failed exchange");
                    Some(RetryResolution::ReturnToInput)
                }
            }
        }
    }
}

/// Worker-side attempt loop: retry retryable failures with exponential
/// backoff up to the ceiling, then report whatever happened last.
fn run_attempts(
    generator: &dyn Generator,
    request: &GenerationRequest,
    history: &[ChatTurn],
    backoff: BackoffPolicy,
) -> GenerationOutcome {
    let mut attempt = 0u32;
    loop {
        match generator.generate(request, history) {
            Ok(segments) => return GenerationOutcome::Success(segments),
            Err(err) if err.is_retryable() && attempt + 1 < backoff.max_attempts => {
                let delay = backoff.delay(attempt);
                log::warn!(
                    "retryable generation failure ({}); retry {} in {:?}",
                    err,
                    attempt + 1,
                    delay
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                log::error!("generation failed terminally: {}", err);
                return GenerationOutcome::Failure(err);
            }
        }
    }
}
