//! Generation requests, outcomes, and error classification

use std::path::PathBuf;

use thiserror::Error;

use crate::dialogue::segment::DialogueSegment;

/// A single generation request; exactly one may be in flight
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System/topic prompt
    pub prompt: String,
    /// The user's typed input, when the exchange is user-initiated
    pub user_input: Option<String>,
    /// Optional screenshot attachment
    pub screenshot_path: Option<PathBuf>,
    /// Whether this is the mandatory session-opening greeting
    pub is_initial_greeting: bool,
}

impl GenerationRequest {
    /// The mandatory session-opening greeting
    pub fn greeting(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            user_input: None,
            screenshot_path: None,
            is_initial_greeting: true,
        }
    }

    /// A user-initiated exchange
    pub fn from_user(prompt: &str, input: &str, screenshot: Option<PathBuf>) -> Self {
        Self {
            prompt: prompt.to_string(),
            user_input: Some(input.to_string()),
            screenshot_path: screenshot,
            is_initial_greeting: false,
        }
    }

    /// An unprompted self-speak exchange
    pub fn self_initiated(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            user_input: None,
            screenshot_path: None,
            is_initial_greeting: false,
        }
    }
}

/// Classified generation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// Transient: the service asked us to slow down
    #[error("rate limited by the generation service")]
    RateLimited,
    /// Transient: the service is unavailable
    #[error("generation service error: {0}")]
    ServerError(String),
    /// The background call gave up waiting
    #[error("generation request timed out")]
    Timeout,
    /// The request itself was rejected
    #[error("bad generation request: {0}")]
    BadRequest(String),
    /// Credential rejected
    #[error("invalid credential for the generation service")]
    InvalidCredential,
    /// The configured model does not exist
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// The response could not be parsed into segments
    #[error("malformed generation output: {0}")]
    MalformedOutput(String),
    /// The service refused to answer
    #[error("content blocked by the generation service")]
    Blocked,
}

impl GenerateError {
    /// Whether automatic backoff retry is appropriate before involving
    /// the user
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerateError::RateLimited | GenerateError::ServerError(_))
    }

    /// Short user-facing description, distinct per kind
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerateError::RateLimited => "I'm being told to slow down... give me a moment?",
            GenerateError::ServerError(_) => "I can't reach my brain right now.",
            GenerateError::Timeout => "That took too long and I gave up waiting.",
            GenerateError::BadRequest(_) => "Something about that request didn't go through.",
            GenerateError::InvalidCredential => "My credentials were rejected.",
            GenerateError::ModelNotFound(_) => "The model I rely on seems to be missing.",
            GenerateError::MalformedOutput(_) => "I lost my train of thought mid-sentence.",
            GenerateError::Blocked => "I'd rather not answer that one.",
        }
    }
}

/// The result of one dispatched request, produced exactly once
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Segments ready for the dialogue queue
    Success(Vec<DialogueSegment>),
    /// Terminal failure (internal retries already exhausted)
    Failure(GenerateError),
}
