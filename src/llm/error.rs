//! Tutor model failures
//!
//! Every provider error is folded into one of a few kinds. The kind drives
//! the retry decorator and picks the sentence a student sees in place of
//! the raw provider message.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// Server-requested pause before the next attempt
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classify a non-success HTTP reply by its status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => LlmErrorKind::Auth,
            408 => LlmErrorKind::Network,
            429 => LlmErrorKind::RateLimit,
            400 | 404 | 413 | 422 => LlmErrorKind::InvalidRequest,
            500..=599 => LlmErrorKind::ServerError,
            _ => LlmErrorKind::Unknown,
        };
        Self::new(kind, message)
    }

    #[must_use]
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection refused, reset or timed out
    Network,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// Missing or rejected key, or no model configured at all
    Auth,
    /// The provider refused the request itself
    InvalidRequest,
    Unknown,
}

impl LlmErrorKind {
    /// Transient failures that another attempt may clear
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }

    /// What the student is told to do next. Only transient kinds ask for a resend.
    pub fn student_hint(self) -> &'static str {
        match self {
            Self::Network => "The tutor could not be reached. Check the connection and send the message again.",
            Self::RateLimit => "The tutor is busy right now. Wait a moment and send the message again.",
            Self::ServerError => "The tutor service had a hiccup. Please send the message again.",
            Self::Auth => "The tutor is not set up on this server. Ask your instructor to check the model key.",
            Self::InvalidRequest => "The tutor could not accept this conversation. Try a shorter message or start a new session.",
            Self::Unknown => "Something went wrong talking to the tutor. Send the message again, or ask your instructor if it keeps happening.",
        }
    }
}
