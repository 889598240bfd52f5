//! Completion gateway errors.

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Unauthorized,
    Transient,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::Transient => "transient",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Errors from a completion gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no credentials configured")]
    NoCredentials,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("upstream error: {0}")]
    Other(String),

    #[error("all {attempts} credentials exhausted, last failure: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<GatewayError>,
    },
}

impl GatewayError {
    /// Map an HTTP status to an attempt failure.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, truncate(body, 200));
        match status {
            429 => Self::RateLimited(message),
            401 | 403 => Self::Unauthorized(message),
            500..=599 | 408 => Self::Transient(message),
            _ => Self::Other(message),
        }
    }

    /// Classification of this failure; for `Exhausted`, of the last attempt.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::Transient(_) => FailureKind::Transient,
            Self::Other(_) | Self::NoCredentials => FailureKind::Other,
            Self::Exhausted { last, .. } => last.kind(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
