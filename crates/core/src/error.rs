// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classified error surface shared by the control planes.
//!
//! Adapter and turn failures are folded into a [`ClassifiedError`] so callers
//! can decide on retry (`retryable`) and thread hygiene (`needs_reset`)
//! without parsing provider-specific messages. Cancellation is not an error
//! and never appears here; it travels as a distinct control path.

use serde::{Deserialize, Serialize};

/// Stable error code reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or rejected input; no state was mutated.
    InvalidInput,
    /// Subprocess or turn deadline exceeded.
    Timeout,
    /// Output stream hit its byte cap.
    OutputTruncated,
    /// Agent-side protocol or provider failure.
    AgentProtocol,
    RateLimited,
    Unauthorized,
    /// Lock acquisition timed out.
    LockTimeout,
    /// State conflict (non-pending edit, queue running, duplicate attachment).
    Conflict,
    NotFound,
    Internal,
}

crate::simple_display! {
    ErrorCode {
        InvalidInput => "invalid_input",
        Timeout => "timeout",
        OutputTruncated => "output_truncated",
        AgentProtocol => "agent_protocol",
        RateLimited => "rate_limited",
        Unauthorized => "unauthorized",
        LockTimeout => "lock_timeout",
        Conflict => "conflict",
        NotFound => "not_found",
        Internal => "internal",
    }
}

/// An error classified for retry policy and user display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub retryable: bool,
    /// The caller should clear the agent thread before retrying.
    pub needs_reset: bool,
    pub original_error: String,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, original_error: impl Into<String>) -> Self {
        let original_error = original_error.into();
        let retryable = matches!(
            code,
            ErrorCode::Timeout | ErrorCode::RateLimited | ErrorCode::AgentProtocol
        );
        Self { code, retryable, needs_reset: false, original_error }
    }

    pub fn with_needs_reset(mut self) -> Self {
        self.needs_reset = true;
        self
    }

    pub fn not_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    /// Classify a raw provider/adapter message by recognizable signatures.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("rate limit") || lower.contains("429") || lower.contains("overloaded") {
            Self::new(ErrorCode::RateLimited, message)
        } else if lower.contains("unauthorized")
            || lower.contains("401")
            || lower.contains("invalid api key")
        {
            Self::new(ErrorCode::Unauthorized, message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::new(ErrorCode::Timeout, message)
        } else if lower.contains("thread not found") || lower.contains("no conversation") {
            // Stale thread id: retry only makes sense after a reset.
            Self::new(ErrorCode::AgentProtocol, message).with_needs_reset()
        } else {
            Self::new(ErrorCode::AgentProtocol, message)
        }
    }

    /// One-line hint suitable for a WS error payload.
    pub fn user_hint(&self) -> String {
        match self.code {
            ErrorCode::RateLimited => "The agent is rate limited; try again shortly.".to_string(),
            ErrorCode::Unauthorized => "Agent credentials were rejected.".to_string(),
            ErrorCode::Timeout => "The operation timed out.".to_string(),
            ErrorCode::LockTimeout => "The project is busy; try again.".to_string(),
            _ if self.needs_reset => {
                "The agent thread is stale; reset the conversation and retry.".to_string()
            }
            _ => self.original_error.clone(),
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.original_error)
    }
}

impl std::error::Error for ClassifiedError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
