// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Stable error taxonomy for the intent resolution core.
//!
//! Every [`IntentError`] carries a machine-readable [`ErrorCode`] in
//! `SCREAMING_SNAKE_CASE`, suitable for mapping onto a transport status code
//! without transport code ever needing to match on the error message text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable, stable error code.
///
/// Serializes to `SCREAMING_SNAKE_CASE` and is guaranteed not to change
/// spelling across patch releases — clients may match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No credential/tenant identifier was supplied.
    AuthMissing,
    /// The supplied tenant identifier does not resolve to a known tenant.
    AuthInvalid,
    /// The tenant resolves but has been deactivated.
    AuthInactive,
    /// The request was rejected by the rate limiter.
    RateLimited,
    /// The input failed structural or length validation.
    Validation,
    /// A referenced job or tenant id does not exist.
    NotFound,
    /// A batch submission exceeded the tenant's `max_batch_size`.
    BatchTooLarge,
    /// The batch queue is over its depth threshold.
    BatchBackpressure,
    /// An upstream dependency (LLM, vector store) did not respond in time.
    UpstreamTimeout,
    /// An upstream dependency is unreachable.
    UpstreamUnavailable,
    /// An unexpected internal error occurred.
    Internal,
}

impl ErrorCode {
    /// The stable string form of this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthMissing => "AUTH_MISSING",
            Self::AuthInvalid => "AUTH_INVALID",
            Self::AuthInactive => "AUTH_INACTIVE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::BatchTooLarge => "BATCH_TOO_LARGE",
            Self::BatchBackpressure => "BATCH_BACKPRESSURE",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stable error taxonomy returned by every public operation in the core.
///
/// Callers never see a bare string error: every failure mode the pipeline,
/// rate limiter, tenant store, or batch engine can produce is represented
/// here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, thiserror::Error)]
#[serde(tag = "kind")]
pub enum IntentError {
    /// No tenant identifier was supplied with the request.
    #[error("missing tenant credential")]
    AuthMissing,

    /// The tenant identifier does not match any known tenant.
    #[error("invalid tenant credential")]
    AuthInvalid,

    /// The tenant exists but is deactivated.
    #[error("tenant is inactive")]
    AuthInactive,

    /// The request was denied by the rate limiter.
    #[error("rate limited, retry after {retry_after_secs:.3}s")]
    RateLimited {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: f64,
    },

    /// The input failed validation (empty text, oversized payload, etc).
    #[error("validation failed: {reason}")]
    Validation {
        /// Human-readable description of what failed validation.
        reason: String,
    },

    /// A referenced resource (job, tenant) does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },

    /// A batch submission exceeded the tenant's configured maximum size.
    #[error("batch too large: {got} items, max is {max}")]
    BatchTooLarge {
        /// The tenant's configured maximum batch size.
        max: usize,
        /// The number of items actually submitted.
        got: usize,
    },

    /// The batch queue has exceeded its configured depth threshold.
    #[error("batch queue is backpressured, retry after {retry_after_secs:.3}s")]
    BatchBackpressure {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: f64,
    },

    /// An upstream dependency did not respond within its configured timeout.
    #[error("timed out waiting on upstream: {upstream}")]
    UpstreamTimeout {
        /// Name of the upstream dependency that timed out.
        upstream: String,
    },

    /// An upstream dependency could not be reached at all.
    #[error("upstream unavailable: {upstream}")]
    UpstreamUnavailable {
        /// Name of the upstream dependency that was unreachable.
        upstream: String,
    },

    /// An unexpected internal error. Always logged with a trace id upstream.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description for logs (never shown verbatim to end users).
        message: String,
    },
}

impl IntentError {
    /// The stable, transport-mappable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthMissing => ErrorCode::AuthMissing,
            Self::AuthInvalid => ErrorCode::AuthInvalid,
            Self::AuthInactive => ErrorCode::AuthInactive,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::BatchTooLarge { .. } => ErrorCode::BatchTooLarge,
            Self::BatchBackpressure { .. } => ErrorCode::BatchBackpressure,
            Self::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            Self::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// The `retry_after` hint in seconds, if this error kind carries one.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::BatchBackpressure { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Shorthand for a validation error with the given reason.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for an internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_stable_code() {
        let cases: &[(IntentError, &str)] = &[
            (IntentError::AuthMissing, "AUTH_MISSING"),
            (IntentError::AuthInvalid, "AUTH_INVALID"),
            (IntentError::AuthInactive, "AUTH_INACTIVE"),
            (
                IntentError::RateLimited {
                    retry_after_secs: 1.0,
                },
                "RATE_LIMITED",
            ),
            (IntentError::validation("empty text"), "VALIDATION"),
            (
                IntentError::NotFound {
                    what: "job".into(),
                },
                "NOT_FOUND",
            ),
            (
                IntentError::BatchTooLarge { max: 10, got: 11 },
                "BATCH_TOO_LARGE",
            ),
            (
                IntentError::BatchBackpressure {
                    retry_after_secs: 2.0,
                },
                "BATCH_BACKPRESSURE",
            ),
            (
                IntentError::UpstreamTimeout {
                    upstream: "decomposer".into(),
                },
                "UPSTREAM_TIMEOUT",
            ),
            (
                IntentError::UpstreamUnavailable {
                    upstream: "catalog".into(),
                },
                "UPSTREAM_UNAVAILABLE",
            ),
            (IntentError::internal("boom"), "INTERNAL"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code().as_str(), *code);
        }
    }

    #[test]
    fn rate_limit_denials_always_carry_a_positive_retry_after() {
        let err = IntentError::RateLimited {
            retry_after_secs: 3.5,
        };
        assert!(err.retry_after_secs().unwrap() > 0.0);
    }

    #[test]
    fn round_trips_through_json() {
        let err = IntentError::BatchTooLarge { max: 2000, got: 2001 };
        let json = serde_json::to_string(&err).unwrap();
        let back: IntentError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code().as_str(), err.code().as_str());
    }
}
