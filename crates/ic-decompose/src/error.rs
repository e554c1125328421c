// SPDX-License-Identifier: MIT OR Apache-2.0
use thiserror::Error;

/// Errors a [`crate::Decomposer`] implementation may return. The pipeline
/// maps every variant onto [`ic_core::IntentError::UpstreamTimeout`] or
/// [`ic_core::IntentError::UpstreamUnavailable`] before returning to a
/// caller; these are the decomposer crate's internal, more specific view.
#[derive(Debug, Error)]
pub enum DecomposerError {
    /// The request did not complete within the configured timeout.
    #[error("decomposer call timed out")]
    Timeout,

    /// The endpoint could not be reached at all.
    #[error("decomposer endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint responded, but the payload did not parse to the
    /// expected schema, or named an intent code outside the closed
    /// taxonomy. Never retried.
    #[error("decomposer response failed validation: {0}")]
    InvalidResponse(String),
}
