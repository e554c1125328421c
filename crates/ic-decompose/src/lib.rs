// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! `ic-decompose`
//!
//! The LLM decomposer capability: a text-in, structured-out reasoning
//! call the resolution pipeline falls back to for compound or
//! low-confidence messages.
//!
//! Two implementations ship:
//!
//! - [`EchoDecomposer`] -- a canned-output test double keyed by prompt
//!   prefix, for unit and integration tests that should never touch the
//!   network.
//! - [`HttpDecomposer`] -- the production variant, which posts a JSON
//!   request to a configured hosted-model endpoint.

/// Decomposer configuration.
pub mod config;
/// Canned-output test double.
pub mod echo;
/// Error types for decomposer operations.
pub mod error;
/// `reqwest`-backed production decomposer.
pub mod http;
/// Request/response contract types.
pub mod types;

pub use config::DecomposerConfig;
pub use echo::EchoDecomposer;
pub use error::DecomposerError;
pub use http::HttpDecomposer;
pub use types::{DecomposeInput, DecomposeOutput, DecomposedIntent, MatchHint, CLOSED_TAXONOMY};

use async_trait::async_trait;

/// Capability set for the LLM decomposer: a text-in, structured-out
/// reasoning call. Production variants call a hosted model; test
/// variants return canned outputs by prompt prefix.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Decompose one message into typed intents, constraints, and a
    /// reasoning trace.
    async fn decompose(&self, input: DecomposeInput) -> Result<DecomposeOutput, DecomposerError>;
}
