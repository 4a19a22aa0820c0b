//! Text-to-speech client boundary.
//!
//! The pipeline depends only on [`SynthesisClient`]; [`OpenAiClient`] is the
//! HTTP implementation. Retries for transient failures live here.

mod client;
mod openai;
mod retry;

pub use client::{SynthesisClient, SynthesisError};
pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, with_retry};

#[cfg(test)]
pub(crate) use client::mock::MockClient;
