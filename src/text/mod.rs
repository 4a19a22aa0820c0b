//! Text preparation for speech synthesis.
//!
//! Strips light Markdown syntax and splits the result into request-sized chunks.

mod chunker;
mod normalize;

pub use chunker::{DEFAULT_MAX_CHARS, chunk_text};
pub use normalize::normalize;
