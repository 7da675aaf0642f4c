//! Error types for OpenHam Codecs

use thiserror::Error;

/// Codec error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No dictionary entry is a prefix of the text at `position`
    #[error("No dictionary entry for {word:?} at position {position}")]
    LookupMiss { position: usize, word: String },

    #[error("Character {ch:?} is not in the codec alphabet")]
    Unrepresentable { ch: char },

    #[error("Decoding failed: {msg}")]
    DecodingFailed { msg: String },

    #[error("Core error: {0}")]
    Pack(#[from] openham_core::PackError),
}

/// Result type for OpenHam Codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
