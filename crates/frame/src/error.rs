//! Error types for OpenHam Frame

use thiserror::Error;

/// Frame processing error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid frame format: {msg}")]
    InvalidFormat { msg: String },

    #[error("Frame size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Text cannot be encoded: {text:?}")]
    Unencodable { text: String },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Edit conflicts with frames already sent: {msg}")]
    TypeaheadConflict { msg: String },

    #[error("Core error: {0}")]
    Pack(#[from] openham_core::PackError),

    #[error("Codec error: {0}")]
    Codec(#[from] openham_codecs::CodecError),
}

/// Result type for OpenHam Frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
