//! Error types for OpenHam Modem

use thiserror::Error;

/// Modem error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModemError {
    #[error("Invalid parameters: {msg}")]
    InvalidParameters { msg: String },

    #[error("Modulation failed: {msg}")]
    ModulationFailed { msg: String },

    #[error("Decode {id} still running after {elapsed_secs} s")]
    DecoderTimeout { id: u64, elapsed_secs: u64 },

    #[error("Decode worker is not running")]
    WorkerStopped,

    #[error("Core error: {0}")]
    Core(#[from] openham_core::PackError),

    #[error("Frame error: {0}")]
    Frame(#[from] openham_frame::FrameError),
}

/// Result type for OpenHam Modem operations
pub type Result<T> = std::result::Result<T, ModemError>;
