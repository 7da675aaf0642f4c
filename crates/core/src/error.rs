//! Error types for OpenHam Core

use thiserror::Error;

/// Bit packing error types
///
/// Every packer is total on its documented domain; values outside it are
/// reported here instead of being silently mangled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("Invalid callsign: {value}")]
    InvalidCallsign { value: String },

    #[error("Invalid grid locator: {value}")]
    InvalidGrid { value: String },

    #[error("Number {value} outside {min}..={max}")]
    NumberOutOfRange { value: i32, min: i32, max: i32 },

    #[error("Invalid power level: {dbm} dBm")]
    InvalidPower { dbm: u8 },

    #[error("Value {value} does not fit in {bits} bits")]
    ValueTooWide { value: u64, bits: usize },

    #[error("Invalid encoding: {msg}")]
    InvalidEncoding { msg: String },

    #[error("Bit length mismatch: expected {expected}, got {actual}")]
    BitLengthMismatch { expected: usize, actual: usize },

    #[error("Unknown submode: {name}")]
    UnknownSubmode { name: String },
}

/// Result type for OpenHam Core operations
pub type Result<T> = std::result::Result<T, PackError>;
