//! Error types for AVC stream framing.

use std::io;

use thiserror::Error;

/// Errors that can occur while framing AVC streams.
#[derive(Error, Debug)]
pub enum AvcError {
    /// An I/O error occurred while reading a structure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A NAL unit is larger than the configured output length prefix can
    /// express. Retrying with `required` bytes succeeds.
    #[error("NAL unit needs a {required}-byte length prefix")]
    NaluSizeLengthError {
        /// Smallest usable prefix width in bytes.
        required: u8,
    },

    /// A length prefix points past the end of the buffer.
    #[error("truncated NAL unit: {expected} bytes announced, {available} available")]
    TruncatedNalu {
        /// Announced NAL unit size.
        expected: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// A NAL unit length prefix width outside 1..=4.
    #[error("invalid NAL unit length prefix width: {0}")]
    InvalidNaluSizeLength(u8),

    /// The decoder configuration record is malformed.
    #[error("invalid AVC decoder configuration record: {0}")]
    InvalidConfig(&'static str),
}

/// Result type alias for AVC operations.
pub type Result<T> = std::result::Result<T, AvcError>;
