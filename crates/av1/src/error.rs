//! Error types for AV1 bitstream analysis.

use std::io;

use thiserror::Error;

/// Errors that can occur while analysing AV1 bitstreams and IVF headers.
#[derive(Error, Debug)]
pub enum Av1Error {
    /// An I/O error other than running out of input occurred.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Fewer bits remain than a read requested; the stream is truncated.
    #[error("buffer exhausted: the bitstream is truncated")]
    BufferExhausted,

    /// A variable-length integer did not terminate or overflowed.
    #[error("malformed variable-length integer: {0}")]
    MalformedLength(&'static str),

    /// The OBU sequence is structurally invalid.
    #[error("encountered OBUs with invalid data: {0}")]
    InvalidStructure(String),

    /// An OBU without `obu_has_size_field` was encountered.
    #[error("raw OBUs without a size field are not supported")]
    RawObuUnsupported,

    /// Invalid IVF file signature (expected `"DKIF"`).
    #[error("invalid IVF signature: expected \"DKIF\", got {0:?}")]
    InvalidIvfSignature([u8; 4]),

    /// Invalid IVF codec FourCC (expected `"AV01"` or `"av01"`).
    #[error("invalid IVF codec: expected \"AV01\" or \"av01\", got {0:?}")]
    InvalidIvfCodec([u8; 4]),

    /// Unsupported IVF version.
    #[error("unsupported IVF version: {0}")]
    UnsupportedIvfVersion(u16),

    /// Invalid IVF timebase (zero numerator or denominator).
    #[error("invalid IVF timebase: {numerator}/{denominator}")]
    InvalidIvfTimebase {
        /// Timebase numerator.
        numerator: u32,
        /// Timebase denominator.
        denominator: u32,
    },
}

impl From<io::Error> for Av1Error {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Av1Error::BufferExhausted,
            _ => Av1Error::Io(error),
        }
    }
}

/// Result type alias for AV1 operations.
pub type Result<T> = std::result::Result<T, Av1Error>;

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_buffer_exhausted() {
        let err = Av1Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, Av1Error::BufferExhausted));

        let err = Av1Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(err, Av1Error::Io(_)));
    }
}
