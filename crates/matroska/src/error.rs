use std::io;

use thiserror::Error;

/// Errors raised while reading Matroska structures.
#[derive(Error, Debug)]
pub enum MatroskaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid EBML variable-length integer at offset {0}")]
    InvalidVint(u64),

    #[error("element {id:#x} at offset {position} is truncated")]
    TruncatedElement { id: u32, position: u64 },

    #[error("element {id:#x} is too large to read into memory ({size} bytes)")]
    ElementTooLarge { id: u32, size: u64 },

    #[error("element {0:#x} has an unknown size where one is required")]
    UnknownSizeUnsupported(u32),

    #[error("container structure missing: {0}")]
    ContainerStructureMissing(&'static str),

    #[error("invalid block: {0}")]
    InvalidBlock(&'static str),

    #[error("invalid lacing: {0}")]
    InvalidLacing(&'static str),

    #[error("invalid {kind} value of {len} bytes in element {id:#x}")]
    InvalidValue {
        id: u32,
        kind: &'static str,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, MatroskaError>;
