use std::{io, path::PathBuf};

use av1::Av1Error;
use h264::AvcError;
use matroska::MatroskaError;
use thiserror::Error;

/// Errors that end the extraction of a single track. Sibling tracks keep
/// going.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("extraction of codec `{0}` is not supported")]
    UnsupportedCodec(String),

    #[error("track has no codec ID")]
    MissingCodecId,

    #[error("output `{path}` is already used by a {master} track and cannot be shared")]
    OutputConflict { path: PathBuf, master: &'static str },

    #[error("invalid codec private data: {0}")]
    InvalidCodecPrivate(String),

    #[error("AV1 bitstream error: {0}")]
    Av1(#[from] Av1Error),

    #[error("AVC bitstream error: {0}")]
    Avc(#[from] AvcError),

    #[error("corrupt block at offset {position}: {reason}")]
    CorruptBlock { position: u64, reason: String },

    #[error("extractor state error: {0}")]
    State(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("container error: {0}")]
    Container(#[from] MatroskaError),

    #[error("cannot read input `{path}`: {source}")]
    Input { path: PathBuf, source: io::Error },

    #[error("cannot write output `{path}`: {source}")]
    Output { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type TrackResult<T> = std::result::Result<T, TrackError>;

pub type Result<T> = std::result::Result<T, ExtractError>;
