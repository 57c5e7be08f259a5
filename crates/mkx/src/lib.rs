//! Matroska track extraction engine.
//!
//! Walks a Matroska file once and writes every requested track into its
//! own file: AV1 into IVF, AVC into an Annex B elementary stream, text
//! subtitles into SRT, little-endian PCM into WAV and several audio codecs
//! as raw streams. Tracks writing the same raw format may share one output
//! file. Cue sheets can be written from the chapters and tags of the file.
//!
//! ## Component Overview
//!
//! - `extract`: the run itself, from segment events to the final report
//! - `splitter`: timestamps, durations and references of laced frames
//! - `registry`: codec ID to extractor mapping
//! - `extractors`: the built-in output containers
//! - `output`: output files shared between extractors
//! - `cuesheet`: cue sheets from chapters and tags
//!
//! ## Example
//!
//! ```no_run
//! use mkx_engine::{ExtractConfig, TrackSpec, extract_file};
//!
//! let specs = vec!["1:video.ivf".parse::<TrackSpec>()?, "2:audio.ac3".parse::<TrackSpec>()?];
//! let report = extract_file("movie.mkv".as_ref(), specs, ExtractConfig::default())?;
//! assert!(report.is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]

pub mod config;
pub mod cuesheet;
pub mod error;
pub mod extract;
pub mod extractor;
pub mod extractors;
pub mod frame;
pub mod output;
pub mod registry;
pub mod spec;
pub mod splitter;

pub use config::ExtractConfig;
pub use error::{ExtractError, Result, TrackError, TrackResult};
pub use extract::{ExtractReport, Extraction, TrackFailure, TrackSummary, extract_file};
pub use extractor::{Extractor, ExtractorState};
pub use frame::Frame;
pub use output::{FileId, OutputArena, OutputSink};
pub use registry::Registry;
pub use spec::{ParseTrackSpecError, TrackSpec};
pub use splitter::{BlockGroupContext, SplitBlock};
