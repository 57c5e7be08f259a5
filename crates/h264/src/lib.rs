//! A crate for framing H.264/AVC elementary streams stored with
//! length-prefixed NAL units, as found in Matroska and ISOBMFF.
//!
//! Supports:
//! - AVC Decoder Configuration Record (`avcC`) parsing and writing
//! - NAL unit header classification and `first_mb_in_slice` peeking
//! - Access unit assembly with keyframe detection and timestamp assignment
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod config;
pub mod error;
mod nal;
pub mod parser;

pub use config::AVCDecoderConfigurationRecord;
pub use error::{AvcError, Result};
pub use nal::{NalUnitType, first_mb_in_slice, required_nalu_size_length};
pub use parser::{AvcFrame, AvcParser, DEFAULT_FRAME_DURATION};
