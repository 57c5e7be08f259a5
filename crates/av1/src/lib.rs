//! A crate for analysing AV1 bitstreams carried in media containers.
//!
//! Supports:
//! - OBU (Open Bitstream Unit) header parsing and writing
//! - Sequence header OBU parsing (dimensions, color configuration)
//! - Frame boundary and keyframe detection for low-overhead OBU streams
//! - AV1 Codec Configuration Record (`av1C`, Matroska `CodecPrivate`)
//! - IVF file and frame headers
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
pub mod ivf;
mod obu;
pub mod parser;

pub use config::AV1CodecConfigurationRecord;
pub use error::{Av1Error, Result};
pub use obu::utils::{leb128_size, read_leb128, read_uvlc, write_leb128};
pub use obu::{FrameType, ObuExtensionHeader, ObuHeader, ObuType, seq};
pub use parser::{Av1Frame, Av1Parser};
