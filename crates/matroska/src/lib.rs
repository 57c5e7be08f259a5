//! Minimal Matroska/EBML reader.
//!
//! This crate reads just enough of a Matroska file to extract tracks: EBML
//! element headers, the segment information, the track table, clusters with
//! their blocks (including all lacing modes), chapters and tags. Everything
//! else is skipped unread.
//!
//! [`SegmentWalker`] drives a seekable reader through the first segment and
//! yields [`SegmentEvent`]s in file order.
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

pub mod block;
pub mod chapters;
pub mod ebml;
pub mod error;
pub mod ids;
pub mod info;
pub mod tags;
pub mod tracks;
pub mod walker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use block::{Block, BlockGroup, Lacing};
pub use chapters::{ChapterAtom, ChapterDisplay, EditionEntry};
pub use ebml::ElementHeader;
pub use error::{MatroskaError, Result};
pub use info::SegmentInfo;
pub use tags::{SimpleTag, Tag, TagTargets};
pub use tracks::{AudioSettings, TrackEntry, TrackType, VideoSettings};
pub use walker::{SegmentEvent, SegmentWalker};
