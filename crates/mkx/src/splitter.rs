//! Turns Matroska blocks into timed frames.
//!
//! A block carries one or more laced frames sharing a single timestamp.
//! Each frame gets `base + i * D / N`, where `D` is the block duration
//! (explicit, or the track default duration times the frame count) and `N`
//! the number of frames. Without any duration every frame gets `base` and
//! an unknown duration.

use bytes::Bytes;
use matroska::{Block, BlockGroup};

use crate::frame::Frame;

/// Timing and side data of the block group a block came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockGroupContext {
    /// Timestamp of the enclosing cluster, in container ticks.
    pub cluster_timestamp: u64,
    /// Nanoseconds per container tick.
    pub timestamp_scale: u64,
    /// Explicit block duration in container ticks.
    pub duration: Option<u64>,
    /// Codec state replacing the track's codec private data.
    pub codec_state: Option<Bytes>,
    /// Reference block values in container ticks.
    pub references: Vec<i64>,
}

impl BlockGroupContext {
    /// Context for a block outside any block group.
    pub fn new(cluster_timestamp: u64, timestamp_scale: u64) -> Self {
        Self {
            cluster_timestamp,
            timestamp_scale,
            ..Self::default()
        }
    }

    /// Splits a parsed block group into its block and context.
    pub fn from_group(group: BlockGroup, cluster_timestamp: u64, timestamp_scale: u64) -> (Block, Self) {
        let context = Self {
            cluster_timestamp,
            timestamp_scale,
            duration: group.duration,
            codec_state: group.codec_state,
            references: group.references,
        };
        (group.block, context)
    }
}

/// Frames of one block, plus a codec state to deliver before them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitBlock {
    pub codec_state: Option<Bytes>,
    pub frames: Vec<Frame>,
}

/// Absolute block timestamp in nanoseconds, clamped at zero.
pub fn block_timestamp(cluster_timestamp: u64, relative_timestamp: i16, timestamp_scale: u64) -> i64 {
    let ticks = saturating_i64(cluster_timestamp).saturating_add(i64::from(relative_timestamp));
    ticks.max(0).saturating_mul(saturating_i64(timestamp_scale))
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Splits a SimpleBlock. Keyframe and discardable come from the block
/// flags; the duration only from the track default.
pub fn split_simple_block(
    block: Block,
    cluster_timestamp: u64,
    timestamp_scale: u64,
    default_duration: Option<u64>,
) -> SplitBlock {
    let keyframe = block.keyframe;
    let discardable = block.discardable;
    let context = BlockGroupContext::new(cluster_timestamp, timestamp_scale);
    split(block, context, default_duration, keyframe, discardable)
}

/// Splits the block of a BlockGroup. A block without references is a
/// keyframe.
pub fn split_block_group(
    block: Block,
    context: BlockGroupContext,
    default_duration: Option<u64>,
) -> SplitBlock {
    let keyframe = context.references.is_empty();
    split(block, context, default_duration, keyframe, false)
}

fn split(
    block: Block,
    context: BlockGroupContext,
    default_duration: Option<u64>,
    keyframe: bool,
    discardable: bool,
) -> SplitBlock {
    let count = block.frames.len() as i64;
    if count == 0 {
        return SplitBlock::default();
    }

    let scale = saturating_i64(context.timestamp_scale);
    let base = block_timestamp(context.cluster_timestamp, block.relative_timestamp, context.timestamp_scale);

    // an explicit duration that does not fit a non-negative i64 is ignored
    let explicit = context
        .duration
        .and_then(|ticks| i64::try_from(ticks).ok())
        .and_then(|ticks| ticks.checked_mul(scale))
        .filter(|duration| *duration >= 0);

    let (total, derived) = match (explicit, default_duration) {
        (Some(total), _) => (Some(total), false),
        (None, Some(default)) => (Some(saturating_i64(default).saturating_mul(count)), true),
        (None, None) => (None, false),
    };

    let mut bref = None;
    let mut fref = None;
    for reference in context.references.iter().take(2) {
        let offset = reference.saturating_mul(scale);
        if *reference < 0 {
            bref = Some(offset);
        } else {
            fref = Some(offset);
        }
    }

    let frames = block
        .frames
        .into_iter()
        .enumerate()
        .map(|(index, data)| {
            let (timestamp, duration) = match total {
                Some(total) => {
                    let offset = index as i128 * total as i128 / count as i128;
                    let timestamp = (i128::from(base) + offset).min(i128::from(i64::MAX)) as i64;
                    (timestamp, Some(total / count))
                }
                None => (base, None),
            };

            Frame {
                data,
                timestamp,
                duration,
                duration_derived: derived,
                bref,
                fref,
                keyframe,
                discardable,
            }
        })
        .collect();

    SplitBlock {
        codec_state: context.codec_state,
        frames,
    }
}
