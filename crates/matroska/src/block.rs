//! Block and SimpleBlock headers, lacing and BlockGroup children.

use bytes::Bytes;

use crate::ebml::{Children, decode_vint, read_sint, read_uint};
use crate::error::{MatroskaError, Result};
use crate::ids;

const FLAG_KEYFRAME: u8 = 0x80;
const FLAG_INVISIBLE: u8 = 0x08;
const FLAG_DISCARDABLE: u8 = 0x01;
const LACING_MASK: u8 = 0x06;

/// Lacing mode, bits 1-2 of the block flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    None,
    Xiph,
    Fixed,
    Ebml,
}

impl From<u8> for Lacing {
    fn from(flags: u8) -> Self {
        match flags & LACING_MASK {
            0x02 => Lacing::Xiph,
            0x04 => Lacing::Fixed,
            0x06 => Lacing::Ebml,
            _ => Lacing::None,
        }
    }
}

/// A Block or SimpleBlock with its laced frames split apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub track_number: u64,
    /// Timestamp relative to the cluster, in ticks.
    pub relative_timestamp: i16,
    /// Only meaningful for SimpleBlocks.
    pub keyframe: bool,
    pub invisible: bool,
    /// Only meaningful for SimpleBlocks.
    pub discardable: bool,
    pub lacing: Lacing,
    pub frames: Vec<Bytes>,
}

impl Block {
    /// Parses a SimpleBlock body, honouring its keyframe and discardable flags.
    pub fn parse_simple(data: Bytes) -> Result<Self> {
        Self::parse(data, true)
    }

    /// Parses the body of a `Block` inside a BlockGroup.
    pub fn parse_grouped(data: Bytes) -> Result<Self> {
        Self::parse(data, false)
    }

    fn parse(data: Bytes, simple: bool) -> Result<Self> {
        let (track_number, track_len) =
            decode_vint(&data).ok_or(MatroskaError::InvalidBlock("bad track number"))?;

        let header_len = track_len + 3;
        if data.len() < header_len {
            return Err(MatroskaError::InvalidBlock("header is truncated"));
        }

        let relative_timestamp = i16::from_be_bytes([data[track_len], data[track_len + 1]]);
        let flags = data[track_len + 2];
        let lacing = Lacing::from(flags);

        let frames = split_laced_frames(data.slice(header_len..), lacing)?;

        Ok(Block {
            track_number,
            relative_timestamp,
            keyframe: simple && flags & FLAG_KEYFRAME != 0,
            invisible: flags & FLAG_INVISIBLE != 0,
            discardable: simple && flags & FLAG_DISCARDABLE != 0,
            lacing,
            frames,
        })
    }
}

/// Track number of a Block or SimpleBlock body, read without decoding the
/// rest of the block.
pub fn block_track_number(data: &[u8]) -> Option<u64> {
    decode_vint(data).map(|(number, _)| number)
}

/// Reads the lace header: returns its length and the sizes of all frames
/// but the last.
fn lace_sizes(payload: &[u8], lacing: Lacing) -> Result<(usize, Vec<usize>)> {
    if lacing == Lacing::None {
        return Ok((0, Vec::new()));
    }

    let count = usize::from(
        *payload
            .first()
            .ok_or(MatroskaError::InvalidLacing("missing frame count"))?,
    ) + 1;
    let mut pos = 1;
    let mut sizes = LaceSizes::new(payload.len(), count);

    match lacing {
        Lacing::Xiph => {
            for _ in 1..count {
                let mut size = 0usize;
                loop {
                    let byte = *payload
                        .get(pos)
                        .ok_or(MatroskaError::InvalidLacing("truncated Xiph lace sizes"))?;
                    pos += 1;
                    size += usize::from(byte);
                    if byte != 0xff {
                        break;
                    }
                }
                sizes.push(size, pos)?;
            }
        }
        Lacing::Ebml if count > 1 => {
            let truncated = MatroskaError::InvalidLacing("truncated EBML lace sizes");
            let (first, len) = decode_vint(&payload[pos..]).ok_or(truncated)?;
            pos += len;
            let mut size = to_lace_size(first as i64)?;
            sizes.push(size, pos)?;

            for _ in 2..count {
                let (raw, len) = decode_vint(&payload[pos..])
                    .ok_or(MatroskaError::InvalidLacing("truncated EBML lace sizes"))?;
                pos += len;
                // signed deltas carry a bias of 2^(7n-1) - 1
                let bias = (1i64 << (7 * len - 1)) - 1;
                size = to_lace_size(size as i64 + raw as i64 - bias)?;
                sizes.push(size, pos)?;
            }
        }
        Lacing::Fixed => {
            let total = payload.len() - pos;
            if total % count != 0 {
                return Err(MatroskaError::InvalidLacing(
                    "fixed lacing payload is not evenly divisible",
                ));
            }
            for _ in 1..count {
                sizes.push(total / count, pos)?;
            }
        }
        Lacing::Ebml | Lacing::None => {}
    }

    Ok((pos, sizes.sizes))
}

/// Frame sizes with a running total that never exceeds the payload.
struct LaceSizes {
    payload_len: usize,
    total: usize,
    sizes: Vec<usize>,
}

impl LaceSizes {
    fn new(payload_len: usize, count: usize) -> Self {
        Self {
            payload_len,
            total: 0,
            sizes: Vec::with_capacity(count),
        }
    }

    /// `header_end` is the lace header length read so far.
    fn push(&mut self, size: usize, header_end: usize) -> Result<()> {
        self.total = self
            .total
            .checked_add(size)
            .filter(|total| *total <= self.payload_len.saturating_sub(header_end))
            .ok_or(MatroskaError::InvalidLacing("lace sizes exceed the block"))?;
        self.sizes.push(size);
        Ok(())
    }
}

/// Splits a block payload into frames according to `lacing`.
fn split_laced_frames(payload: Bytes, lacing: Lacing) -> Result<Vec<Bytes>> {
    let (mut pos, mut sizes) = lace_sizes(&payload, lacing)?;

    let used = sizes
        .iter()
        .try_fold(0usize, |total, size| total.checked_add(*size));
    let last = used
        .and_then(|used| (payload.len() - pos).checked_sub(used))
        .ok_or(MatroskaError::InvalidLacing("lace sizes exceed the block"))?;
    sizes.push(last);

    let mut frames = Vec::with_capacity(sizes.len());
    for size in sizes {
        frames.push(payload.slice(pos..pos + size));
        pos += size;
    }

    Ok(frames)
}

fn to_lace_size(size: i64) -> Result<usize> {
    usize::try_from(size).map_err(|_| MatroskaError::InvalidLacing("negative EBML lace size"))
}

/// A BlockGroup with the children the extractor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGroup {
    pub block: Block,
    /// Explicit duration in ticks.
    pub duration: Option<u64>,
    /// `ReferenceBlock` values in ticks; negative values point backwards.
    pub references: Vec<i64>,
    pub codec_state: Option<Bytes>,
}

impl BlockGroup {
    pub fn parse(body: Bytes) -> Result<Self> {
        let mut block = None;
        let mut duration = None;
        let mut references = Vec::new();
        let mut codec_state = None;

        for child in Children::new(body) {
            let (id, data) = child?;
            match id {
                ids::BLOCK => block = Some(Block::parse_grouped(data)?),
                ids::BLOCK_DURATION => duration = Some(read_uint(id, &data)?),
                ids::REFERENCE_BLOCK => references.push(read_sint(id, &data)?),
                ids::CODEC_STATE => codec_state = Some(data),
                _ => {}
            }
        }

        Ok(BlockGroup {
            block: block.ok_or(MatroskaError::InvalidBlock("BlockGroup without a Block"))?,
            duration,
            references,
            codec_state,
        })
    }

    /// Track number of the Block inside a BlockGroup body.
    pub fn track_number(body: &Bytes) -> Option<u64> {
        Children::new(body.clone())
            .map_while(|child| child.ok())
            .find(|(id, _)| *id == ids::BLOCK)
            .and_then(|(_, data)| block_track_number(&data))
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{binary_element, block_body, sint_element, uint_element};

    fn frame_lengths(block: &Block) -> Vec<usize> {
        block.frames.iter().map(|f| f.len()).collect()
    }

    #[test]
    fn test_simple_block_without_lacing() {
        let body = block_body(3, -5, 0x81, &[0xAA, 0xBB]);
        let block = Block::parse_simple(Bytes::from(body)).unwrap();
        insta::assert_debug_snapshot!(block, @r#"
        Block {
            track_number: 3,
            relative_timestamp: -5,
            keyframe: true,
            invisible: false,
            discardable: true,
            lacing: None,
            frames: [
                b"\xaa\xbb",
            ],
        }
        "#);
    }

    #[test]
    fn test_grouped_block_ignores_simple_flags() {
        let block = Block::parse_grouped(Bytes::from(block_body(1, 0, 0x81, b"x"))).unwrap();
        assert!(!block.keyframe);
        assert!(!block.discardable);
    }

    #[test]
    fn test_xiph_lacing() {
        // three frames of 300, 2 and 4 bytes
        let mut payload = vec![2, 0xff, 45, 2];
        payload.extend(std::iter::repeat_n(1u8, 300));
        payload.extend_from_slice(&[2; 2]);
        payload.extend_from_slice(&[3; 4]);

        let block = Block::parse_simple(Bytes::from(block_body(1, 0, 0x02, &payload))).unwrap();
        assert_eq!(block.lacing, Lacing::Xiph);
        assert_eq!(frame_lengths(&block), vec![300, 2, 4]);
        assert_eq!(block.frames[2].as_ref(), &[3u8; 4]);
    }

    #[test]
    fn test_ebml_lacing() {
        // sizes 10, 12 (+2), 9 (-3), last 5
        let mut payload = vec![3, 0x8a, 0xbf + 2, 0xbf - 3];
        payload.extend(std::iter::repeat_n(0u8, 10 + 12 + 9 + 5));

        let block = Block::parse_simple(Bytes::from(block_body(1, 0, 0x06, &payload))).unwrap();
        assert_eq!(block.lacing, Lacing::Ebml);
        assert_eq!(frame_lengths(&block), vec![10, 12, 9, 5]);
    }

    #[test]
    fn test_fixed_lacing() {
        let mut payload = vec![2];
        payload.extend_from_slice(b"aabbcc");
        let block = Block::parse_simple(Bytes::from(block_body(1, 0, 0x04, &payload))).unwrap();
        assert_eq!(block.lacing, Lacing::Fixed);
        assert_eq!(frame_lengths(&block), vec![2, 2, 2]);
        assert_eq!(block.frames[1].as_ref(), b"bb");

        let mut uneven = vec![1];
        uneven.extend_from_slice(b"abc");
        assert!(matches!(
            Block::parse_simple(Bytes::from(block_body(1, 0, 0x04, &uneven))),
            Err(MatroskaError::InvalidLacing(_))
        ));
    }

    #[test]
    fn test_lace_sizes_exceed_block() {
        let payload = vec![1, 50, 1, 2, 3];
        assert!(matches!(
            Block::parse_simple(Bytes::from(block_body(1, 0, 0x02, &payload))),
            Err(MatroskaError::InvalidLacing("lace sizes exceed the block"))
        ));
        assert!(matches!(
            Block::parse_simple(Bytes::from_static(&[0x81, 0x00])),
            Err(MatroskaError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_huge_ebml_lace_sizes_rejected() {
        // 256 frames whose sizes are each close to 2^56
        let mut payload = vec![0xff];
        for _ in 0..255 {
            payload.extend_from_slice(&[0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]);
        }

        assert!(matches!(
            Block::parse_simple(Bytes::from(block_body(1, 0, 0x06, &payload))),
            Err(MatroskaError::InvalidLacing("lace sizes exceed the block"))
        ));
    }

    #[test]
    fn test_track_number_of_corrupt_blocks() {
        let body = block_body(7, 0, 0x02, &[3, 50]);
        assert!(Block::parse_simple(Bytes::from(body.clone())).is_err());
        assert_eq!(block_track_number(&body), Some(7));

        let group = Bytes::from(
            [
                uint_element(ids::BLOCK_DURATION, 1),
                binary_element(ids::BLOCK, &body),
            ]
            .concat(),
        );
        assert!(BlockGroup::parse(group.clone()).is_err());
        assert_eq!(BlockGroup::track_number(&group), Some(7));
        assert_eq!(BlockGroup::track_number(&Bytes::from(uint_element(ids::BLOCK_DURATION, 1))), None);
    }

    #[test]
    fn test_block_group() {
        let body = [
            binary_element(ids::BLOCK, &block_body(2, 10, 0x00, b"frame")),
            uint_element(ids::BLOCK_DURATION, 30),
            sint_element(ids::REFERENCE_BLOCK, -40),
            sint_element(ids::REFERENCE_BLOCK, 0),
            binary_element(ids::CODEC_STATE, b"state"),
        ]
        .concat();

        let group = BlockGroup::parse(Bytes::from(body)).unwrap();
        assert_eq!(group.block.track_number, 2);
        assert_eq!(group.block.relative_timestamp, 10);
        assert_eq!(group.duration, Some(30));
        assert_eq!(group.references, vec![-40, 0]);
        assert_eq!(group.codec_state.as_deref(), Some(&b"state"[..]));

        assert!(matches!(
            BlockGroup::parse(Bytes::from(uint_element(ids::BLOCK_DURATION, 1))),
            Err(MatroskaError::InvalidBlock(_))
        ));
    }
}
