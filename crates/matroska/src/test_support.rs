//! Shared Matroska test builders.
//!
//! This module is available for local matroska tests and optionally for
//! downstream crate tests when the `test-utils` feature is enabled.

use crate::ids;

const DOC_TYPE: u32 = 0x4282;

pub fn encode_id(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(3);
    bytes[skip..].to_vec()
}

/// Shortest vint holding `size`; the all-ones value stays reserved.
pub fn encode_size(size: u64) -> Vec<u8> {
    let len = (1..=8usize)
        .find(|len| size < (1u64 << (7 * len)) - 1)
        .unwrap_or(8);
    let marked = size | (1u64 << (7 * len));
    marked.to_be_bytes()[8 - len..].to_vec()
}

pub fn element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend_from_slice(&encode_size(body.len() as u64));
    out.extend_from_slice(body);
    out
}

pub fn master(id: u32, children: &[Vec<u8>]) -> Vec<u8> {
    element(id, &children.concat())
}

/// A master element written with the reserved unknown size.
pub fn unknown_size_master(id: u32, children: &[Vec<u8>]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend_from_slice(&[0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    out.extend_from_slice(&children.concat());
    out
}

pub fn uint_element(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    element(id, &bytes[skip..])
}

pub fn sint_element(id: u32, value: i64) -> Vec<u8> {
    match i16::try_from(value) {
        Ok(short) => element(id, &short.to_be_bytes()),
        Err(_) => element(id, &value.to_be_bytes()),
    }
}

pub fn float_element(id: u32, value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub fn string_element(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

pub fn binary_element(id: u32, value: &[u8]) -> Vec<u8> {
    element(id, value)
}

/// Block header (track number, relative timestamp, flags) plus payload.
pub fn block_body(track: u64, relative_timestamp: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = encode_size(track);
    out.extend_from_slice(&relative_timestamp.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(payload);
    out
}

pub fn simple_block(track: u64, relative_timestamp: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    element(
        ids::SIMPLE_BLOCK,
        &block_body(track, relative_timestamp, flags, payload),
    )
}

/// Xiph lace header followed by the frames.
pub fn xiph_laced(frames: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![(frames.len() - 1) as u8];
    for frame in &frames[..frames.len() - 1] {
        let mut size = frame.len();
        while size >= 0xff {
            out.push(0xff);
            size -= 0xff;
        }
        out.push(size as u8);
    }
    for frame in frames {
        out.extend_from_slice(frame);
    }
    out
}

pub fn block_group(
    track: u64,
    relative_timestamp: i16,
    flags: u8,
    payload: &[u8],
    duration: Option<u64>,
    references: &[i64],
) -> Vec<u8> {
    let mut children = vec![binary_element(
        ids::BLOCK,
        &block_body(track, relative_timestamp, flags, payload),
    )];
    if let Some(duration) = duration {
        children.push(uint_element(ids::BLOCK_DURATION, duration));
    }
    for reference in references {
        children.push(sint_element(ids::REFERENCE_BLOCK, *reference));
    }
    master(ids::BLOCK_GROUP, &children)
}

pub fn ebml_header() -> Vec<u8> {
    master(ids::EBML, &[string_element(DOC_TYPE, "matroska")])
}

pub fn cluster(timestamp: u64, children: &[Vec<u8>]) -> Vec<u8> {
    let mut all = vec![uint_element(ids::TIMESTAMP, timestamp)];
    all.extend_from_slice(children);
    master(ids::CLUSTER, &all)
}

pub fn info(timestamp_scale: u64) -> Vec<u8> {
    master(ids::INFO, &[uint_element(ids::TIMESTAMP_SCALE, timestamp_scale)])
}

pub fn tracks(entries: &[Vec<u8>]) -> Vec<u8> {
    master(ids::TRACKS, entries)
}

/// Complete file: EBML header followed by one segment.
pub fn matroska_file(segment_children: &[Vec<u8>]) -> Vec<u8> {
    [ebml_header(), master(ids::SEGMENT, segment_children)].concat()
}

/// Builder for `TrackEntry` elements.
pub struct TrackBuilder {
    children: Vec<Vec<u8>>,
}

impl TrackBuilder {
    pub fn new(number: u64, track_type: u64, codec_id: &str) -> Self {
        let mut children = vec![
            uint_element(ids::TRACK_NUMBER, number),
            uint_element(ids::TRACK_TYPE, track_type),
        ];
        if !codec_id.is_empty() {
            children.push(string_element(ids::CODEC_ID, codec_id));
        }
        Self { children }
    }

    pub fn uid(self, uid: u64) -> Self {
        self.child(uint_element(ids::TRACK_UID, uid))
    }

    pub fn default_duration(self, duration: u64) -> Self {
        self.child(uint_element(ids::DEFAULT_DURATION, duration))
    }

    pub fn codec_private(self, data: &[u8]) -> Self {
        self.child(binary_element(ids::CODEC_PRIVATE, data))
    }

    pub fn name(self, name: &str) -> Self {
        self.child(string_element(ids::NAME, name))
    }

    pub fn child(mut self, child: Vec<u8>) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> Vec<u8> {
        master(ids::TRACK_ENTRY, &self.children)
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_encode_size() {
        assert_eq!(encode_size(0), vec![0x80]);
        assert_eq!(encode_size(126), vec![0xfe]);
        assert_eq!(encode_size(127), vec![0x40, 0x7f]);
        assert_eq!(encode_id(ids::TRACK_ENTRY), vec![0xae]);
        assert_eq!(encode_id(ids::CLUSTER), vec![0x1f, 0x43, 0xb6, 0x75]);
    }
}
