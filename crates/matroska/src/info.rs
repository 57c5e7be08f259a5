use bytes::Bytes;

use crate::ebml::{Children, read_float, read_string, read_uint};
use crate::error::Result;
use crate::ids;

/// Default nanoseconds per timestamp tick.
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

/// The subset of the segment `Info` element used during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per timestamp tick.
    pub timestamp_scale: u64,
    /// Duration in ticks.
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            duration: None,
            title: None,
            muxing_app: None,
            writing_app: None,
        }
    }
}

impl SegmentInfo {
    pub fn parse(body: Bytes) -> Result<Self> {
        let mut info = SegmentInfo::default();

        for child in Children::new(body) {
            let (id, data) = child?;
            match id {
                ids::TIMESTAMP_SCALE => {
                    // A zero scale would collapse every timestamp.
                    info.timestamp_scale = read_uint(id, &data)?.max(1);
                }
                ids::DURATION => info.duration = Some(read_float(id, &data)?),
                ids::TITLE => info.title = Some(read_string(&data)),
                ids::MUXING_APP => info.muxing_app = Some(read_string(&data)),
                ids::WRITING_APP => info.writing_app = Some(read_string(&data)),
                _ => {}
            }
        }

        Ok(info)
    }

    /// Duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<u64> {
        self.duration
            .map(|ticks| (ticks * self.timestamp_scale as f64) as u64)
    }
}
