use bytes::Bytes;

/// One frame handed to an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload, sharing the buffer of the block it came from.
    pub data: Bytes,
    /// Timestamp in nanoseconds.
    pub timestamp: i64,
    /// Duration in nanoseconds, `None` when unknown.
    pub duration: Option<i64>,
    /// Whether `duration` was derived from the track default duration.
    pub duration_derived: bool,
    /// Backward reference relative to this frame, in nanoseconds.
    pub bref: Option<i64>,
    /// Forward reference relative to this frame, in nanoseconds.
    pub fref: Option<i64>,
    pub keyframe: bool,
    pub discardable: bool,
}
