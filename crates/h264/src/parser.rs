//! Access unit assembly for length-prefixed AVC streams.

use std::collections::VecDeque;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{AvcError, Result};
use crate::nal::{NalUnitType, first_mb_in_slice, max_nalu_size, required_nalu_size_length};

/// Frame duration used when neither the caller nor the stream provides one,
/// in nanoseconds (25 fps).
pub const DEFAULT_FRAME_DURATION: i64 = 40_000_000;

/// A complete access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcFrame {
    /// NAL units, each prefixed with `nalu_size_length` big-endian bytes.
    pub data: Bytes,
    /// Width of the length prefixes in `data`.
    pub nalu_size_length: u8,
    /// Start timestamp.
    pub timestamp: i64,
    /// Distance to the next frame, or the default duration for the last one.
    pub duration: i64,
    /// Whether the access unit contains an IDR slice.
    pub is_keyframe: bool,
    /// Timestamp of the previous frame relative to this one (negative),
    /// present for non-key frames that follow another frame.
    pub ref1: Option<i64>,
}

impl AvcFrame {
    /// Iterates over the NAL units of the frame without their prefixes.
    pub fn nal_units(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let width = usize::from(self.nalu_size_length);
        let mut rest = self.data.as_ref();
        std::iter::from_fn(move || {
            if rest.len() < width {
                return None;
            }
            let (prefix, tail) = rest.split_at(width);
            let size = prefix.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            let (nal, tail) = tail.split_at(size.min(tail.len()));
            rest = tail;
            Some(nal)
        })
    }
}

#[derive(Debug, Default)]
struct AccessUnit {
    data: BytesMut,
    has_slice: bool,
    is_keyframe: bool,
}

#[derive(Debug)]
struct TimedUnit {
    data: Bytes,
    timestamp: i64,
    is_keyframe: bool,
}

/// Stateful AVC access unit parser.
#[derive(Debug)]
pub struct AvcParser {
    nalu_size_length: u8,
    output_nalu_size_length: u8,
    timestamps: VecDeque<i64>,
    generate_timestamps: bool,
    default_duration: i64,
    previous_timestamp: Option<i64>,
    current: AccessUnit,
    held: Option<TimedUnit>,
    last_emitted_timestamp: Option<i64>,
    frames: VecDeque<AvcFrame>,
    discard_leading_non_key: bool,
    seen_keyframe: bool,
    flushed: bool,
    skipped_frames: usize,
    skipped_reported: bool,
}

impl Default for AvcParser {
    fn default() -> Self {
        Self {
            nalu_size_length: 4,
            output_nalu_size_length: 4,
            timestamps: VecDeque::new(),
            generate_timestamps: false,
            default_duration: DEFAULT_FRAME_DURATION,
            previous_timestamp: None,
            current: AccessUnit::default(),
            held: None,
            last_emitted_timestamp: None,
            frames: VecDeque::new(),
            discard_leading_non_key: true,
            seen_keyframe: false,
            flushed: false,
            skipped_frames: 0,
            skipped_reported: false,
        }
    }
}

impl AvcParser {
    /// Creates a parser reading and writing 4-byte length prefixes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the width of the length prefixes in the input.
    pub fn set_nalu_size_length(&mut self, width: u8) -> Result<()> {
        self.nalu_size_length = check_width(width)?;
        Ok(())
    }

    /// Sets the width of the length prefixes in emitted frames.
    pub fn set_output_nalu_size_length(&mut self, width: u8) -> Result<()> {
        self.output_nalu_size_length = check_width(width)?;
        Ok(())
    }

    /// Width of the length prefixes in emitted frames.
    pub fn output_nalu_size_length(&self) -> u8 {
        self.output_nalu_size_length
    }

    /// Sets the duration of the last frame and the step used when
    /// generating timestamps.
    pub fn set_default_duration(&mut self, duration: i64) {
        self.default_duration = duration;
    }

    /// When enabled, frames without a queued timestamp get the previous
    /// timestamp plus the default duration.
    pub fn enable_timestamp_generation(&mut self, enable: bool) {
        self.generate_timestamps = enable;
    }

    /// Controls whether frames before the first IDR access unit are dropped.
    pub fn set_discard_leading_non_key(&mut self, discard: bool) {
        self.discard_leading_non_key = discard;
    }

    /// Queues the timestamp of the next access unit.
    pub fn add_timestamp(&mut self, timestamp: i64) {
        self.timestamps.push_back(timestamp);
    }

    /// Feeds a buffer of length-prefixed NAL units.
    ///
    /// The whole buffer is validated before any state changes, so a
    /// [`AvcError::NaluSizeLengthError`] can be retried after widening the
    /// output prefix.
    pub fn parse(&mut self, buffer: &[u8]) -> Result<()> {
        let nal_units = self.split_nal_units(buffer)?;

        let max_size = max_nalu_size(self.output_nalu_size_length);
        if let Some(largest) = nal_units.iter().map(|nal| nal.len()).max()
            && largest as u64 > max_size
        {
            return Err(AvcError::NaluSizeLengthError {
                required: required_nalu_size_length(largest),
            });
        }

        for nal in nal_units {
            self.handle_nal_unit(nal);
        }

        Ok(())
    }

    fn split_nal_units<'a>(&self, mut buffer: &'a [u8]) -> Result<Vec<&'a [u8]>> {
        let width = usize::from(self.nalu_size_length);
        let mut nal_units = Vec::new();

        while buffer.len() >= width {
            let size = buffer.get_uint(width) as usize;
            if size > buffer.len() {
                return Err(AvcError::TruncatedNalu {
                    expected: size,
                    available: buffer.len(),
                });
            }
            let (nal, rest) = buffer.split_at(size);
            if !nal.is_empty() {
                nal_units.push(nal);
            }
            buffer = rest;
        }

        if !buffer.is_empty() {
            return Err(AvcError::TruncatedNalu {
                expected: width,
                available: buffer.len(),
            });
        }

        Ok(nal_units)
    }

    fn handle_nal_unit(&mut self, nal: &[u8]) {
        let nal_type = NalUnitType::from(nal[0]);

        if self.current.has_slice {
            let new_picture = nal_type.is_slice() && first_mb_in_slice(nal).is_ok_and(|mb| mb == 0);
            if new_picture || nal_type.starts_access_unit() {
                self.finish_access_unit();
            }
        }

        if nal_type.is_slice() {
            self.current.has_slice = true;
        }
        if nal_type == NalUnitType::IdrSlice {
            self.current.is_keyframe = true;
        }

        self.current
            .data
            .put_uint(nal.len() as u64, usize::from(self.output_nalu_size_length));
        self.current.data.extend_from_slice(nal);
    }

    fn next_timestamp(&mut self) -> i64 {
        let timestamp = match self.timestamps.pop_front() {
            Some(timestamp) => timestamp,
            None => match self.previous_timestamp {
                Some(previous) if self.generate_timestamps => {
                    previous.saturating_add(self.default_duration)
                }
                Some(previous) => previous,
                None => 0,
            },
        };
        self.previous_timestamp = Some(timestamp);
        timestamp
    }

    fn finish_access_unit(&mut self) {
        let unit = std::mem::take(&mut self.current);
        if !unit.has_slice {
            return;
        }

        let timestamp = self.next_timestamp();

        if !self.seen_keyframe {
            if unit.is_keyframe {
                self.seen_keyframe = true;
            } else if self.discard_leading_non_key {
                self.skipped_frames += 1;
                return;
            }
        }

        let next = TimedUnit {
            data: unit.data.freeze(),
            timestamp,
            is_keyframe: unit.is_keyframe,
        };

        if let Some(held) = self.held.replace(next) {
            let duration = timestamp.saturating_sub(held.timestamp);
            self.emit(held, duration);
        }
    }

    fn emit(&mut self, unit: TimedUnit, duration: i64) {
        let ref1 = match self.last_emitted_timestamp {
            Some(previous) if !unit.is_keyframe => Some(previous.saturating_sub(unit.timestamp)),
            _ => None,
        };
        self.last_emitted_timestamp = Some(unit.timestamp);

        self.frames.push_back(AvcFrame {
            data: unit.data,
            nalu_size_length: self.output_nalu_size_length,
            timestamp: unit.timestamp,
            duration,
            is_keyframe: unit.is_keyframe,
            ref1,
        });
    }

    /// Completes the pending access unit and releases the last frame with
    /// the default duration.
    pub fn flush(&mut self) {
        self.finish_access_unit();
        if let Some(held) = self.held.take() {
            let duration = self.default_duration;
            self.emit(held, duration);
        }
        self.flushed = true;
    }

    /// Whether [`next_frame`](Self::next_frame) would return a frame.
    pub fn frame_available(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Pops the oldest completed frame.
    pub fn next_frame(&mut self) -> Option<AvcFrame> {
        self.frames.pop_front()
    }

    /// Number of leading non-key frames dropped so far.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Returns the number of dropped leading frames once, as soon as the
    /// count is final (a keyframe was seen or the parser was flushed).
    pub fn take_skipped_frames_report(&mut self) -> Option<usize> {
        if self.skipped_reported
            || self.skipped_frames == 0
            || !(self.seen_keyframe || self.flushed)
        {
            return None;
        }

        self.skipped_reported = true;
        Some(self.skipped_frames)
    }
}

fn check_width(width: u8) -> Result<u8> {
    match width {
        1..=4 => Ok(width),
        _ => Err(AvcError::InvalidNaluSizeLength(width)),
    }
}
