//! Frame delimiting for low-overhead AV1 bitstreams.
//!
//! [`Av1Parser`] consumes buffers of size-delimited OBUs, caches the most
//! recent sequence header and groups OBUs into temporal units. Each
//! temporal unit that carries a frame becomes one [`Av1Frame`].

use std::collections::VecDeque;
use std::io;

use bytes::{Bytes, BytesMut};
use bytes_util::BitReader;

use crate::error::{Av1Error, Result};
use crate::obu::seq::{ColorConfig, SequenceHeaderObu};
use crate::obu::{FrameType, ObuHeader, ObuType};

/// One temporal unit worth of OBUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Av1Frame {
    /// All OBUs of the unit, without temporal delimiters and padding.
    pub data: Bytes,
    /// Timestamp in the caller's unit (nanoseconds for Matroska input).
    pub timestamp: i64,
    /// Duration, when a default duration is configured.
    pub duration: Option<i64>,
    /// Set when the first frame header of the unit is a shown key frame.
    pub is_keyframe: bool,
}

/// A complete OBU located inside a buffer.
struct ObuSpan {
    header: ObuHeader,
    header_len: usize,
    total_len: usize,
}

/// Locates the OBU at the start of `data`.
///
/// Returns `Ok(None)` when `data` ends before the OBU does.
fn next_obu(data: &[u8]) -> Result<Option<ObuSpan>> {
    let mut cursor = io::Cursor::new(data);
    let header = match ObuHeader::parse(&mut cursor) {
        Ok(header) => header,
        Err(Av1Error::BufferExhausted) => return Ok(None),
        Err(err) => return Err(err),
    };

    let size = header.size.ok_or(Av1Error::RawObuUnsupported)?;
    let size = usize::try_from(size)
        .map_err(|_| Av1Error::MalformedLength("obu_size exceeds the address space"))?;

    let header_len = cursor.position() as usize;
    let total_len = header_len
        .checked_add(size)
        .ok_or(Av1Error::MalformedLength("obu_size exceeds the address space"))?;

    if total_len > data.len() {
        return Ok(None);
    }

    Ok(Some(ObuSpan {
        header,
        header_len,
        total_len,
    }))
}

/// Reads `show_existing_frame` and `frame_type` from a frame header payload.
/// AV1-Spec-2 - 5.9.2
fn is_key_frame_header(payload: &[u8], seq: &SequenceHeaderObu) -> Result<bool> {
    if seq.reduced_still_picture_header {
        return Ok(true);
    }

    let mut bit_reader = BitReader::new(payload);
    if bit_reader.read_bit()? {
        // show_existing_frame
        return Ok(false);
    }

    let frame_type = FrameType::from(bit_reader.read_bits(2)? as u8);
    Ok(frame_type == FrameType::Key)
}

/// Stateful AV1 OBU stream parser.
#[derive(Debug, Default)]
pub struct Av1Parser {
    pending: BytesMut,
    unit: BytesMut,
    unit_keyframe: Option<bool>,
    sequence_header: Option<SequenceHeaderObu>,
    timestamps: VecDeque<i64>,
    previous_timestamp: Option<i64>,
    default_duration: Option<i64>,
    headers_only: bool,
    frames: VecDeque<Av1Frame>,
}

impl Av1Parser {
    /// Creates a parser with no cached sequence header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the timestamp of the next temporal unit.
    pub fn add_timestamp(&mut self, timestamp: i64) {
        self.timestamps.push_back(timestamp);
    }

    /// Sets the duration used for emitted frames and for timestamps when
    /// the queue runs dry.
    pub fn set_default_duration(&mut self, duration: i64) {
        self.default_duration = Some(duration);
    }

    /// Restricts parsing to sequence headers. Parsing stops after the first
    /// one and no frames are produced.
    pub fn set_parse_sequence_header_obus_only(&mut self, headers_only: bool) {
        self.headers_only = headers_only;
    }

    /// Whether a sequence header has been seen.
    pub fn headers_parsed(&self) -> bool {
        self.sequence_header.is_some()
    }

    /// The most recent sequence header.
    pub fn sequence_header(&self) -> Option<&SequenceHeaderObu> {
        self.sequence_header.as_ref()
    }

    /// Color configuration of the most recent sequence header.
    pub fn color_config(&self) -> Option<&ColorConfig> {
        self.sequence_header.as_ref().map(|seq| &seq.color_config)
    }

    /// Maximum frame dimensions from the most recent sequence header.
    pub fn pixel_dimensions(&self) -> Option<(u32, u32)> {
        self.sequence_header
            .as_ref()
            .map(|seq| (seq.max_frame_width as u32, seq.max_frame_height as u32))
    }

    /// Reads only the sequence headers in `buffer`, typically the
    /// `configOBUs` of a codec configuration record. No frame state changes.
    pub fn parse_headers(&mut self, buffer: &[u8]) -> Result<()> {
        let mut pos = 0;
        while pos < buffer.len() {
            let span = next_obu(&buffer[pos..])?.ok_or(Av1Error::BufferExhausted)?;
            if span.header.obu_type == ObuType::SequenceHeader {
                let mut payload = &buffer[pos + span.header_len..pos + span.total_len];
                self.sequence_header = Some(SequenceHeaderObu::parse(span.header, &mut payload)?);
            }
            pos += span.total_len;
        }

        Ok(())
    }

    /// Feeds OBU bytes. Complete temporal units become available through
    /// [`next_frame`](Self::next_frame); an OBU cut off at the end of
    /// `buffer` is completed by the next call.
    pub fn parse(&mut self, buffer: &[u8]) -> Result<()> {
        if self.headers_only && self.headers_parsed() {
            return Ok(());
        }

        self.pending.extend_from_slice(buffer);
        let data = std::mem::take(&mut self.pending).freeze();

        let mut pos = 0;
        let result = loop {
            let span = match next_obu(&data[pos..]) {
                Ok(Some(span)) => span,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };

            let obu = data.slice(pos..pos + span.total_len);
            if let Err(err) = self.handle_obu(span.header, obu, span.header_len) {
                break Err(err);
            }
            pos += span.total_len;

            if self.headers_only && self.headers_parsed() {
                pos = data.len();
                break Ok(());
            }
        };

        result?;
        self.pending.extend_from_slice(&data[pos..]);
        Ok(())
    }

    fn handle_obu(&mut self, header: ObuHeader, obu: Bytes, header_len: usize) -> Result<()> {
        let payload = &obu[header_len..];

        match header.obu_type {
            ObuType::SequenceHeader => {
                let seq = SequenceHeaderObu::parse(header, &mut &payload[..])?;
                self.sequence_header = Some(seq);
            }
            ObuType::TemporalDelimiter => {
                self.finish_unit();
                return Ok(());
            }
            ObuType::Padding => return Ok(()),
            ObuType::FrameHeader | ObuType::Frame => {
                let Some(seq) = &self.sequence_header else {
                    return Err(Av1Error::InvalidStructure(
                        "frame header before any sequence header".into(),
                    ));
                };

                if header.obu_type == ObuType::Frame && payload.is_empty() {
                    return Err(Av1Error::InvalidStructure("empty frame OBU".into()));
                }

                if self.unit_keyframe.is_none() && !self.headers_only {
                    self.unit_keyframe = Some(is_key_frame_header(payload, seq)?);
                }
            }
            _ => {}
        }

        if !self.headers_only {
            self.unit.extend_from_slice(&obu);
        }

        Ok(())
    }

    fn finish_unit(&mut self) {
        let Some(is_keyframe) = self.unit_keyframe.take() else {
            // OBUs without a frame carry over into the next unit.
            return;
        };

        let timestamp = match self.timestamps.pop_front() {
            Some(timestamp) => timestamp,
            None => match (self.previous_timestamp, self.default_duration) {
                (Some(previous), Some(duration)) => previous.saturating_add(duration),
                (Some(previous), None) => previous,
                (None, _) => 0,
            },
        };
        self.previous_timestamp = Some(timestamp);

        self.frames.push_back(Av1Frame {
            data: self.unit.split().freeze(),
            timestamp,
            duration: self.default_duration,
            is_keyframe,
        });
    }

    /// Completes the pending temporal unit.
    ///
    /// Fails with [`Av1Error::BufferExhausted`] when an incomplete OBU is
    /// still buffered; the incomplete bytes are discarded.
    pub fn flush(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.finish_unit();
            return Err(Av1Error::BufferExhausted);
        }

        self.finish_unit();
        Ok(())
    }

    /// Whether [`next_frame`](Self::next_frame) would return a frame.
    pub fn frame_available(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Pops the oldest completed frame.
    pub fn next_frame(&mut self) -> Option<Av1Frame> {
        self.frames.pop_front()
    }

    /// Answers whether `buffer` starts a key frame, using the cached
    /// sequence header or one found earlier in `buffer`.
    pub fn is_keyframe(&self, buffer: &[u8]) -> Result<bool> {
        let mut local_seq = None;
        let mut pos = 0;

        while pos < buffer.len() {
            let Some(span) = next_obu(&buffer[pos..])? else {
                break;
            };
            let mut payload = &buffer[pos + span.header_len..pos + span.total_len];

            match span.header.obu_type {
                ObuType::SequenceHeader => {
                    local_seq = Some(SequenceHeaderObu::parse(span.header, &mut payload)?);
                }
                ObuType::FrameHeader | ObuType::Frame => {
                    let seq = local_seq
                        .as_ref()
                        .or(self.sequence_header.as_ref())
                        .ok_or_else(|| {
                            Av1Error::InvalidStructure(
                                "frame header before any sequence header".into(),
                            )
                        })?;
                    return is_key_frame_header(payload, seq);
                }
                _ => {}
            }

            pos += span.total_len;
        }

        Ok(false)
    }
}
