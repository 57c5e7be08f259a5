//! Sequential traversal of the first segment of a Matroska file.

use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::block::{Block, BlockGroup, block_track_number};
use crate::chapters::{EditionEntry, parse_chapters};
use crate::ebml::{ElementHeader, read_uint};
use crate::error::{MatroskaError, Result};
use crate::ids;
use crate::info::SegmentInfo;
use crate::tags::{Tag, parse_tags};
use crate::tracks::{TrackEntry, parse_tracks};

/// Largest element body read into memory.
pub const DEFAULT_MAX_ELEMENT_SIZE: u64 = 256 * 1024 * 1024;

/// Something of interest found while walking the segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    Info(SegmentInfo),
    Tracks(Vec<TrackEntry>),
    ClusterStart { position: u64 },
    ClusterTimestamp(u64),
    SimpleBlock(Block),
    BlockGroup(BlockGroup),
    /// A SimpleBlock or BlockGroup whose body could not be decoded. The
    /// walk continues with the next element.
    CorruptBlock {
        track_number: Option<u64>,
        position: u64,
        reason: String,
    },
    Chapters(Vec<EditionEntry>),
    Tags(Vec<Tag>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelKind {
    Segment,
    Cluster,
}

impl LevelKind {
    fn accepts(self, id: u32) -> bool {
        match self {
            LevelKind::Segment => ids::SEGMENT_CHILDREN.contains(&id),
            LevelKind::Cluster => ids::CLUSTER_CHILDREN.contains(&id),
        }
    }
}

/// An open master element. `end` is `None` for unknown-size elements,
/// which end at the first element that is not one of their children.
#[derive(Debug, Clone, Copy)]
struct Level {
    kind: LevelKind,
    end: Option<u64>,
}

/// Walks the Info, Tracks, Cluster, Chapters and Tags elements of the
/// first segment, skipping everything else unread.
#[derive(Debug)]
pub struct SegmentWalker<R> {
    reader: R,
    position: u64,
    levels: Vec<Level>,
    pending: Option<ElementHeader>,
    max_element_size: u64,
}

impl<R: Read + Seek> SegmentWalker<R> {
    /// Checks the EBML header and positions the walker inside the first
    /// segment.
    pub fn open(mut reader: R) -> Result<Self> {
        let position = reader.stream_position()?;
        let mut walker = SegmentWalker {
            reader,
            position,
            levels: Vec::new(),
            pending: None,
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
        };

        match walker.read_header() {
            Ok(Some(header)) if header.id == ids::EBML => walker.skip(&header)?,
            Ok(_) | Err(MatroskaError::InvalidVint(_)) => {
                return Err(MatroskaError::ContainerStructureMissing(
                    "no EBML header at the start of the file",
                ));
            }
            Err(err) => return Err(err),
        }

        loop {
            let Some(header) = walker.read_header()? else {
                return Err(MatroskaError::ContainerStructureMissing(
                    "no Segment element",
                ));
            };

            if header.id == ids::SEGMENT {
                debug!(
                    position = header.position,
                    size = ?header.size,
                    "Found segment"
                );
                walker.levels.push(Level {
                    kind: LevelKind::Segment,
                    end: header.end(),
                });
                return Ok(walker);
            }

            walker.skip(&header)?;
        }
    }

    /// Overrides the largest element body read into memory.
    pub fn with_max_element_size(mut self, max_element_size: u64) -> Self {
        self.max_element_size = max_element_size;
        self
    }

    /// Current offset in the input.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Returns the next event, or `None` once the segment is exhausted.
    pub fn next_event(&mut self) -> Result<Option<SegmentEvent>> {
        loop {
            let next_start = self.pending.map_or(self.position, |header| header.position);
            while let Some(level) = self.levels.last() {
                match level.end {
                    Some(end) if next_start >= end => {
                        trace!(kind = ?level.kind, end, "Leaving level");
                        self.levels.pop();
                    }
                    _ => break,
                }
            }

            let Some(level) = self.levels.last().copied() else {
                return Ok(None);
            };

            let header = match self.pending.take() {
                Some(header) => header,
                None => match self.read_header()? {
                    Some(header) => header,
                    None => {
                        self.levels.clear();
                        return Ok(None);
                    }
                },
            };

            if level.end.is_none() && !level.kind.accepts(header.id) {
                trace!(kind = ?level.kind, id = header.id, "Unknown-size level ends");
                self.levels.pop();
                self.pending = Some(header);
                continue;
            }

            let event = match level.kind {
                LevelKind::Segment => self.segment_child(header)?,
                LevelKind::Cluster => self.cluster_child(header)?,
            };

            if event.is_some() {
                return Ok(event);
            }
        }
    }

    fn segment_child(&mut self, header: ElementHeader) -> Result<Option<SegmentEvent>> {
        debug!(
            id = header.id,
            position = header.position,
            size = ?header.size,
            "Segment child"
        );

        let event = match header.id {
            ids::CLUSTER => {
                self.levels.push(Level {
                    kind: LevelKind::Cluster,
                    end: header.end(),
                });
                SegmentEvent::ClusterStart {
                    position: header.position,
                }
            }
            ids::INFO => SegmentEvent::Info(SegmentInfo::parse(self.read_body(&header)?)?),
            ids::TRACKS => SegmentEvent::Tracks(parse_tracks(self.read_body(&header)?)?),
            ids::CHAPTERS => SegmentEvent::Chapters(parse_chapters(self.read_body(&header)?)?),
            ids::TAGS => SegmentEvent::Tags(parse_tags(self.read_body(&header)?)?),
            _ => {
                self.skip(&header)?;
                return Ok(None);
            }
        };

        Ok(Some(event))
    }

    fn cluster_child(&mut self, header: ElementHeader) -> Result<Option<SegmentEvent>> {
        trace!(id = header.id, position = header.position, "Cluster child");

        let event = match header.id {
            ids::TIMESTAMP => {
                let body = self.read_body(&header)?;
                SegmentEvent::ClusterTimestamp(read_uint(header.id, &body)?)
            }
            ids::SIMPLE_BLOCK => {
                let body = self.read_body(&header)?;
                match Block::parse_simple(body.clone()) {
                    Ok(block) => SegmentEvent::SimpleBlock(block),
                    Err(err) => corrupt_block(block_track_number(&body), &header, err),
                }
            }
            ids::BLOCK_GROUP => {
                let body = self.read_body(&header)?;
                match BlockGroup::parse(body.clone()) {
                    Ok(group) => SegmentEvent::BlockGroup(group),
                    Err(err) => corrupt_block(BlockGroup::track_number(&body), &header, err),
                }
            }
            _ => {
                self.skip(&header)?;
                return Ok(None);
            }
        };

        Ok(Some(event))
    }

    fn read_header(&mut self) -> Result<Option<ElementHeader>> {
        let header = ElementHeader::read(&mut self.reader, self.position)?;
        if let Some(header) = &header {
            self.position = header.data_start();
        }
        Ok(header)
    }

    fn read_body(&mut self, header: &ElementHeader) -> Result<Bytes> {
        let size = header
            .size
            .ok_or(MatroskaError::UnknownSizeUnsupported(header.id))?;
        if size > self.max_element_size {
            return Err(MatroskaError::ElementTooLarge {
                id: header.id,
                size,
            });
        }

        let mut body = vec![0u8; size as usize];
        self.reader.read_exact(&mut body).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => MatroskaError::TruncatedElement {
                id: header.id,
                position: header.position,
            },
            _ => MatroskaError::Io(err),
        })?;
        self.position += size;

        Ok(Bytes::from(body))
    }

    fn skip(&mut self, header: &ElementHeader) -> Result<()> {
        let end = header
            .end()
            .ok_or(MatroskaError::UnknownSizeUnsupported(header.id))?;
        self.reader.seek(SeekFrom::Start(end))?;
        self.position = end;
        Ok(())
    }
}

fn corrupt_block(track_number: Option<u64>, header: &ElementHeader, err: MatroskaError) -> SegmentEvent {
    debug!(track_number, position = header.position, error = %err, "Corrupt block");
    SegmentEvent::CorruptBlock {
        track_number,
        position: header.position,
        reason: err.to_string(),
    }
}
