//! IVF file and frame headers.
//!
//! An IVF file is a 32-byte file header followed by one 12-byte frame
//! header per frame, each directly followed by the frame payload. All
//! integers are little-endian.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Av1Error, Result};

const IVF_SIGNATURE: [u8; 4] = *b"DKIF";

const AV1_FOURCC: [u8; 4] = *b"AV01";

/// IVF file header.
///
/// ```text
/// Offset  Size  Field
/// 0       4     "DKIF"
/// 4       2     version (0)
/// 6       2     header size (32)
/// 8       4     codec FourCC
/// 12      2     width
/// 14      2     height
/// 16      4     timebase denominator
/// 20      4     timebase numerator
/// 24      4     frame count
/// 28      4     unused
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfHeader {
    /// Video width in pixels.
    pub width: u16,
    /// Video height in pixels.
    pub height: u16,
    /// Timebase numerator; one tick lasts `numerator / denominator` seconds.
    pub timebase_numerator: u32,
    /// Timebase denominator.
    pub timebase_denominator: u32,
    /// Number of frames in the file, 0 while still unknown.
    pub frame_count: u32,
}

impl IvfHeader {
    /// Size of the file header in bytes.
    pub const SIZE: usize = 32;

    /// Byte offset of the frame count field.
    pub const FRAME_COUNT_OFFSET: u64 = 24;

    /// Demuxes a file header, accepting the AV1 FourCC in either case.
    pub fn demux<R: io::Read>(reader: &mut R) -> Result<Self> {
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        if signature != IVF_SIGNATURE {
            return Err(Av1Error::InvalidIvfSignature(signature));
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != 0 {
            return Err(Av1Error::UnsupportedIvfVersion(version));
        }
        reader.read_u16::<LittleEndian>()?; // header size

        let mut fourcc = [0u8; 4];
        reader.read_exact(&mut fourcc)?;
        if !fourcc.eq_ignore_ascii_case(&AV1_FOURCC) {
            return Err(Av1Error::InvalidIvfCodec(fourcc));
        }

        let width = reader.read_u16::<LittleEndian>()?;
        let height = reader.read_u16::<LittleEndian>()?;
        let timebase_denominator = reader.read_u32::<LittleEndian>()?;
        let timebase_numerator = reader.read_u32::<LittleEndian>()?;
        if timebase_numerator == 0 || timebase_denominator == 0 {
            return Err(Av1Error::InvalidIvfTimebase {
                numerator: timebase_numerator,
                denominator: timebase_denominator,
            });
        }

        let frame_count = reader.read_u32::<LittleEndian>()?;
        reader.read_u32::<LittleEndian>()?; // unused

        Ok(IvfHeader {
            width,
            height,
            timebase_numerator,
            timebase_denominator,
            frame_count,
        })
    }

    /// Muxes this file header to the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&IVF_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(Self::SIZE as u16)?;
        writer.write_all(&AV1_FOURCC)?;
        writer.write_u16::<LittleEndian>(self.width)?;
        writer.write_u16::<LittleEndian>(self.height)?;
        writer.write_u32::<LittleEndian>(self.timebase_denominator)?;
        writer.write_u32::<LittleEndian>(self.timebase_numerator)?;
        writer.write_u32::<LittleEndian>(self.frame_count)?;
        writer.write_u32::<LittleEndian>(0)?;
        Ok(())
    }
}

/// Rewrites the frame count of an IVF file header that starts at offset 0
/// of `writer`, leaving the stream positioned at its end.
pub fn update_frame_count<W: io::Write + io::Seek>(writer: &mut W, frame_count: u32) -> Result<()> {
    writer.seek(io::SeekFrom::Start(IvfHeader::FRAME_COUNT_OFFSET))?;
    writer.write_u32::<LittleEndian>(frame_count)?;
    writer.seek(io::SeekFrom::End(0))?;
    Ok(())
}

/// IVF frame header: payload size followed by the presentation timestamp
/// in timebase units.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct IvfFrameHeader {
    /// Size of the payload in bytes.
    pub frame_size: u32,
    /// Presentation timestamp.
    pub pts: u64,
}

impl IvfFrameHeader {
    /// Size of a frame header in bytes.
    pub const SIZE: usize = 12;

    /// Demuxes a frame header.
    pub fn demux<R: io::Read>(reader: &mut R) -> Result<Self> {
        Ok(IvfFrameHeader {
            frame_size: reader.read_u32::<LittleEndian>()?,
            pts: reader.read_u64::<LittleEndian>()?,
        })
    }

    /// Muxes this frame header to the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.frame_size)?;
        writer.write_u64::<LittleEndian>(self.pts)?;
        Ok(())
    }
}
