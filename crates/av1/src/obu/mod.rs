use std::io;

use bytes_util::BitReader;
use utils::read_leb128;

use crate::error::{Av1Error, Result};

pub mod seq;
pub mod utils;

/// OBU Header
/// AV1-Spec-2 - 5.3.2
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct ObuHeader {
    /// `obu_type`
    ///
    /// 4 bits
    pub obu_type: ObuType,
    /// `obu_size` if `obu_has_size_field` is 1
    ///
    /// leb128()
    pub size: Option<u64>,
    /// `obu_extension_header()` if `obu_extension_flag` is 1
    pub extension_header: Option<ObuExtensionHeader>,
}

/// Obu Header Extension
/// AV1-Spec-2 - 5.3.3
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct ObuExtensionHeader {
    /// `temporal_id`
    pub temporal_id: u8,
    /// `spatial_id`
    pub spatial_id: u8,
}

impl ObuHeader {
    /// Parses an OBU header (including the `obu_size` field, if present) from
    /// the given `cursor`.
    ///
    /// Running out of input yields [`Av1Error::BufferExhausted`].
    pub fn parse(cursor: &mut impl io::Read) -> Result<Self> {
        let mut bit_reader = BitReader::new(cursor);
        let forbidden_bit = bit_reader.read_bit()?;
        if forbidden_bit {
            return Err(Av1Error::InvalidStructure(
                "obu_forbidden_bit is not 0".into(),
            ));
        }

        let obu_type = bit_reader.read_bits(4)?;
        let extension_flag = bit_reader.read_bit()?;
        let has_size_field = bit_reader.read_bit()?;

        bit_reader.read_bit()?; // reserved_1bit

        let extension_header = if extension_flag {
            let temporal_id = bit_reader.read_bits(3)?;
            let spatial_id = bit_reader.read_bits(2)?;
            bit_reader.read_bits(3)?; // reserved_3bits
            Some(ObuExtensionHeader {
                temporal_id: temporal_id as u8,
                spatial_id: spatial_id as u8,
            })
        } else {
            None
        };

        let size = if has_size_field {
            Some(read_leb128(&mut bit_reader)?)
        } else {
            None
        };

        Ok(ObuHeader {
            obu_type: ObuType::from(obu_type as u8),
            size,
            extension_header,
        })
    }
}

/// OBU Type
/// AV1-Spec-2 - 6.2.2
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ObuType {
    /// `OBU_SEQUENCE_HEADER`
    SequenceHeader,
    /// `OBU_TEMPORAL_DELIMITER`
    TemporalDelimiter,
    /// `OBU_FRAME_HEADER`
    FrameHeader,
    /// `OBU_TILE_GROUP`
    TileGroup,
    /// `OBU_METADATA`
    Metadata,
    /// `OBU_FRAME`
    Frame,
    /// `OBU_REDUNDANT_FRAME_HEADER`
    RedundantFrameHeader,
    /// `OBU_PADDING`
    Padding,
    /// Reserved (including `OBU_TILE_LIST`, which never appears in containers)
    Reserved(u8),
}

impl From<u8> for ObuType {
    fn from(value: u8) -> Self {
        match value {
            1 => ObuType::SequenceHeader,
            2 => ObuType::TemporalDelimiter,
            3 => ObuType::FrameHeader,
            4 => ObuType::TileGroup,
            5 => ObuType::Metadata,
            6 => ObuType::Frame,
            7 => ObuType::RedundantFrameHeader,
            15 => ObuType::Padding,
            _ => ObuType::Reserved(value),
        }
    }
}

/// `frame_type`
/// AV1-Spec-2 - 6.8.2
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum FrameType {
    /// `KEY_FRAME`
    Key,
    /// `INTER_FRAME`
    Inter,
    /// `INTRA_ONLY_FRAME`
    IntraOnly,
    /// `SWITCH_FRAME`
    Switch,
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => FrameType::Key,
            1 => FrameType::Inter,
            2 => FrameType::IntraOnly,
            _ => FrameType::Switch,
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use bytes::Buf;

    use super::*;

    #[test]
    fn test_obu_header_parse() {
        let mut cursor =
            std::io::Cursor::new(b"\n\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@");
        let header = ObuHeader::parse(&mut cursor).unwrap();
        insta::assert_debug_snapshot!(header, @r"
        ObuHeader {
            obu_type: SequenceHeader,
            size: Some(
                15,
            ),
            extension_header: None,
        }
        ");

        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.remaining(), 15);
    }

    #[test]
    fn test_obu_header_parse_no_size_field() {
        let mut cursor = std::io::Cursor::new(b"\x00");
        let header = ObuHeader::parse(&mut cursor).unwrap();
        insta::assert_debug_snapshot!(header, @r"
        ObuHeader {
            obu_type: Reserved(
                0,
            ),
            size: None,
            extension_header: None,
        }
        ");

        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_obu_header_parse_extension_header() {
        let mut cursor = std::io::Cursor::new([0b00000100, 0b11010000]);
        let header = ObuHeader::parse(&mut cursor).unwrap();
        insta::assert_debug_snapshot!(header, @r"
        ObuHeader {
            obu_type: Reserved(
                0,
            ),
            size: None,
            extension_header: Some(
                ObuExtensionHeader {
                    temporal_id: 6,
                    spatial_id: 2,
                },
            ),
        }
        ");

        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_obu_header_forbidden_bit_set() {
        let err = ObuHeader::parse(&mut std::io::Cursor::new(
            b"\xff\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@",
        ))
        .unwrap_err();
        assert!(matches!(err, Av1Error::InvalidStructure(msg) if msg.contains("forbidden")));
    }

    #[test]
    fn test_obu_header_truncated_size_field() {
        // has_size_field=1 but the leb128 continuation byte is missing
        let err = ObuHeader::parse(&mut std::io::Cursor::new([0x0a, 0x80])).unwrap_err();
        assert!(matches!(err, Av1Error::BufferExhausted));
    }

    #[test]
    fn test_obu_type_from_u8() {
        let case = [
            (ObuType::SequenceHeader, 1),
            (ObuType::TemporalDelimiter, 2),
            (ObuType::FrameHeader, 3),
            (ObuType::TileGroup, 4),
            (ObuType::Metadata, 5),
            (ObuType::Frame, 6),
            (ObuType::RedundantFrameHeader, 7),
            (ObuType::Reserved(8), 8),
            (ObuType::Padding, 15),
            (ObuType::Reserved(0), 0),
        ];

        for (obu_type, value) in case {
            assert_eq!(ObuType::from(value), obu_type);
        }
    }

    #[test]
    fn test_frame_type_from_u8() {
        assert_eq!(FrameType::from(0), FrameType::Key);
        assert_eq!(FrameType::from(1), FrameType::Inter);
        assert_eq!(FrameType::from(2), FrameType::IntraOnly);
        assert_eq!(FrameType::from(3), FrameType::Switch);
    }
}
