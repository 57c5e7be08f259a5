use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use bytes_util::BytesCursorExt;

/// AVC Decoder Configuration Record, the `avcC` box payload and the
/// Matroska `CodecPrivate` of `V_MPEG4/ISO/AVC` tracks.
/// ISO/IEC 14496-15 - 5.3.3.1
#[derive(Debug, Clone, PartialEq)]
pub struct AVCDecoderConfigurationRecord {
    /// `configurationVersion`, always 1.
    pub configuration_version: u8,
    /// `AVCProfileIndication`
    pub profile_indication: u8,
    /// `profile_compatibility`
    pub profile_compatibility: u8,
    /// `AVCLevelIndication`
    pub level_indication: u8,
    /// `lengthSizeMinusOne`
    ///
    /// 2 bits
    pub length_size_minus_one: u8,
    /// Sequence parameter set NAL units.
    pub sps: Vec<Bytes>,
    /// Picture parameter set NAL units.
    pub pps: Vec<Bytes>,
    /// Trailing bytes (the high profile extension), kept verbatim.
    pub extended_config: Bytes,
}

impl AVCDecoderConfigurationRecord {
    /// Parses the record from the given reader.
    pub fn parse(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let configuration_version = reader.read_u8()?;
        if configuration_version != 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "configuration version is not 1",
            ));
        }

        let profile_indication = reader.read_u8()?;
        let profile_compatibility = reader.read_u8()?;
        let level_indication = reader.read_u8()?;
        let length_size_minus_one = reader.read_u8()? & 0b11;

        let num_sps = reader.read_u8()? & 0b1_1111;
        let sps = Self::read_parameter_sets(reader, num_sps)?;

        let num_pps = reader.read_u8()?;
        let pps = Self::read_parameter_sets(reader, num_pps)?;

        Ok(AVCDecoderConfigurationRecord {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one,
            sps,
            pps,
            extended_config: reader.extract_remaining(),
        })
    }

    fn read_parameter_sets(reader: &mut io::Cursor<Bytes>, count: u8) -> io::Result<Vec<Bytes>> {
        (0..count)
            .map(|_| {
                let length = reader.read_u16::<BigEndian>()?;
                reader.extract_bytes(length as usize)
            })
            .collect()
    }

    /// Width in bytes of the NAL unit length prefixes of the stream.
    pub fn nalu_size_length(&self) -> u8 {
        self.length_size_minus_one + 1
    }
}
