use std::io;

use bytes::Bytes;
use bytes_util::{BitReader, BytesCursorExt};

/// AV1 Codec Configuration Record, as stored in `av1C` boxes and in the
/// Matroska `CodecPrivate` of `V_AV1` tracks.
///
/// <https://aomediacodec.github.io/av1-isobmff/#av1codecconfigurationbox-syntax>
#[derive(Debug, Clone, PartialEq)]
pub struct AV1CodecConfigurationRecord {
    /// `seq_profile`
    ///
    /// 3 bits
    pub seq_profile: u8,
    /// `seq_level_idx[0]`
    ///
    /// 5 bits
    pub seq_level_idx_0: u8,
    /// `seq_tier[0]`
    pub seq_tier_0: bool,
    /// `high_bitdepth`
    pub high_bitdepth: bool,
    /// `twelve_bit`
    pub twelve_bit: bool,
    /// `mono_chrome`
    pub monochrome: bool,
    /// `subsampling_x`
    pub chroma_subsampling_x: bool,
    /// `subsampling_y`
    pub chroma_subsampling_y: bool,
    /// `chroma_sample_position`
    ///
    /// 2 bits
    pub chroma_sample_position: u8,
    /// `initial_presentation_delay_minus_one`, when signalled.
    ///
    /// 4 bits
    pub initial_presentation_delay_minus_one: Option<u8>,
    /// Zero or more OBUs, normally a single sequence header OBU.
    pub config_obu: Bytes,
}

impl AV1CodecConfigurationRecord {
    /// Demuxes the record from the given reader.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let mut bit_reader = BitReader::new(reader);

        let marker = bit_reader.read_bit()?;
        let version = bit_reader.read_bits(7)? as u8;
        check_marker_and_version(marker, version)?;

        let seq_profile = bit_reader.read_bits(3)? as u8;
        let seq_level_idx_0 = bit_reader.read_bits(5)? as u8;

        let seq_tier_0 = bit_reader.read_bit()?;
        let high_bitdepth = bit_reader.read_bit()?;
        let twelve_bit = bit_reader.read_bit()?;
        let monochrome = bit_reader.read_bit()?;
        let chroma_subsampling_x = bit_reader.read_bit()?;
        let chroma_subsampling_y = bit_reader.read_bit()?;
        let chroma_sample_position = bit_reader.read_bits(2)? as u8;

        bit_reader.seek_bits(3)?; // reserved

        let initial_presentation_delay_minus_one = if bit_reader.read_bit()? {
            Some(bit_reader.read_bits(4)? as u8)
        } else {
            bit_reader.seek_bits(4)?; // reserved
            None
        };

        let reader = bit_reader.into_inner();

        Ok(AV1CodecConfigurationRecord {
            seq_profile,
            seq_level_idx_0,
            seq_tier_0,
            high_bitdepth,
            twelve_bit,
            monochrome,
            chroma_subsampling_x,
            chroma_subsampling_y,
            chroma_sample_position,
            initial_presentation_delay_minus_one,
            config_obu: reader.extract_remaining(),
        })
    }
}

fn check_marker_and_version(marker: bool, version: u8) -> io::Result<()> {
    if !marker {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "marker is not set",
        ));
    }

    if version != 1 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "version is not 1",
        ));
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    const AV1C: &[u8] = b"\x81\r\x0c\0\n\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@";

    fn demux(data: &'static [u8]) -> io::Result<AV1CodecConfigurationRecord> {
        AV1CodecConfigurationRecord::demux(&mut io::Cursor::new(Bytes::from_static(data)))
    }

    #[test]
    fn test_config_demux() {
        let config = demux(AV1C).unwrap();

        insta::assert_debug_snapshot!(config, @r#"
        AV1CodecConfigurationRecord {
            seq_profile: 0,
            seq_level_idx_0: 13,
            seq_tier_0: false,
            high_bitdepth: false,
            twelve_bit: false,
            monochrome: false,
            chroma_subsampling_x: true,
            chroma_subsampling_y: true,
            chroma_sample_position: 0,
            initial_presentation_delay_minus_one: None,
            config_obu: b"\n\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@",
        }
        "#);
    }

    #[test]
    fn test_config_with_presentation_delay() {
        let config = demux(&[0x81, 0x28, 0xc0, 0x15]).unwrap();

        assert_eq!(config.seq_profile, 1);
        assert_eq!(config.seq_level_idx_0, 8);
        assert!(config.seq_tier_0);
        assert!(config.high_bitdepth);
        assert_eq!(config.initial_presentation_delay_minus_one, Some(5));
        assert!(config.config_obu.is_empty());
    }

    #[test]
    fn test_config_rejects_bad_records() {
        let err = demux(b"\x81\r").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = demux(b"\x01\r\x0c\0").unwrap_err();
        assert_eq!(err.to_string(), "marker is not set");

        let err = demux(b"\x82\r\x0c\0").unwrap_err();
        assert_eq!(err.to_string(), "version is not 1");
    }
}
