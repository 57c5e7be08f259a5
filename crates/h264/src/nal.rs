use std::io;

use bytes_util::BitReader;
use expgolomb::BitReaderExpGolombExt;

/// NAL unit type, the low five bits of the NAL unit header.
/// ISO/IEC 14496-10 - 7.4.1, Table 7-1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture
    NonIdrSlice,
    /// Coded slice data partition A
    DataPartitionA,
    /// Coded slice data partition B
    DataPartitionB,
    /// Coded slice data partition C
    DataPartitionC,
    /// Coded slice of an IDR picture
    IdrSlice,
    /// Supplemental enhancement information
    Sei,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    AccessUnitDelimiter,
    /// End of sequence
    EndOfSequence,
    /// End of stream
    EndOfStream,
    /// Filler data
    FillerData,
    /// Sequence parameter set extension
    SpsExtension,
    /// Prefix NAL unit
    Prefix,
    /// Subset sequence parameter set
    SubsetSps,
    /// Any other value, including reserved ones.
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(header: u8) -> Self {
        match header & 0x1f {
            1 => NalUnitType::NonIdrSlice,
            2 => NalUnitType::DataPartitionA,
            3 => NalUnitType::DataPartitionB,
            4 => NalUnitType::DataPartitionC,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::AccessUnitDelimiter,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::FillerData,
            13 => NalUnitType::SpsExtension,
            14 => NalUnitType::Prefix,
            15 => NalUnitType::SubsetSps,
            other => NalUnitType::Other(other),
        }
    }
}

impl NalUnitType {
    /// Slices that start or continue a primary coded picture.
    pub fn is_slice(self) -> bool {
        matches!(self, NalUnitType::NonIdrSlice | NalUnitType::IdrSlice)
    }

    /// Types that, following a slice, begin a new access unit.
    /// ISO/IEC 14496-10 - 7.4.1.2.3
    pub fn starts_access_unit(self) -> bool {
        match self {
            NalUnitType::Sei
            | NalUnitType::Sps
            | NalUnitType::Pps
            | NalUnitType::AccessUnitDelimiter
            | NalUnitType::Prefix
            | NalUnitType::SubsetSps => true,
            NalUnitType::Other(value) => (16..=18).contains(&value),
            _ => false,
        }
    }
}

/// Strips emulation prevention bytes (`00 00 03`) from at most `limit`
/// bytes of `ebsp`.
fn rbsp_prefix(ebsp: &[u8], limit: usize) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(limit.min(ebsp.len()));
    let mut zeros = 0;

    for &byte in ebsp.iter().take(limit) {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }

        zeros = if byte == 0 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }

    rbsp
}

/// Reads `first_mb_in_slice` from a slice NAL unit, header byte included.
pub fn first_mb_in_slice(nal: &[u8]) -> io::Result<u64> {
    let body = nal.get(1..).unwrap_or_default();
    // ue(v) of a 32-bit value spans at most 65 bits.
    let rbsp = rbsp_prefix(body, 16);
    BitReader::new(rbsp.as_slice()).read_exp_golomb()
}

/// Smallest length-prefix width able to carry a NAL unit of `size` bytes.
pub fn required_nalu_size_length(size: usize) -> u8 {
    match size {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        _ => 4,
    }
}

/// Largest NAL unit size a `width`-byte prefix can express.
pub(crate) fn max_nalu_size(width: u8) -> u64 {
    (1u64 << (8 * u32::from(width))) - 1
}
