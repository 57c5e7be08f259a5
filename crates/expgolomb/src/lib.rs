//! Exponential-Golomb coding helpers on top of [`bytes_util::BitReader`] and
//! [`bytes_util::BitWriter`].
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::io;

use bytes_util::{BitReader, BitWriter};

/// Longest run of leading zeros accepted before a value is considered corrupt.
const MAX_LEADING_ZEROS: u32 = 32;

/// Extension trait for reading Exp-Golomb encoded values.
pub trait BitReaderExpGolombExt {
    /// Reads an unsigned Exp-Golomb value, `ue(v)`.
    fn read_exp_golomb(&mut self) -> io::Result<u64>;

    /// Reads a signed Exp-Golomb value, `se(v)`.
    fn read_signed_exp_golomb(&mut self) -> io::Result<i64> {
        let value = self.read_exp_golomb()?;
        if value % 2 == 0 {
            Ok(-((value / 2) as i64))
        } else {
            Ok((value / 2) as i64 + 1)
        }
    }
}

impl<R: io::Read> BitReaderExpGolombExt for BitReader<R> {
    fn read_exp_golomb(&mut self) -> io::Result<u64> {
        let mut leading_zeros = 0u32;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros >= MAX_LEADING_ZEROS {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "exp-golomb prefix too long",
                ));
            }
        }

        let suffix = self.read_bits(leading_zeros as u8)?;
        Ok((1u64 << leading_zeros) - 1 + suffix)
    }
}

/// Extension trait for writing Exp-Golomb encoded values.
pub trait BitWriterExpGolombExt {
    /// Writes an unsigned Exp-Golomb value, `ue(v)`.
    fn write_exp_golomb(&mut self, value: u64) -> io::Result<()>;

    /// Writes a signed Exp-Golomb value, `se(v)`.
    fn write_signed_exp_golomb(&mut self, value: i64) -> io::Result<()> {
        let mapped = if value <= 0 {
            value.unsigned_abs() * 2
        } else {
            value as u64 * 2 - 1
        };
        self.write_exp_golomb(mapped)
    }
}

impl<W: io::Write> BitWriterExpGolombExt for BitWriter<W> {
    fn write_exp_golomb(&mut self, value: u64) -> io::Result<()> {
        let code = value + 1;
        let bits = 64 - code.leading_zeros() as u8;
        self.write_bits(0, bits - 1)?;
        self.write_bits(code, bits)
    }
}

/// Returns the number of bits `value` occupies when Exp-Golomb encoded.
pub fn size_of_exp_golomb(value: u64) -> u64 {
    let bits = 64 - (value + 1).leading_zeros() as u64;
    bits * 2 - 1
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    fn encode(values: &[u64]) -> Vec<u8> {
        let mut writer = BitWriter::new(Vec::new());
        for &value in values {
            writer.write_exp_golomb(value).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_known_codes() {
        // 1 | 010 | 011 | 00100
        assert_eq!(encode(&[0, 1, 2, 3]), vec![0b1010_0110, 0b0100_0000]);
    }

    #[test]
    fn test_read_exp_golomb() {
        let buf = encode(&[0, 1, 2, 3, 254, 65535]);
        let mut reader = BitReader::new(buf.as_slice());
        for expected in [0, 1, 2, 3, 254, 65535] {
            assert_eq!(reader.read_exp_golomb().unwrap(), expected);
        }
    }

    #[test]
    fn test_signed_exp_golomb() {
        let mut writer = BitWriter::new(Vec::new());
        for value in [0i64, 1, -1, 2, -2, 1000, -1000] {
            writer.write_signed_exp_golomb(value).unwrap();
        }
        let buf = writer.finish().unwrap();

        let mut reader = BitReader::new(buf.as_slice());
        for expected in [0i64, 1, -1, 2, -2, 1000, -1000] {
            assert_eq!(reader.read_signed_exp_golomb().unwrap(), expected);
        }
    }

    #[test]
    fn test_prefix_too_long() {
        let buf = [0u8; 8];
        let mut reader = BitReader::new(&buf[..]);
        let err = reader.read_exp_golomb().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_size_of_exp_golomb() {
        assert_eq!(size_of_exp_golomb(0), 1);
        assert_eq!(size_of_exp_golomb(1), 3);
        assert_eq!(size_of_exp_golomb(3), 5);
        assert_eq!(size_of_exp_golomb(6), 5);
        assert_eq!(size_of_exp_golomb(7), 7);
    }
}
