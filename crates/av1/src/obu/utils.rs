use std::io;

use bytes_util::BitReader;

use crate::error::{Av1Error, Result};

/// Maximum number of bytes a `leb128()` value may occupy.
const MAX_LEB128_BYTES: usize = 8;

/// Longest run of leading zeros accepted by [`read_uvlc`].
const MAX_UVLC_LEADING_ZEROS: u8 = 32;

/// Read a little-endian variable-length integer.
/// AV1-Spec-2 - 4.10.5
///
/// At most 8 bytes are consumed. A value whose eighth byte still has the
/// continuation bit set fails with [`Av1Error::MalformedLength`].
pub fn read_leb128<T: io::Read>(reader: &mut BitReader<T>) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_LEB128_BYTES {
        let byte = reader.read_bits(8)?;
        value |= (byte & 0x7f) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(Av1Error::MalformedLength(
        "leb128 does not terminate within 8 bytes",
    ))
}

/// Write a little-endian variable-length integer.
/// AV1-Spec-2 - 4.10.5
///
/// Returns the number of bytes written.
pub fn write_leb128<W: io::Write>(writer: &mut W, mut value: u64) -> io::Result<usize> {
    let mut bytes_written = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_all(&[byte])?;
        bytes_written += 1;
        if value == 0 {
            break;
        }
    }
    Ok(bytes_written)
}

/// Returns the number of bytes needed to encode `value` as LEB128.
pub fn leb128_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

/// Read a variable-length unsigned integer.
/// AV1-Spec-2 - 4.10.3
///
/// Runs of 32 or more leading zero bits are rejected with
/// [`Av1Error::MalformedLength`], which bounds the result to `2^32 - 2`.
pub fn read_uvlc<T: io::Read>(reader: &mut BitReader<T>) -> Result<u64> {
    let mut leading_zeros = 0u8;
    while !reader.read_bit()? {
        leading_zeros += 1;
        if leading_zeros >= MAX_UVLC_LEADING_ZEROS {
            return Err(Av1Error::MalformedLength("uvlc prefix too long"));
        }
    }

    let value = reader.read_bits(leading_zeros)?;
    Ok(value + (1 << leading_zeros) - 1)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes_util::BitWriter;
    use proptest::prelude::*;

    use super::*;

    fn decode_leb128(buf: &[u8]) -> Result<u64> {
        let mut reader = BitReader::new(buf);
        read_leb128(&mut reader)
    }

    fn encode_uvlc(value: u64) -> Vec<u8> {
        let code = value + 1;
        let bits = 64 - code.leading_zeros() as u8;
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0, bits - 1).unwrap();
        writer.write_bits(code, bits).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_read_leb128() {
        assert_eq!(
            decode_leb128(&[0b11010101, 0b00101010]).unwrap(),
            0b1010101010101
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        /// Every value below 2^56 fits in at most 8 leb128 bytes and reads
        /// back unchanged.
        #[test]
        fn prop_leb128_round_trip_up_to_56_bits(value in 0u64..=(1 << 56) - 1) {
            let mut buf = Vec::new();
            let written = write_leb128(&mut buf, value).unwrap();
            prop_assert_eq!(written, leb128_size(value));
            prop_assert!(written <= 8);
            prop_assert_eq!(decode_leb128(&buf).unwrap(), value);
        }

        /// Every uvlc value up to 2^32 - 2 reads back unchanged.
        #[test]
        fn prop_uvlc_round_trip(value in 0u64..=(1 << 32) - 2) {
            let buf = encode_uvlc(value);
            let mut reader = BitReader::new(buf.as_slice());
            prop_assert_eq!(read_uvlc(&mut reader).unwrap(), value);
        }
    }

    #[test]
    fn test_leb128_largest_eight_byte_value() {
        let mut buf = Vec::new();
        assert_eq!(write_leb128(&mut buf, (1 << 56) - 1).unwrap(), 8);
        assert_eq!(decode_leb128(&buf).unwrap(), (1 << 56) - 1);
    }

    #[test]
    fn test_leb128_ninth_byte_is_malformed() {
        let mut buf = Vec::new();
        write_leb128(&mut buf, 1 << 56).unwrap();
        assert_eq!(buf.len(), 9);

        let err = decode_leb128(&buf).unwrap_err();
        assert!(matches!(err, Av1Error::MalformedLength(_)));
    }

    #[test]
    fn test_leb128_truncated() {
        let err = decode_leb128(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err, Av1Error::BufferExhausted));
    }

    #[test]
    fn test_write_leb128() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (16383, &[0xff, 0x7f]),
            (16384, &[0x80, 0x80, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            write_leb128(&mut buf, value).unwrap();
            assert_eq!(buf, expected);
        }
    }

    #[test]
    fn test_read_uvlc() {
        let mut reader = BitReader::new(&[0x01, 0xff][..]);
        assert_eq!(read_uvlc(&mut reader).unwrap(), 0xfe);
    }

    #[test]
    fn test_uvlc_largest_value() {
        let buf = encode_uvlc((1 << 32) - 2);
        let mut reader = BitReader::new(buf.as_slice());
        assert_eq!(read_uvlc(&mut reader).unwrap(), (1 << 32) - 2);
    }

    #[test]
    fn test_uvlc_pathological_prefix() {
        let mut reader = BitReader::new(&[0x00, 0x00, 0x00, 0x00, 0x01][..]);
        let err = read_uvlc(&mut reader).unwrap_err();
        assert!(matches!(err, Av1Error::MalformedLength(_)));
    }

    #[test]
    fn test_uvlc_truncated() {
        let mut reader = BitReader::new(&[0x00][..]);
        let err = read_uvlc(&mut reader).unwrap_err();
        assert!(matches!(err, Av1Error::BufferExhausted));
    }
}
