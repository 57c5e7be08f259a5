use std::io;

/// A reader that reads individual bits (MSB first) from an underlying byte reader.
#[derive(Debug)]
pub struct BitReader<T> {
    data: T,
    bit_pos: u8,
    current_byte: u8,
}

impl<T: io::Read> BitReader<T> {
    /// Creates a new `BitReader` positioned at the first bit of `data`.
    pub fn new(data: T) -> Self {
        Self {
            data,
            bit_pos: 0,
            current_byte: 0,
        }
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        if self.is_aligned() {
            let mut buf = [0u8; 1];
            self.data.read_exact(&mut buf)?;
            self.current_byte = buf[0];
        }

        let bit = (self.current_byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos = (self.bit_pos + 1) % 8;

        Ok(bit == 1)
    }

    /// Reads `count` bits (at most 64) as an unsigned big-endian integer.
    pub fn read_bits(&mut self, count: u8) -> io::Result<u64> {
        if count > 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot read more than 64 bits at once",
            ));
        }

        let mut bits = 0u64;
        for _ in 0..count {
            bits = (bits << 1) | self.read_bit()? as u64;
        }

        Ok(bits)
    }

    /// Skips `count` bits.
    pub fn seek_bits(&mut self, count: usize) -> io::Result<()> {
        let mut remaining = count;

        // Finish the partially consumed byte first, then skip whole bytes.
        while remaining > 0 && !self.is_aligned() {
            self.read_bit()?;
            remaining -= 1;
        }

        let whole_bytes = remaining / 8;
        if whole_bytes > 0 {
            let skipped = io::copy(
                &mut io::Read::take(&mut self.data, whole_bytes as u64),
                &mut io::sink(),
            )?;
            if skipped != whole_bytes as u64 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "not enough data to skip",
                ));
            }
        }

        for _ in 0..remaining % 8 {
            self.read_bit()?;
        }

        Ok(())
    }

    /// Discards the rest of the current byte, if any.
    pub fn align(&mut self) {
        self.bit_pos = 0;
    }

    /// Returns `true` if the reader sits on a byte boundary.
    pub fn is_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// Returns the bit position within the current byte.
    pub fn bit_pos(&self) -> u8 {
        self.bit_pos
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &T {
        &self.data
    }

    /// Consumes the `BitReader`, returning the underlying reader.
    ///
    /// Any unread bits of a partially consumed byte are lost.
    pub fn into_inner(self) -> T {
        self.data
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_msb_first() {
        let mut reader = BitReader::new(&[0b1010_1100, 0b0101_0011][..]);
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(4).unwrap(), 0b1011);
        assert!(!reader.is_aligned());
        assert_eq!(reader.read_bits(6).unwrap(), 0b00_0101);
        assert_eq!(reader.bit_pos(), 4);
        assert_eq!(reader.read_bits(4).unwrap(), 0b0011);
        assert!(reader.is_aligned());
    }

    #[test]
    fn test_read_past_end() {
        let mut reader = BitReader::new(&[0xff][..]);
        assert_eq!(reader.read_bits(8).unwrap(), 0xff);
        let err = reader.read_bit().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_seek_bits() {
        let mut reader = BitReader::new(&[0b0000_0001, 0xaa, 0xbb, 0b1000_0000][..]);
        reader.seek_bits(7).unwrap();
        assert!(reader.read_bit().unwrap());
        reader.seek_bits(16).unwrap();
        assert!(reader.read_bit().unwrap());

        let mut reader = BitReader::new(&[0x00][..]);
        assert!(reader.seek_bits(9).is_err());
    }

    #[test]
    fn test_align() {
        let mut reader = BitReader::new(&[0xf0, 0x0f][..]);
        reader.read_bits(3).unwrap();
        reader.align();
        assert_eq!(reader.read_bits(8).unwrap(), 0x0f);
    }
}
