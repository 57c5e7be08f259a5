use std::io;

/// A writer that packs individual bits (MSB first) into bytes.
#[derive(Debug)]
pub struct BitWriter<W> {
    writer: W,
    bit_pos: u8,
    current_byte: u8,
}

impl<W: io::Write> BitWriter<W> {
    /// Creates a new `BitWriter` over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bit_pos: 0,
            current_byte: 0,
        }
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        if bit {
            self.current_byte |= 1 << (7 - self.bit_pos);
        }

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.writer.write_all(&[self.current_byte])?;
            self.current_byte = 0;
            self.bit_pos = 0;
        }

        Ok(())
    }

    /// Writes the low `count` bits of `bits`, most significant first.
    pub fn write_bits(&mut self, bits: u64, count: u8) -> io::Result<()> {
        for i in (0..count.min(64)).rev() {
            self.write_bit((bits >> i) & 1 == 1)?;
        }

        Ok(())
    }

    /// Returns `true` if the writer sits on a byte boundary.
    pub fn is_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// Pads the current byte with zero bits.
    pub fn align(&mut self) -> io::Result<()> {
        while !self.is_aligned() {
            self.write_bit(false)?;
        }

        Ok(())
    }

    /// Pads to a byte boundary and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.align()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;
    use crate::BitReader;

    #[test]
    fn test_write_bits() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(0b011, 3).unwrap();
        writer.write_bits(0xabc, 12).unwrap();
        assert!(writer.is_aligned());
        assert_eq!(writer.finish().unwrap(), vec![0b1011_1010, 0b1011_1100]);
    }

    #[test]
    fn test_finish_pads_with_zeros() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0b111, 3).unwrap();
        let buf = writer.finish().unwrap();
        assert_eq!(buf, vec![0b1110_0000]);

        let mut reader = BitReader::new(buf.as_slice());
        assert_eq!(reader.read_bits(3).unwrap(), 0b111);
        assert_eq!(reader.read_bits(5).unwrap(), 0);
    }
}
