use std::io;

use bytes::Bytes;

/// Zero-copy extraction helpers for `io::Cursor<Bytes>`.
pub trait BytesCursorExt {
    /// Extracts the next `size` bytes as a `Bytes` slice and advances the cursor.
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes>;

    /// Extracts everything after the cursor position and advances to the end.
    fn extract_remaining(&mut self) -> Bytes;
}

impl BytesCursorExt for io::Cursor<Bytes> {
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let position = self.position() as usize;
        let len = self.get_ref().len();
        if position > len || len - position < size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough bytes in cursor",
            ));
        }

        let slice = self.get_ref().slice(position..position + size);
        self.set_position((position + size) as u64);

        Ok(slice)
    }

    fn extract_remaining(&mut self) -> Bytes {
        let position = (self.position() as usize).min(self.get_ref().len());
        let remaining = self.get_ref().slice(position..);
        self.set_position(self.get_ref().len() as u64);
        remaining
    }
}
