//! EBML element headers, child iteration and value decoding.

use std::io::{self, Read};

use bytes::Bytes;

use crate::error::{MatroskaError, Result};

const MAX_ID_LENGTH: usize = 4;
const MAX_SIZE_LENGTH: usize = 8;

/// Length in bytes of the vint starting with `first`, from its marker bit.
fn vint_length(first: u8) -> Option<usize> {
    (first != 0).then(|| first.leading_zeros() as usize + 1)
}

/// Decodes a vint from the front of `data`, marker bit removed.
///
/// Returns the value and its encoded length, or `None` if `data` is too
/// short or starts with a zero byte.
pub fn decode_vint(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    let len = vint_length(first)?;
    let bytes = data.get(..len)?;

    let mut value = u64::from(first) & (0xff >> len);
    for &byte in &bytes[1..] {
        value = (value << 8) | u64::from(byte);
    }

    Some((value, len))
}

/// Whether `value` is the reserved all-ones value of a `len`-byte vint.
fn is_unknown_size(value: u64, len: usize) -> bool {
    value == (1u64 << (7 * len)) - 1
}

fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    id: u32,
    position: u64,
) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => MatroskaError::TruncatedElement { id, position },
        _ => MatroskaError::Io(err),
    })
}

/// An element header: ID and data size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element ID including its marker bits.
    pub id: u32,
    /// Data size, `None` for unknown-size elements.
    pub size: Option<u64>,
    /// File offset of the first ID byte.
    pub position: u64,
    /// Length of the ID and size fields together.
    pub header_len: u8,
}

impl ElementHeader {
    /// Reads a header located at `position`.
    ///
    /// Returns `Ok(None)` when the reader is exhausted before the first byte.
    pub fn read<R: Read>(reader: &mut R, position: u64) -> Result<Option<Self>> {
        let mut first = [0u8; 1];
        match reader.read_exact(&mut first) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let id_len = vint_length(first[0])
            .filter(|len| *len <= MAX_ID_LENGTH)
            .ok_or(MatroskaError::InvalidVint(position))?;

        let mut id_bytes = [0u8; MAX_ID_LENGTH];
        id_bytes[0] = first[0];
        read_exact_or_truncated(reader, &mut id_bytes[1..id_len], 0, position)?;
        let id = id_bytes[..id_len]
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));

        let mut size_bytes = [0u8; MAX_SIZE_LENGTH];
        read_exact_or_truncated(reader, &mut size_bytes[..1], id, position)?;
        let size_len = vint_length(size_bytes[0])
            .ok_or(MatroskaError::InvalidVint(position + id_len as u64))?;
        read_exact_or_truncated(reader, &mut size_bytes[1..size_len], id, position)?;

        let (size, _) = decode_vint(&size_bytes[..size_len])
            .ok_or(MatroskaError::InvalidVint(position + id_len as u64))?;

        Ok(Some(ElementHeader {
            id,
            size: (!is_unknown_size(size, size_len)).then_some(size),
            position,
            header_len: (id_len + size_len) as u8,
        }))
    }

    /// File offset of the first data byte.
    pub fn data_start(&self) -> u64 {
        self.position + u64::from(self.header_len)
    }

    /// File offset just past the element, when its size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.map(|size| self.data_start() + size)
    }
}

/// Iterator over the children of a fully read master element.
#[derive(Debug, Clone)]
pub struct Children {
    data: Bytes,
    pos: usize,
}

impl Children {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    fn next_child(&mut self) -> Result<(u32, Bytes)> {
        let mut slice = &self.data[self.pos..];
        let header = ElementHeader::read(&mut slice, self.pos as u64)?
            .ok_or(MatroskaError::InvalidVint(self.pos as u64))?;

        let size = header
            .size
            .ok_or(MatroskaError::UnknownSizeUnsupported(header.id))?;

        let start = header.data_start() as usize;
        let end = start
            .checked_add(size as usize)
            .filter(|end| *end <= self.data.len())
            .ok_or(MatroskaError::TruncatedElement {
                id: header.id,
                position: header.position,
            })?;

        self.pos = end;
        Ok((header.id, self.data.slice(start..end)))
    }
}

impl Iterator for Children {
    type Item = Result<(u32, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }

        let child = self.next_child();
        if child.is_err() {
            self.pos = self.data.len();
        }
        Some(child)
    }
}

/// Decodes an unsigned integer element.
pub fn read_uint(id: u32, data: &[u8]) -> Result<u64> {
    if data.len() > 8 {
        return Err(MatroskaError::InvalidValue {
            id,
            kind: "unsigned integer",
            len: data.len(),
        });
    }

    Ok(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Decodes a signed integer element.
pub fn read_sint(id: u32, data: &[u8]) -> Result<i64> {
    if data.len() > 8 {
        return Err(MatroskaError::InvalidValue {
            id,
            kind: "signed integer",
            len: data.len(),
        });
    }

    if data.is_empty() {
        return Ok(0);
    }

    let unsigned = data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let shift = 64 - 8 * data.len() as u32;
    Ok(((unsigned << shift) as i64) >> shift)
}

/// Decodes a float element.
pub fn read_float(id: u32, data: &[u8]) -> Result<f64> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f64::from(f32::from_be_bytes([data[0], data[1], data[2], data[3]]))),
        8 => Ok(f64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ])),
        len => Err(MatroskaError::InvalidValue {
            id,
            kind: "float",
            len,
        }),
    }
}

/// Decodes a string element, dropping trailing NUL padding.
pub fn read_string(data: &[u8]) -> String {
    let end = data.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vint() {
        assert_eq!(decode_vint(&[0x81]), Some((1, 1)));
        assert_eq!(decode_vint(&[0x40, 0x02]), Some((2, 2)));
        assert_eq!(decode_vint(&[0x10, 0x00, 0x00, 0x05]), Some((5, 4)));
        assert_eq!(decode_vint(&[0x40]), None);
        assert_eq!(decode_vint(&[0x00, 0x01]), None);
        assert_eq!(decode_vint(&[]), None);
    }

    #[test]
    fn test_element_header_read() {
        let data = [0x1A, 0x45, 0xDF, 0xA3, 0x84, 0, 0, 0, 0];
        let header = ElementHeader::read(&mut &data[..], 10).unwrap().unwrap();
        insta::assert_debug_snapshot!(header, @r"
        ElementHeader {
            id: 440786851,
            size: Some(
                4,
            ),
            position: 10,
            header_len: 5,
        }
        ");
        assert_eq!(header.data_start(), 15);
        assert_eq!(header.end(), Some(19));
    }

    #[test]
    fn test_element_header_unknown_size() {
        let data = [0x1F, 0x43, 0xB6, 0x75, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let header = ElementHeader::read(&mut &data[..], 0).unwrap().unwrap();
        assert_eq!(header.id, crate::ids::CLUSTER);
        assert_eq!(header.size, None);
        assert_eq!(header.end(), None);

        let header = ElementHeader::read(&mut &[0xA3, 0xFF][..], 0).unwrap().unwrap();
        assert_eq!(header.size, None);
    }

    #[test]
    fn test_element_header_eof_and_errors() {
        assert!(ElementHeader::read(&mut &[][..], 0).unwrap().is_none());
        assert!(matches!(
            ElementHeader::read(&mut &[0x00, 0x81][..], 7),
            Err(MatroskaError::InvalidVint(7))
        ));
        assert!(matches!(
            ElementHeader::read(&mut &[0x1A, 0x45][..], 0),
            Err(MatroskaError::TruncatedElement { .. })
        ));
    }

    #[test]
    fn test_children() {
        let data = Bytes::from_static(&[0xD7, 0x81, 0x01, 0x86, 0x82, b'A', b'B']);
        let children: Vec<_> = Children::new(data).collect::<Result<_>>().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], (0xD7, Bytes::from_static(&[0x01])));
        assert_eq!(children[1], (0x86, Bytes::from_static(b"AB")));

        let truncated = Bytes::from_static(&[0xD7, 0x84, 0x01]);
        let mut children = Children::new(truncated);
        assert!(matches!(
            children.next(),
            Some(Err(MatroskaError::TruncatedElement { id: 0xD7, .. }))
        ));
        assert!(children.next().is_none());
    }

    #[test]
    fn test_values() {
        assert_eq!(read_uint(0, &[]).unwrap(), 0);
        assert_eq!(read_uint(0, &[0x0F, 0x42, 0x40]).unwrap(), 1_000_000);
        assert!(read_uint(0, &[0; 9]).is_err());

        assert_eq!(read_sint(0, &[0xFF, 0xFE]).unwrap(), -2);
        assert_eq!(read_sint(0, &[0x7F]).unwrap(), 127);

        assert_eq!(read_float(0, &48000f32.to_be_bytes()).unwrap(), 48000.0);
        assert_eq!(read_float(0, &1.5f64.to_be_bytes()).unwrap(), 1.5);
        assert!(read_float(0, &[0; 3]).is_err());

        assert_eq!(read_string(b"eng\0\0"), "eng");
        assert_eq!(read_string(b""), "");
    }
}
