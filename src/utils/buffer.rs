use std::io::{Cursor, Error as IoError, ErrorKind, Result as IoResult};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, Bytes, BytesMut};

/// Growable backlog of undecoded bytes.
///
/// Appended chunks are accumulated in one contiguous buffer; a consumed
/// record is split off the front without copying.
pub struct ByteCursor {
    buffer: BytesMut,
}

impl ByteCursor {
    /// Create an empty cursor
    pub fn new() -> Self {
        ByteCursor {
            buffer: BytesMut::new(),
        }
    }

    /// Create an empty cursor with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteCursor {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes at the tail
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if at least n bytes are buffered
    pub fn has_remaining(&self, n: usize) -> bool {
        self.buffer.len() >= n
    }

    /// View of all buffered bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Byte at offset
    pub fn u8_at(&self, offset: usize) -> Option<u8> {
        self.buffer.get(offset).copied()
    }

    /// 24-bit big endian integer at offset
    pub fn u24_be_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.buffer.get(offset..offset + 3)?;
        let mut cursor = Cursor::new(bytes);
        cursor.read_u24::<BigEndian>().ok()
    }

    /// 32-bit big endian integer at offset
    pub fn u32_be_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.buffer.get(offset..offset + 4)?;
        let mut cursor = Cursor::new(bytes);
        cursor.read_u32::<BigEndian>().ok()
    }

    /// Drop n bytes from the front
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.advance(n);
    }

    /// Split n bytes off the front as an immutable buffer
    pub fn split_to(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ByteCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequential big endian reader over a borrowed payload.
pub struct ByteReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, cursor: 0 }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    /// Check if reader has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Unread tail of the payload
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.cursor.min(self.data.len())..]
    }

    fn ensure(&self, n: usize) -> IoResult<()> {
        if !self.has_remaining(n) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "Not enough bytes"));
        }
        Ok(())
    }

    fn window(&self, n: usize) -> Cursor<&'a [u8]> {
        Cursor::new(&self.data[self.cursor..self.cursor + n])
    }

    /// Read a borrowed slice
    pub fn read_bytes(&mut self, len: usize) -> IoResult<&'a [u8]> {
        self.ensure(len)?;
        let bytes = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    /// Skip n bytes
    pub fn skip(&mut self, len: usize) -> IoResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read u8
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.ensure(1)?;
        let value = self.data[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    /// Read u16 (big endian)
    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        self.ensure(2)?;
        let value = self.window(2).read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read i16 (big endian)
    pub fn read_i16_be(&mut self) -> IoResult<i16> {
        self.ensure(2)?;
        let value = self.window(2).read_i16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read u24 (big endian)
    pub fn read_u24_be(&mut self) -> IoResult<u32> {
        self.ensure(3)?;
        let value = self.window(3).read_u24::<BigEndian>()?;
        self.cursor += 3;
        Ok(value)
    }

    /// Read i24 (big endian, two's complement)
    pub fn read_i24_be(&mut self) -> IoResult<i32> {
        self.ensure(3)?;
        let value = self.window(3).read_i24::<BigEndian>()?;
        self.cursor += 3;
        Ok(value)
    }

    /// Read u32 (big endian)
    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        self.ensure(4)?;
        let value = self.window(4).read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Read f64 (big endian)
    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        self.ensure(8)?;
        let value = self.window(8).read_f64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_peek_and_split() {
        let mut cursor = ByteCursor::new();
        cursor.append(&[0x09, 0x00, 0x01]);
        cursor.append(&[0x02, 0xAA, 0xBB, 0xCC, 0xDD]);

        assert_eq!(cursor.len(), 8);
        assert_eq!(cursor.u8_at(0), Some(0x09));
        assert_eq!(cursor.u24_be_at(1), Some(0x000102));
        assert_eq!(cursor.u32_be_at(4), Some(0xAABBCCDD));
        assert_eq!(cursor.u32_be_at(5), None);

        cursor.advance(4);
        let head = cursor.split_to(2);
        assert_eq!(&head[..], &[0xAA, 0xBB]);
        assert_eq!(cursor.as_slice(), &[0xCC, 0xDD]);
    }

    #[test]
    fn test_reader_signed_24() {
        let data = [0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x21];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_i24_be().unwrap(), -2);
        assert_eq!(reader.read_u24_be().unwrap(), 33);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_boundary_checks() {
        let data = vec![1, 2];
        let mut reader = ByteReader::new(&data);

        assert!(reader.read_u16_be().is_ok());
        assert!(reader.read_u8().is_err());
        assert_eq!(reader.position(), 2);
    }
}
