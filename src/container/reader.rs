use log::{info, trace};
use crate::{ByteCursor, Error, Result};
use crate::protocol::*;

/// Incremental record reader.
///
/// Bytes are appended in arbitrary chunks; `try_read_frame` returns
/// `Ok(None)` while the backlog holds only part of the next record and
/// must be called again after the next `append`.
pub struct ContainerReader {
    /// Undecoded bytes
    backlog: ByteCursor,

    /// File header, once matched
    header: Option<ContainerHeader>,

    /// Upper bound on the backlog, 0 for none
    max_backlog: usize,
}

impl ContainerReader {
    /// Create new reader
    pub fn new() -> Self {
        ContainerReader {
            backlog: ByteCursor::with_capacity(4096),
            header: None,
            max_backlog: 0,
        }
    }

    /// Create reader that refuses to buffer more than `max_backlog` bytes
    pub fn with_max_backlog(max_backlog: usize) -> Self {
        ContainerReader {
            max_backlog,
            ..ContainerReader::new()
        }
    }

    /// Header parsed from the stream, if seen yet
    pub fn header(&self) -> Option<ContainerHeader> {
        self.header
    }

    /// Bytes waiting to be decoded
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    /// Queue bytes for decoding
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.max_backlog > 0 && self.backlog.len() + bytes.len() > self.max_backlog {
            return Err(Error::malformed(format!(
                "backlog would exceed {} bytes, buffered={}, incoming={}",
                self.max_backlog,
                self.backlog.len(),
                bytes.len()
            )));
        }
        self.backlog.append(bytes);
        Ok(())
    }

    /// Extract the next complete record
    pub fn try_read_frame(&mut self) -> Result<Option<Frame>> {
        if self.header.is_none() && !self.read_header()? {
            return Ok(None);
        }

        if !self.backlog.has_remaining(TAG_HEADER_SIZE) {
            return Ok(None);
        }

        let (kind, size, dts) = self.parse_tag_header()?;

        let record_len = TAG_HEADER_SIZE + size + PREVIOUS_TAG_SIZE_LEN;
        if !self.backlog.has_remaining(record_len) {
            return Ok(None);
        }

        let trailing = self
            .backlog
            .u32_be_at(TAG_HEADER_SIZE + size)
            .ok_or_else(|| Error::malformed("truncated previous tag size"))?;
        if trailing as usize != size + TAG_HEADER_SIZE {
            return Err(Error::malformed(format!(
                "invalid previous tag size={}, size={}",
                trailing, size
            )));
        }

        self.backlog.advance(TAG_HEADER_SIZE);
        let payload = self.backlog.split_to(size);
        self.backlog.advance(PREVIOUS_TAG_SIZE_LEN);

        let frame = Frame::new(kind, dts, payload);
        trace!("read {}", frame);
        Ok(Some(frame))
    }

    /// Match and skip the file header. Returns false until enough bytes arrive.
    fn read_header(&mut self) -> Result<bool> {
        if !self.backlog.has_remaining(FLV_HEADER_SIZE) {
            return Ok(false);
        }

        let bytes = self.backlog.as_slice();
        if bytes[..3] != FLV_SIGNATURE {
            return Err(Error::malformed(format!(
                "invalid signature {:02x} {:02x} {:02x}",
                bytes[0], bytes[1], bytes[2]
            )));
        }

        let header = ContainerHeader::from_bytes(bytes[3], bytes[4]);
        info!(
            "container header: version={}, audio={}, video={}",
            header.version, header.has_audio, header.has_video
        );
        self.header = Some(header);
        self.backlog.advance(FLV_HEADER_SIZE);
        Ok(true)
    }

    /// Type, payload size and decode timestamp of the record at the front
    fn parse_tag_header(&self) -> Result<(FrameKind, usize, i64)> {
        let raw_type = self.backlog.u8_at(0).unwrap_or_default() & 0x1F;
        let kind = FrameKind::from_tag_type(raw_type)
            .ok_or_else(|| Error::malformed(format!("invalid type={}", raw_type)))?;

        let size = self.backlog.u24_be_at(1).unwrap_or_default() as usize;

        // 24 low bits followed by the extended high byte
        let low = self.backlog.u24_be_at(4).unwrap_or_default();
        let high = self.backlog.u8_at(7).unwrap_or_default();
        let dts = ((u32::from(high) << 24) | low) as i32;
        if dts < 0 {
            return Err(Error::malformed(format!("invalid dts={}", dts)));
        }

        Ok((kind, size, i64::from(dts)))
    }
}

impl Default for ContainerReader {
    fn default() -> Self {
        Self::new()
    }
}
