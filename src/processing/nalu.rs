//! NAL unit demuxing and Annex-B remuxing for AVC samples.
//!
//! Samples arrive either as Annex-B byte streams (start-code delimited) or
//! as length-prefixed NAL units (ISO BMFF style). The format is guessed on
//! the first sample and trusted afterwards; when the trusted format stops
//! parsing, the other one is tried once before the sample is rejected.

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, warn};
use crate::{Error, Result};

/// 4-byte start code, used for the AUD and the SPS
pub const START_CODE_LONG: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// 3-byte start code, used for every other NAL unit
pub const START_CODE_SHORT: [u8; 3] = [0x00, 0x00, 0x01];

/// Access unit delimiter, primary_pic_type 7 (any slice type)
pub const AUD_NALU: [u8; 2] = [0x09, 0xF0];

/// H.264 Table 7-1 NAL unit types
pub mod nalu_type {
    pub const NON_IDR: u8 = 1;
    pub const IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const ACCESS_UNIT_DELIMITER: u8 = 9;
}

/// NAL unit type of a unit (low 5 bits of its header byte)
pub fn nal_unit_type(nalu: &[u8]) -> u8 {
    nalu.first().map(|b| b & 0x1F).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Not decided yet; the next sample is probed
    Unknown,
    /// Start-code delimited
    AnnexB,
    /// Big endian length before each unit
    LengthPrefixed,
}

impl PayloadFormat {
    fn name(&self) -> &str {
        match self {
            PayloadFormat::Unknown => "unknown",
            PayloadFormat::AnnexB => "annexb",
            PayloadFormat::LengthPrefixed => "length-prefixed",
        }
    }
}

/// Tracks the trusted payload format across samples.
#[derive(Debug, Clone)]
pub struct NaluDemuxer {
    format: PayloadFormat,
}

impl NaluDemuxer {
    pub fn new() -> Self {
        NaluDemuxer {
            format: PayloadFormat::Unknown,
        }
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Split one sample into NAL units.
    ///
    /// `length_size` is the prefix width from the decoder configuration.
    pub fn demux<'a>(&mut self, buf: &'a [u8], length_size: usize) -> Result<Vec<&'a [u8]>> {
        let (first, second) = match self.format {
            PayloadFormat::Unknown | PayloadFormat::AnnexB => {
                (PayloadFormat::AnnexB, PayloadFormat::LengthPrefixed)
            }
            PayloadFormat::LengthPrefixed => (PayloadFormat::LengthPrefixed, PayloadFormat::AnnexB),
        };

        let first_err = match Self::trial(first, buf, length_size) {
            Ok(nalus) => {
                self.transition(first);
                return Ok(nalus);
            }
            Err(e) => e,
        };

        match Self::trial(second, buf, length_size) {
            Ok(nalus) => {
                if self.format != PayloadFormat::Unknown {
                    warn!(
                        "avc payload is no longer {} ({}), switching to {}",
                        first.name(),
                        first_err,
                        second.name()
                    );
                }
                self.transition(second);
                Ok(nalus)
            }
            Err(second_err) => Err(Error::framing(format!(
                "invalid format, not annexb or length-prefixed: {}; {}",
                first_err, second_err
            ))),
        }
    }

    fn transition(&mut self, format: PayloadFormat) {
        if self.format != format {
            debug!("avc payload format {} -> {}", self.format.name(), format.name());
            self.format = format;
        }
    }

    fn trial(format: PayloadFormat, buf: &[u8], length_size: usize) -> std::result::Result<Vec<&[u8]>, String> {
        match format {
            PayloadFormat::AnnexB => demux_annexb(buf).ok_or_else(|| "no leading start code".to_string()),
            PayloadFormat::LengthPrefixed => demux_length_prefixed(buf, length_size),
            PayloadFormat::Unknown => Err("format not decided".to_string()),
        }
    }
}

impl Default for NaluDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset just past a `00 .. 00 00 01` prefix at the start of `buf`
fn leading_start_code(buf: &[u8]) -> Option<usize> {
    let zeros = buf.iter().take_while(|&&b| b == 0).count();
    if zeros >= 2 && buf.get(zeros) == Some(&0x01) {
        Some(zeros + 1)
    } else {
        None
    }
}

/// Position of the next `00 00 01` at or after `from`
fn find_start_code(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(3)
        .position(|w| w == START_CODE_SHORT)
        .map(|p| p + from)
}

/// Split an Annex-B buffer; `None` if it does not open with a start code
pub fn demux_annexb(buf: &[u8]) -> Option<Vec<&[u8]>> {
    let mut start = leading_start_code(buf)?;
    let mut nalus = Vec::new();

    loop {
        let end = find_start_code(buf, start).unwrap_or(buf.len());
        let mut nalu = &buf[start..end];
        // zero bytes before a start code belong to it
        while let [head @ .., 0] = nalu {
            nalu = head;
        }
        if !nalu.is_empty() {
            nalus.push(nalu);
        }
        if end == buf.len() {
            break;
        }
        start = end + START_CODE_SHORT.len();
    }

    Some(nalus)
}

/// Split a length-prefixed buffer. Any underrun rejects the whole sample.
pub fn demux_length_prefixed(buf: &[u8], length_size: usize) -> std::result::Result<Vec<&[u8]>, String> {
    let mut nalus = Vec::new();
    let mut rest = buf;

    while !rest.is_empty() {
        if rest.len() < length_size {
            return Err(format!(
                "invalid nalu length, require={}, size={}",
                length_size,
                rest.len()
            ));
        }
        let length = rest[..length_size]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        rest = &rest[length_size..];

        if rest.len() < length {
            return Err(format!("invalid nalu, require={}, size={}", length, rest.len()));
        }
        let (nalu, tail) = rest.split_at(length);
        if !nalu.is_empty() {
            nalus.push(nalu);
        }
        rest = tail;
    }

    Ok(nalus)
}

/// Remux NAL units into one Annex-B access unit.
///
/// Layout: AUD, then SPS and PPS when an IDR slice is present, then every
/// unit except SPS/PPS/AUD.
pub fn mux_annexb(nalus: &[&[u8]], sps: &[u8], pps: &[u8]) -> Bytes {
    let has_idr = nalus.iter().any(|n| nal_unit_type(n) == nalu_type::IDR);

    let mut size = START_CODE_LONG.len() + AUD_NALU.len();
    if has_idr {
        size += START_CODE_LONG.len() + sps.len() + START_CODE_SHORT.len() + pps.len();
    }
    size += nalus
        .iter()
        .map(|n| START_CODE_SHORT.len() + n.len())
        .sum::<usize>();

    let mut frame = BytesMut::with_capacity(size);
    frame.put_slice(&START_CODE_LONG);
    frame.put_slice(&AUD_NALU);

    if has_idr {
        if !sps.is_empty() {
            frame.put_slice(&START_CODE_LONG);
            frame.put_slice(sps);
        }
        if !pps.is_empty() {
            frame.put_slice(&START_CODE_SHORT);
            frame.put_slice(pps);
        }
    }

    for nalu in nalus {
        match nal_unit_type(nalu) {
            nalu_type::SPS | nalu_type::PPS | nalu_type::ACCESS_UNIT_DELIMITER => continue,
            _ => {}
        }
        frame.put_slice(&START_CODE_SHORT);
        frame.put_slice(nalu);
    }

    frame.freeze()
}
