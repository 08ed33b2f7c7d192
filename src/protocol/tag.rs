use std::fmt;
use bytes::Bytes;
use crate::protocol::constants::*;

/// File header, parsed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
}

impl ContainerHeader {
    /// Decode the version and flags bytes of a matched header
    pub fn from_bytes(version: u8, flags: u8) -> Self {
        ContainerHeader {
            version,
            has_audio: flags & FLV_FLAG_AUDIO == FLV_FLAG_AUDIO,
            has_video: flags & FLV_FLAG_VIDEO == FLV_FLAG_VIDEO,
        }
    }

    /// Number of tracks announced by the flags
    pub fn track_count(&self) -> usize {
        usize::from(self.has_audio) + usize::from(self.has_video)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Audio,
    Video,
    Metadata,
}

impl FrameKind {
    /// Parse from record type field
    pub fn from_tag_type(tag_type: u8) -> Option<Self> {
        match tag_type {
            TAG_TYPE_AUDIO => Some(FrameKind::Audio),
            TAG_TYPE_VIDEO => Some(FrameKind::Video),
            TAG_TYPE_SCRIPT_DATA => Some(FrameKind::Metadata),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FrameKind::Audio => "Audio",
            FrameKind::Video => "Video",
            FrameKind::Metadata => "Data",
        }
    }
}

/// One container record.
///
/// Timestamps are container milliseconds. `pts` equals `dts` until the
/// codec normalizer applies the composition time offset of a video sample.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub dts: i64,
    pub pts: i64,
    pub payload: Bytes,
}

impl Frame {
    /// Create new frame
    pub fn new(kind: FrameKind, dts: i64, payload: Bytes) -> Self {
        Frame {
            kind,
            dts,
            pts: dts,
            payload,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == FrameKind::Audio
    }

    pub fn is_video(&self) -> bool {
        self.kind == FrameKind::Video
    }

    pub fn is_script_data(&self) -> bool {
        self.kind == FrameKind::Metadata
    }

    /// High nibble of the first video byte
    pub fn video_frame_type(&self) -> Option<u8> {
        if !self.is_video() {
            return None;
        }
        self.payload.first().map(|b| (b >> 4) & 0x0F)
    }

    /// Only frame type 1 opens a GOP; generated keyframes do not.
    pub fn is_keyframe(&self) -> bool {
        self.video_frame_type() == Some(VIDEO_FRAME_KEYFRAME)
    }

    pub fn is_aac(&self) -> bool {
        self.is_audio()
            && self.payload.first().is_some_and(|b| (b >> 4) & 0x0F == SOUND_FORMAT_AAC)
    }

    pub fn is_avc(&self) -> bool {
        self.is_video()
            && self.payload.first().is_some_and(|b| b & 0x0F == VIDEO_CODEC_AVC)
    }

    /// AAC or AVC out-of-band configuration record
    pub fn is_sequence_header(&self) -> bool {
        if self.is_audio() && !self.is_aac() {
            return false;
        }
        if !self.is_audio() && !self.is_video() {
            return false;
        }
        self.payload.get(1) == Some(&0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {:.2}s, {} bytes",
            self.kind.name(),
            self.dts as f64 / 1000.0,
            self.payload.len()
        )
    }
}

pub fn make_audio_frame(payload: Vec<u8>, dts: i64) -> Frame {
    Frame::new(FrameKind::Audio, dts, Bytes::from(payload))
}

pub fn make_video_frame(payload: Vec<u8>, dts: i64) -> Frame {
    Frame::new(FrameKind::Video, dts, Bytes::from(payload))
}
