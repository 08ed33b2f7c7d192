use bytes::Bytes;
use log::trace;
use crate::{Error, Frame, FrameKind, Result};

mod audio;
mod video;
mod nalu;
mod sps;
mod metadata;

pub use audio::*;
pub use video::*;
pub use nalu::*;
pub use sps::*;
pub use metadata::*;

/// Session codec state: turns container payloads into elementary
/// bitstreams (ADTS audio, Annex-B video) and decodes script data.
#[derive(Default)]
pub struct CodecNormalizer {
    audio: AudioProcessor,
    video: VideoProcessor,
    metadata: MetadataProcessor,
}

impl CodecNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// AAC frame to one ADTS unit; `None` for the configuration record
    pub fn to_elementary_audio(&mut self, frame: &mut Frame) -> Result<Option<Bytes>> {
        self.audio.to_adts(frame)
    }

    /// AVC frame to one Annex-B access unit; `None` when no sample is carried.
    ///
    /// Updates `frame.pts` with the composition time offset.
    pub fn to_elementary_video(&mut self, frame: &mut Frame) -> Result<Option<Bytes>> {
        self.video.to_annexb(frame)
    }

    /// Decode a script data record
    pub fn script_data(&mut self, frame: &Frame) -> Result<ScriptData> {
        if !frame.is_script_data() {
            return Err(Error::invalid_state(format!("not a script data frame: {}", frame)));
        }
        self.metadata.process(&frame.payload)
    }

    /// Dispatch an audio or video frame by kind
    pub fn normalize(&mut self, frame: &mut Frame) -> Result<Option<Bytes>> {
        trace!("normalize {}", frame);
        match frame.kind {
            FrameKind::Audio => self.to_elementary_audio(frame),
            FrameKind::Video => self.to_elementary_video(frame),
            FrameKind::Metadata => Err(Error::invalid_state(
                "script data has no elementary bitstream",
            )),
        }
    }

    pub fn audio_config(&self) -> Option<&AacConfig> {
        self.audio.config()
    }

    pub fn video_config(&self) -> Option<&AvcConfig> {
        self.video.config()
    }

    /// Trusted AVC payload framing
    pub fn payload_format(&self) -> PayloadFormat {
        self.video.payload_format()
    }

    /// Last `onMetaData` decoded
    pub fn stream_metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.metadata()
    }
}
