use bytes::{BufMut, Bytes, BytesMut};
use log::info;
use crate::{Error, Frame, Result};
use crate::protocol::{AAC_PACKET_SEQUENCE_HEADER, SOUND_FORMAT_AAC};

/// Length of an ADTS header without CRC
pub const ADTS_HEADER_SIZE: usize = 7;

/// Largest raw frame the 13-bit ADTS frame length can describe
pub const MAX_ADTS_PAYLOAD: usize = 0x1FFF - ADTS_HEADER_SIZE;

/// Sampling frequencies addressed by the 4-bit sampling index
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// MPEG-4 audio object types that matter for the ADTS profile
pub mod object_type {
    pub const AAC_MAIN: u8 = 1;
    pub const AAC_LC: u8 = 2;
    pub const AAC_SSR: u8 = 3;
    pub const AAC_HE: u8 = 5;
    pub const AAC_HE_V2: u8 = 29;
}

/// ADTS profile field for an object type
pub fn adts_profile(object_type: u8) -> u8 {
    match object_type {
        object_type::AAC_MAIN => 0,
        object_type::AAC_LC | object_type::AAC_HE | object_type::AAC_HE_V2 => 1,
        object_type::AAC_SSR => 2,
        _ => 3,
    }
}

/// AudioSpecificConfig fields, captured once per session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AacConfig {
    /// Audio object type
    pub object_type: u8,

    /// Sampling frequency index
    pub sampling_index: u8,

    /// Channel configuration
    pub channel_config: u8,

    /// Bits per sample announced by the tag header
    pub sample_size: u8,
}

impl AacConfig {
    /// Sample rate in Hz, if the index is a known one
    pub fn sample_rate(&self) -> Option<u32> {
        AAC_SAMPLE_RATES.get(self.sampling_index as usize).copied()
    }

    /// Build the 7-byte ADTS header for a raw frame of `raw_len` bytes
    pub fn adts_header(&self, raw_len: usize) -> [u8; ADTS_HEADER_SIZE] {
        let frame_length = raw_len + ADTS_HEADER_SIZE;
        let profile = adts_profile(self.object_type);

        let mut header = [0u8; ADTS_HEADER_SIZE];
        // syncword 0xFFF, MPEG-4, layer 0, protection absent
        header[0] = 0xFF;
        header[1] = 0xF1;
        header[2] = ((profile << 6) & 0xC0)
            | ((self.sampling_index << 2) & 0x3C)
            | ((self.channel_config >> 2) & 0x01);
        header[3] = ((self.channel_config << 6) & 0xC0) | ((frame_length >> 11) & 0x03) as u8;
        header[4] = (frame_length >> 3) as u8;
        // low 3 bits of the length
        header[5] = ((frame_length << 5) & 0xE0) as u8;
        header[6] = 0xFC;
        header
    }
}

pub struct AudioProcessor {
    /// AAC specific config
    aac_config: Option<AacConfig>,
}

impl AudioProcessor {
    /// Create new audio processor
    pub fn new() -> Self {
        AudioProcessor { aac_config: None }
    }

    /// Convert an AAC frame into one ADTS unit.
    ///
    /// Returns `Ok(None)` for the sequence header, which only updates state.
    pub fn to_adts(&mut self, frame: &mut Frame) -> Result<Option<Bytes>> {
        frame.pts = frame.dts;

        let payload = &frame.payload;
        if payload.len() < 2 {
            return Err(Error::framing(format!("audio tag invalid, size={}", payload.len())));
        }

        let tag_header = payload[0];
        let sound_format = (tag_header >> 4) & 0x0F;
        if sound_format != SOUND_FORMAT_AAC {
            return Err(Error::unsupported_codec(format!(
                "audio is not aac, format={}",
                sound_format
            )));
        }
        let sample_size = if (tag_header >> 1) & 0x01 == 0 { 8 } else { 16 };

        let aac_packet_type = payload[1];
        let body = &payload[2..];

        if aac_packet_type == AAC_PACKET_SEQUENCE_HEADER {
            self.parse_aac_config(body, sample_size)?;
            return Ok(None);
        }

        let config = self
            .aac_config
            .ok_or_else(|| Error::missing_config("no aac sequence header"))?;
        if body.len() > MAX_ADTS_PAYLOAD {
            return Err(Error::framing(format!(
                "aac frame too large for adts, size={}, max={}",
                body.len(),
                MAX_ADTS_PAYLOAD
            )));
        }

        let mut adts = BytesMut::with_capacity(body.len() + ADTS_HEADER_SIZE);
        adts.put_slice(&config.adts_header(body.len()));
        adts.put_slice(body);
        Ok(Some(adts.freeze()))
    }

    /// Parse AAC audio specific config
    fn parse_aac_config(&mut self, data: &[u8], sample_size: u8) -> Result<()> {
        if data.len() < 2 {
            return Err(Error::framing(format!(
                "aac sequence header invalid, size={}",
                data.len()
            )));
        }

        // AudioSpecificConfig ISO 14496-3, only the first two bytes
        let byte1 = data[0];
        let byte2 = data[1];

        let config = AacConfig {
            object_type: (byte1 >> 3) & 0x1F,
            sampling_index: ((byte1 << 1) & 0x0E) | ((byte2 >> 7) & 0x01),
            channel_config: (byte2 >> 3) & 0x0F,
            sample_size,
        };
        info!(
            "aac config: object={}, sampling_index={}, channels={}",
            config.object_type, config.sampling_index, config.channel_config
        );
        self.aac_config = Some(config);

        Ok(())
    }

    /// Current configuration, once the sequence header was seen
    pub fn config(&self) -> Option<&AacConfig> {
        self.aac_config.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.aac_config.is_some()
    }
}

impl Default for AudioProcessor {
    fn default() -> Self {
        Self::new()
    }
}
