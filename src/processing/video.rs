use bytes::Bytes;
use log::{debug, info, warn};
use crate::{ByteReader, Error, Frame, Result};
use crate::processing::nalu::{mux_annexb, NaluDemuxer, PayloadFormat};
use crate::processing::sps::{parse_sps, SpsInfo};
use crate::protocol::*;

/// AVCDecoderConfigurationRecord fields, captured once per session
#[derive(Debug, Clone)]
pub struct AvcConfig {
    /// AVC profile
    pub profile: u8,

    /// AVC profile compatibility
    pub profile_compat: u8,

    /// AVC level
    pub level: u8,

    /// Width of the NAL unit length prefix: 1, 2 or 4
    pub nalu_length_size: usize,

    /// Sequence parameter set
    pub sps: Bytes,

    /// Picture parameter set
    pub pps: Bytes,

    /// Geometry decoded from the SPS, when it could be parsed
    pub sps_info: Option<SpsInfo>,
}

pub struct VideoProcessor {
    /// AVC configuration
    avc_config: Option<AvcConfig>,

    /// Trusted payload format
    demuxer: NaluDemuxer,
}

impl VideoProcessor {
    /// Create new video processor
    pub fn new() -> Self {
        VideoProcessor {
            avc_config: None,
            demuxer: NaluDemuxer::new(),
        }
    }

    /// Convert an AVC frame into one Annex-B access unit.
    ///
    /// Sets `frame.pts` from the composition time offset. Returns
    /// `Ok(None)` for records that carry no sample: info frames, the
    /// sequence header and end-of-sequence markers.
    pub fn to_annexb(&mut self, frame: &mut Frame) -> Result<Option<Bytes>> {
        let payload = frame.payload.clone();
        if payload.len() < 5 {
            return Err(Error::framing(format!("video tag invalid, size={}", payload.len())));
        }

        let mut reader = ByteReader::new(&payload);
        let tag_header = reader.read_u8()?;
        let frame_type = (tag_header >> 4) & 0x0F;
        let codec_id = tag_header & 0x0F;

        if frame_type == VIDEO_FRAME_INFO {
            warn!("ignore video info frame at dts={}", frame.dts);
            return Ok(None);
        }

        if codec_id != VIDEO_CODEC_AVC {
            return Err(Error::unsupported_codec(format!(
                "only support avc, actual={}",
                codec_id
            )));
        }

        let avc_packet_type = reader.read_u8()?;
        let composition_time = reader.read_i24_be()?;
        frame.pts = frame.dts + i64::from(composition_time);

        let body = reader.rest();
        match avc_packet_type {
            AVC_PACKET_SEQUENCE_HEADER => {
                self.parse_avc_config(body)?;
                Ok(None)
            }
            AVC_PACKET_NALU => self.transmux_sample(body).map(Some),
            AVC_PACKET_END_OF_SEQUENCE => {
                debug!("avc end of sequence at dts={}", frame.dts);
                Ok(None)
            }
            other => {
                warn!("ignore avc packet type={}", other);
                Ok(None)
            }
        }
    }

    /// Parse AVC video configuration
    fn parse_avc_config(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 5 {
            return Err(Error::framing(format!("sps/pps invalid, size={}", data.len())));
        }

        let mut reader = ByteReader::new(data);
        let _version = reader.read_u8()?;
        let profile = reader.read_u8()?;
        let profile_compat = reader.read_u8()?;
        let level = reader.read_u8()?;

        // lengthSizeMinusOne: 0, 1 or 3 for 1, 2 or 4 byte prefixes
        let length_size_minus_one = reader.read_u8()? & 0x03;
        if length_size_minus_one == 2 {
            return Err(Error::framing(format!(
                "invalid nalu size={}",
                length_size_minus_one
            )));
        }

        let sps = Self::read_parameter_set(&mut reader, "sps")?;
        let pps = Self::read_parameter_set(&mut reader, "pps")?;

        let sps_info = parse_sps(sps);
        if sps_info.is_none() {
            debug!("sps of {} bytes not decodable, geometry unknown", sps.len());
        }

        let config = AvcConfig {
            profile,
            profile_compat,
            level,
            nalu_length_size: usize::from(length_size_minus_one) + 1,
            sps: Bytes::copy_from_slice(sps),
            pps: Bytes::copy_from_slice(pps),
            sps_info,
        };
        info!(
            "avc config: profile={}, level={}, nalu_length_size={}, sps={}, pps={}",
            config.profile,
            config.level,
            config.nalu_length_size,
            config.sps.len(),
            config.pps.len()
        );
        self.avc_config = Some(config);

        Ok(())
    }

    /// Exactly one count-prefixed, length-prefixed parameter set
    fn read_parameter_set<'a>(reader: &mut ByteReader<'a>, name: &str) -> Result<&'a [u8]> {
        if !reader.has_remaining(3) {
            return Err(Error::framing(format!(
                "invalid {}, size={}",
                name,
                reader.remaining()
            )));
        }

        let count = reader.read_u8()? & 0x1F;
        if count != 1 {
            return Err(Error::framing(format!("invalid {}, count={}", name, count)));
        }

        let length = reader.read_u16_be()? as usize;
        if !reader.has_remaining(length) {
            return Err(Error::framing(format!("invalid {}, require={}", name, length)));
        }
        Ok(reader.read_bytes(length)?)
    }

    fn transmux_sample(&mut self, body: &[u8]) -> Result<Bytes> {
        let config = self
            .avc_config
            .as_ref()
            .ok_or_else(|| Error::missing_config("drop for no sequence header"))?;

        let nalus = self.demuxer.demux(body, config.nalu_length_size)?;
        Ok(mux_annexb(&nalus, &config.sps, &config.pps))
    }

    /// Current configuration, once the sequence header was seen
    pub fn config(&self) -> Option<&AvcConfig> {
        self.avc_config.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.avc_config.is_some()
    }

    /// Payload format trusted for the next sample
    pub fn payload_format(&self) -> PayloadFormat {
        self.demuxer.format()
    }
}

impl Default for VideoProcessor {
    fn default() -> Self {
        Self::new()
    }
}
