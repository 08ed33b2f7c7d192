// Common test utilities and helper functions
//
// FLV byte builders and a fragment generator that records what it was asked to build

#![allow(dead_code)]

use std::cell::RefCell;
use bytes::Bytes;
use flv2mse::{ElementarySample, FragmentGenerator, Result, TrackInfo};

/// Baseline 640x480 SPS
pub const SPS: [u8; 9] = [0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x02, 0x80, 0xF6, 0x40];
pub const PPS: [u8; 4] = [0x68, 0xCE, 0x3C, 0x80];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 13-byte file header, previous tag size included
pub fn flv_header(has_audio: bool, has_video: bool) -> Vec<u8> {
    let mut flags = 0;
    if has_audio {
        flags |= 0x40;
    }
    if has_video {
        flags |= 0x01;
    }
    vec![b'F', b'L', b'V', 0x01, flags, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00]
}

/// One record: 11-byte header, payload, trailing size
pub fn flv_record(tag_type: u8, dts: u32, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u32;
    let mut out = Vec::with_capacity(payload.len() + 15);
    out.push(tag_type);
    out.extend_from_slice(&size.to_be_bytes()[1..]);
    out.extend_from_slice(&dts.to_be_bytes()[1..]);
    out.push((dts >> 24) as u8);
    out.extend_from_slice(&[0x00, 0x00, 0x00]);
    out.extend_from_slice(payload);
    out.extend_from_slice(&(size + 11).to_be_bytes());
    out
}

/// AAC LC, 44.1kHz, stereo
pub fn aac_sequence_header() -> Vec<u8> {
    flv_record(8, 0, &[0xAF, 0x00, 0x12, 0x10])
}

pub fn aac_frame(dts: u32, raw: &[u8]) -> Vec<u8> {
    let mut payload = vec![0xAF, 0x01];
    payload.extend_from_slice(raw);
    flv_record(8, dts, &payload)
}

pub fn avc_sequence_header() -> Vec<u8> {
    let mut payload = vec![0x17, 0x00, 0x00, 0x00, 0x00];
    payload.extend_from_slice(&[0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1]);
    payload.extend_from_slice(&(SPS.len() as u16).to_be_bytes());
    payload.extend_from_slice(&SPS);
    payload.push(0x01);
    payload.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
    payload.extend_from_slice(&PPS);
    flv_record(9, 0, &payload)
}

/// AVC sample with 4-byte length prefixed NAL units
pub fn avc_frame(dts: u32, keyframe: bool, cts: i32, nalus: &[&[u8]]) -> Vec<u8> {
    let mut payload = vec![if keyframe { 0x17 } else { 0x27 }, 0x01];
    payload.extend_from_slice(&cts.to_be_bytes()[1..]);
    for nalu in nalus {
        payload.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        payload.extend_from_slice(nalu);
    }
    flv_record(9, dts, &payload)
}

pub fn idr_frame(dts: u32) -> Vec<u8> {
    avc_frame(dts, true, 0, &[&[0x65, 0x88, 0x84, 0x00]])
}

pub fn inter_frame(dts: u32) -> Vec<u8> {
    avc_frame(dts, false, 0, &[&[0x41, 0x9A, 0x02]])
}

/// `onMetaData` with width/height in an ECMA array
pub fn on_metadata(dts: u32, width: f64, height: f64) -> Vec<u8> {
    let mut payload = vec![0x02, 0x00, 0x0A];
    payload.extend_from_slice(b"onMetaData");
    payload.push(0x08);
    payload.extend_from_slice(&2u32.to_be_bytes());
    for (key, value) in [("width", width), ("height", height)] {
        payload.extend_from_slice(&(key.len() as u16).to_be_bytes());
        payload.extend_from_slice(key.as_bytes());
        payload.push(0x00);
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload.extend_from_slice(&[0x00, 0x00, 0x09]);
    flv_record(18, dts, &payload)
}

/// Captured media segment request
#[derive(Debug, Clone)]
pub struct MediaCall {
    pub track: TrackInfo,
    pub samples: Vec<ElementarySample>,
    pub output_len: usize,
}

/// Init segments are 16 bytes per track; media segments are an 8-byte
/// marker followed by the sample bytes.
#[derive(Default)]
pub struct RecordingGenerator {
    pub init_calls: RefCell<Vec<Vec<TrackInfo>>>,
    pub media_calls: RefCell<Vec<MediaCall>>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FragmentGenerator for RecordingGenerator {
    fn init_segment(&self, tracks: &[TrackInfo]) -> Result<Bytes> {
        self.init_calls.borrow_mut().push(tracks.to_vec());
        Ok(Bytes::from(vec![0x6D; 16 * tracks.len()]))
    }

    fn media_segment(&self, track: &TrackInfo, samples: &[ElementarySample]) -> Result<Bytes> {
        let mut out = b"moofmdat".to_vec();
        for sample in samples {
            out.extend_from_slice(&sample.data);
        }
        self.media_calls.borrow_mut().push(MediaCall {
            track: track.clone(),
            samples: samples.to_vec(),
            output_len: out.len(),
        });
        Ok(Bytes::from(out))
    }
}
