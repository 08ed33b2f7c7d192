// Container signature "FLV"
pub const FLV_SIGNATURE: [u8; 3] = [0x46, 0x4C, 0x56];

// 9 byte file header plus the zero PreviousTagSize0
pub const FLV_HEADER_SIZE: usize = 13;
pub const FLV_FLAG_AUDIO: u8 = 0x40;
pub const FLV_FLAG_VIDEO: u8 = 0x01;

// Record framing
pub const TAG_HEADER_SIZE: usize = 11;
pub const PREVIOUS_TAG_SIZE_LEN: usize = 4;

// Record types
pub const TAG_TYPE_AUDIO: u8 = 8;
pub const TAG_TYPE_VIDEO: u8 = 9;
pub const TAG_TYPE_SCRIPT_DATA: u8 = 18;

// Audio tag header
pub const SOUND_FORMAT_AAC: u8 = 10;
pub const AAC_PACKET_SEQUENCE_HEADER: u8 = 0;

// Video tag header
pub const VIDEO_CODEC_AVC: u8 = 7;
pub const AVC_PACKET_SEQUENCE_HEADER: u8 = 0;
pub const AVC_PACKET_NALU: u8 = 1;
pub const AVC_PACKET_END_OF_SEQUENCE: u8 = 2;

pub const VIDEO_FRAME_KEYFRAME: u8 = 1;
pub const VIDEO_FRAME_INFO: u8 = 5;
