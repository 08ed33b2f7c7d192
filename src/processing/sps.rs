//! Sequence parameter set fields needed for the video track summary.

/// Picture geometry and profile decoded from an SPS NAL unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub profile_compatibility: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
}

/// Profiles whose SPS carries chroma format and bit depth fields
const HIGH_PROFILES: [u8; 12] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134];

/// Parse an SPS NAL unit, header byte included
pub fn parse_sps(nalu: &[u8]) -> Option<SpsInfo> {
    let rbsp = strip_emulation_prevention(nalu.get(1..)?);
    let mut reader = BitReader::new(&rbsp);

    let profile_idc = reader.read_bits(8)? as u8;
    let profile_compatibility = reader.read_bits(8)? as u8;
    let level_idc = reader.read_bits(8)? as u8;
    reader.read_ue()?; // seq_parameter_set_id

    if HIGH_PROFILES.contains(&profile_idc) {
        let chroma_format_idc = reader.read_ue()?;
        if chroma_format_idc == 3 {
            reader.read_bits(1)?; // separate_colour_plane_flag
        }
        reader.read_ue()?; // bit_depth_luma_minus8
        reader.read_ue()?; // bit_depth_chroma_minus8
        reader.read_bits(1)?; // qpprime_y_zero_transform_bypass_flag
        if reader.read_bits(1)? == 1 {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if reader.read_bits(1)? == 1 {
                    skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    reader.read_ue()?; // log2_max_frame_num_minus4
    match reader.read_ue()? {
        0 => {
            reader.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            reader.read_bits(1)?; // delta_pic_order_always_zero_flag
            reader.read_se()?; // offset_for_non_ref_pic
            reader.read_se()?; // offset_for_top_to_bottom_field
            let cycle = reader.read_ue()?;
            for _ in 0..cycle {
                reader.read_se()?;
            }
        }
        _ => {}
    }
    reader.read_ue()?; // max_num_ref_frames
    reader.read_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let width_in_mbs = reader.read_ue()?.checked_add(1)?;
    let height_in_map_units = reader.read_ue()?.checked_add(1)?;
    let frame_mbs_only = reader.read_bits(1)?;
    if frame_mbs_only == 0 {
        reader.read_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.read_bits(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if reader.read_bits(1)? == 1 {
        crop_left = reader.read_ue()?;
        crop_right = reader.read_ue()?;
        crop_top = reader.read_ue()?;
        crop_bottom = reader.read_ue()?;
    }

    // geometry that does not fit in u32 is left undecoded
    let width = width_in_mbs
        .checked_mul(16)?
        .checked_sub(crop_left.checked_add(crop_right)?.checked_mul(2)?)?;
    let height = height_in_map_units
        .checked_mul(16)?
        .checked_mul(2 - frame_mbs_only)?
        .checked_sub(crop_top.checked_add(crop_bottom)?.checked_mul(2)?)?;

    Some(SpsInfo {
        profile_idc,
        profile_compatibility,
        level_idc,
        width,
        height,
    })
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Option<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_se()?;
            next_scale = last_scale.checked_add(delta)?.checked_add(256)?.rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Some(())
}

/// Drop the 0x03 of every `00 00 03` sequence
fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

/// Simple bit reader for parsing RBSP data
struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read n bits (up to 32)
    fn read_bits(&mut self, n: u8) -> Option<u32> {
        let mut result = 0u32;

        for _ in 0..n {
            let byte = *self.data.get(self.byte_pos)?;
            let bit = (byte >> (7 - self.bit_pos)) & 1;
            result = (result << 1) | u32::from(bit);

            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
        }

        Some(result)
    }

    /// Unsigned Exp-Golomb
    fn read_ue(&mut self) -> Option<u32> {
        let mut leading_zeros = 0u8;
        while self.read_bits(1)? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return None;
            }
        }

        if leading_zeros == 0 {
            return Some(0);
        }

        let suffix = self.read_bits(leading_zeros)?;
        Some(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// Signed Exp-Golomb
    fn read_se(&mut self) -> Option<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i32;
        Some(if code % 2 == 1 { magnitude } else { -magnitude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Baseline 640x480, level 3.0
    const SPS_640X480: [u8; 9] = [0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x02, 0x80, 0xF6, 0x40];

    #[test]
    fn test_bit_reader_read_ue() {
        let data = [0b10100110, 0b01000000];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_ue(), Some(0));
        assert_eq!(reader.read_ue(), Some(1));
        assert_eq!(reader.read_ue(), Some(2));
        assert_eq!(reader.read_ue(), Some(3));
    }

    #[test]
    fn test_bit_reader_read_se() {
        // 1, 010, 011, 00100 -> 0, 1, -1, 2
        let data = [0b10100110, 0b01000000];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_se(), Some(0));
        assert_eq!(reader.read_se(), Some(1));
        assert_eq!(reader.read_se(), Some(-1));
        assert_eq!(reader.read_se(), Some(2));
    }

    #[test]
    fn test_strip_emulation_prevention() {
        let data = [0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00, 0x03];
        assert_eq!(
            strip_emulation_prevention(&data),
            vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03]
        );
    }

    #[test]
    fn test_parse_baseline_sps() {
        let info = parse_sps(&SPS_640X480).unwrap();
        assert_eq!(info.profile_idc, 66);
        assert_eq!(info.profile_compatibility, 0xC0);
        assert_eq!(info.level_idc, 30);
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 480);
    }

    #[test]
    fn test_truncated_sps() {
        assert!(parse_sps(&SPS_640X480[..5]).is_none());
        assert!(parse_sps(&[]).is_none());
    }

    /// Write `value` as an unsigned Exp-Golomb code
    fn push_ue(bits: &mut Vec<bool>, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        bits.extend(std::iter::repeat_n(false, len as usize - 1));
        bits.extend((0..len).rev().map(|i| (code >> i) & 1 == 1));
    }

    fn pack(bits: &[bool]) -> Vec<u8> {
        bits.chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | (u8::from(bit) << (7 - i)))
            })
            .collect()
    }

    /// Baseline SPS with the given macroblock geometry and no cropping
    fn baseline_sps(width_minus1: u32, height_minus1: u32) -> Vec<u8> {
        let mut bits = Vec::new();
        push_ue(&mut bits, 0); // seq_parameter_set_id
        push_ue(&mut bits, 0); // log2_max_frame_num_minus4
        push_ue(&mut bits, 0); // pic_order_cnt_type
        push_ue(&mut bits, 0); // log2_max_pic_order_cnt_lsb_minus4
        push_ue(&mut bits, 1); // max_num_ref_frames
        bits.push(false); // gaps_in_frame_num_value_allowed_flag
        push_ue(&mut bits, width_minus1);
        push_ue(&mut bits, height_minus1);
        bits.extend([true, true, false]); // frame_mbs_only, direct_8x8, no cropping
        bits.push(true); // rbsp stop bit

        let mut sps = vec![0x67, 0x42, 0xC0, 0x1E];
        sps.extend(pack(&bits));
        sps
    }

    #[test]
    fn test_high_profile_chroma_fields() {
        let mut bits = Vec::new();
        push_ue(&mut bits, 0); // seq_parameter_set_id
        push_ue(&mut bits, 1); // chroma_format_idc 4:2:0
        push_ue(&mut bits, 0); // bit_depth_luma_minus8
        push_ue(&mut bits, 0); // bit_depth_chroma_minus8
        bits.extend([false, false]); // transform bypass, no scaling matrix
        push_ue(&mut bits, 0); // log2_max_frame_num_minus4
        push_ue(&mut bits, 2); // pic_order_cnt_type
        push_ue(&mut bits, 1); // max_num_ref_frames
        bits.push(false);
        push_ue(&mut bits, 119);
        push_ue(&mut bits, 67);
        bits.extend([true, true, true]); // frame_mbs_only, direct_8x8, cropping
        for crop in [0, 0, 0, 4] {
            push_ue(&mut bits, crop);
        }
        bits.push(true);

        let mut sps = vec![0x67, 100, 0x00, 40];
        sps.extend(pack(&bits));
        let info = parse_sps(&sps).unwrap();
        assert_eq!(info.profile_idc, 100);
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_encoded_geometry() {
        let info = parse_sps(&baseline_sps(79, 44)).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
    }

    #[test]
    fn test_oversized_geometry_left_undecoded() {
        assert!(parse_sps(&baseline_sps(0xFFFF_FFFE, 29)).is_none());
        assert!(parse_sps(&baseline_sps(39, 0x1000_0000)).is_none());
    }
}
