use std::collections::VecDeque;
use log::{trace, warn};
use crate::{Error, Frame, Result};

/// Withholds frames until a whole GOP is queued.
///
/// A group is released only once the keyframe opening the next group has
/// arrived, so every popped group starts at a keyframe and is complete.
/// Frames that arrive before the first keyframe cannot start a group and
/// are dropped.
pub struct GopBuffer {
    /// Queued frames, oldest first
    frames: VecDeque<Frame>,

    /// Keyframes currently queued
    keyframes: usize,

    /// Payload bytes currently queued
    bytes: usize,

    /// Upper bound on queued payload bytes, 0 for none
    max_bytes: usize,
}

impl GopBuffer {
    /// Create new GOP buffer
    pub fn new() -> Self {
        GopBuffer {
            frames: VecDeque::new(),
            keyframes: 0,
            bytes: 0,
            max_bytes: 0,
        }
    }

    /// Create buffer that refuses to queue more than `max_bytes` of payload
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        GopBuffer {
            max_bytes,
            ..GopBuffer::new()
        }
    }

    /// Queue a frame
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.keyframes == 0 && !frame.is_keyframe() {
            if frame.is_video() {
                warn!("dropping video frame ahead of first keyframe, dts={}", frame.dts);
            } else {
                trace!("dropping audio frame ahead of first keyframe, dts={}", frame.dts);
            }
            return Ok(());
        }

        let size = frame.payload.len();
        if self.max_bytes > 0 && self.bytes + size > self.max_bytes {
            return Err(Error::malformed(format!(
                "gop backlog would exceed {} bytes, queued={} frames/{} bytes, no closing keyframe",
                self.max_bytes,
                self.frames.len(),
                self.bytes
            )));
        }

        if frame.is_keyframe() {
            self.keyframes += 1;
        }
        self.bytes += size;
        self.frames.push_back(frame);
        Ok(())
    }

    /// Release one GOP, or `None` until two keyframes are queued.
    pub fn pop(&mut self) -> Option<Vec<Frame>> {
        if self.keyframes < 2 {
            return None;
        }

        let mut gop = Vec::new();
        let mut seen_keyframe = false;
        while let Some(front) = self.frames.front() {
            if front.is_keyframe() {
                if seen_keyframe {
                    break;
                }
                seen_keyframe = true;
                self.keyframes -= 1;
            }
            if let Some(frame) = self.frames.pop_front() {
                self.bytes -= frame.payload.len();
                gop.push(frame);
            }
        }

        Some(gop)
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.frames.clear();
        self.keyframes = 0;
        self.bytes = 0;
    }

    /// Queued frame count
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Queued keyframe count
    pub fn keyframe_count(&self) -> usize {
        self.keyframes
    }

    /// Queued payload bytes
    pub fn queued_bytes(&self) -> usize {
        self.bytes
    }
}

impl Default for GopBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{make_audio_frame, make_video_frame};

    fn keyframe(dts: i64) -> Frame {
        make_video_frame(vec![0x17, 0x01, 0, 0, 0], dts)
    }

    fn inter_frame(dts: i64) -> Frame {
        make_video_frame(vec![0x27, 0x01, 0, 0, 0], dts)
    }

    fn dts_of(gop: &[Frame]) -> Vec<i64> {
        gop.iter().map(|f| f.dts).collect()
    }

    #[test]
    fn test_pop_exactly_one_gop() {
        let mut buffer = GopBuffer::new();
        buffer.push(keyframe(0)).unwrap();
        buffer.push(inter_frame(33)).unwrap();
        buffer.push(inter_frame(66)).unwrap();
        assert!(buffer.pop().is_none());

        buffer.push(keyframe(100)).unwrap();
        buffer.push(inter_frame(133)).unwrap();
        buffer.push(inter_frame(166)).unwrap();
        buffer.push(keyframe(200)).unwrap();
        assert_eq!(buffer.keyframe_count(), 3);

        assert_eq!(dts_of(&buffer.pop().unwrap()), vec![0, 33, 66]);
        assert_eq!(dts_of(&buffer.pop().unwrap()), vec![100, 133, 166]);
        assert!(buffer.pop().is_none());

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.keyframe_count(), 1);
    }

    #[test]
    fn test_audio_joins_accumulating_gop() {
        let mut buffer = GopBuffer::new();
        buffer.push(keyframe(0)).unwrap();
        buffer.push(make_audio_frame(vec![0xAF, 0x01, 0x00], 10)).unwrap();
        buffer.push(inter_frame(33)).unwrap();
        buffer.push(make_audio_frame(vec![0xAF, 0x01, 0x00], 95)).unwrap();
        buffer.push(keyframe(100)).unwrap();

        let gop = buffer.pop().unwrap();
        assert_eq!(dts_of(&gop), vec![0, 10, 33, 95]);
        assert!(gop[0].is_keyframe());
        assert!(gop[1].is_audio());
    }

    #[test]
    fn test_generated_keyframe_not_a_boundary() {
        let mut buffer = GopBuffer::new();
        buffer.push(keyframe(0)).unwrap();
        buffer.push(make_video_frame(vec![0x47, 0x01, 0, 0, 0], 33)).unwrap();
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.keyframe_count(), 1);
    }

    #[test]
    fn test_frames_before_first_keyframe_dropped() {
        let mut buffer = GopBuffer::new();
        buffer.push(inter_frame(0)).unwrap();
        buffer.push(make_audio_frame(vec![0xAF, 0x01, 0x00], 10)).unwrap();
        buffer.push(inter_frame(33)).unwrap();
        assert!(buffer.is_empty());

        buffer.push(keyframe(66)).unwrap();
        buffer.push(keyframe(100)).unwrap();
        let gop = buffer.pop().unwrap();
        assert_eq!(dts_of(&gop), vec![66]);
        assert!(gop[0].is_keyframe());
    }

    #[test]
    fn test_backlog_limit() {
        let mut buffer = GopBuffer::with_max_bytes(12);
        buffer.push(keyframe(0)).unwrap();
        buffer.push(inter_frame(33)).unwrap();
        assert_eq!(buffer.queued_bytes(), 10);
        assert!(matches!(buffer.push(inter_frame(66)), Err(Error::MalformedContainer(_))));

        // a popped group frees its bytes
        let mut buffer = GopBuffer::with_max_bytes(10);
        buffer.push(keyframe(0)).unwrap();
        buffer.push(keyframe(40)).unwrap();
        buffer.pop().unwrap();
        assert_eq!(buffer.queued_bytes(), 5);
        buffer.push(inter_frame(73)).unwrap();
    }

    #[test]
    fn test_clear() {
        let mut buffer = GopBuffer::new();
        buffer.push(keyframe(0)).unwrap();
        buffer.push(keyframe(40)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.pop().is_none());
    }
}
