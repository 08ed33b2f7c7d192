use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, warn};
use crate::{
    rebase_to_seconds, EventStream, FlushSource, FragmentGenerator, Result, ScriptData, Stage,
    TrackFragment, TrackInfo, TrackKind, MPEG_CLOCK_HZ,
};

/// A caption cue from an external caption parser, timestamps in the output clock
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start_pts: i64,
    pub end_pts: i64,
    pub text: String,
}

/// A caption rebased onto the segment timeline
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub start_time: f64,
    pub end_time: f64,
    pub caption: Caption,
}

/// A timed metadata record
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCue {
    pub pts: i64,
    pub dts: i64,

    /// Raw record bytes
    pub data: Bytes,

    /// Decoded form, when it could be decoded
    pub value: Option<ScriptData>,
}

/// A metadata record rebased onto the segment timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedMetadata {
    pub cue_time: f64,
    pub cue: MetadataCue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentMetadata {
    pub dispatch_type: String,
    pub cues: Vec<TimedMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    Audio,
    Video,
    Combined,
}

impl SegmentType {
    pub fn name(&self) -> &str {
        match self {
            SegmentType::Audio => "audio",
            SegmentType::Video => "video",
            SegmentType::Combined => "combined",
        }
    }
}

impl From<TrackKind> for SegmentType {
    fn from(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => SegmentType::Audio,
            TrackKind::Video => SegmentType::Video,
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Init segment plus one fragment per contributing track, ready to append
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSegment {
    pub segment_type: SegmentType,
    pub data: Bytes,
    pub captions: Vec<CaptionCue>,
    pub metadata: SegmentMetadata,

    /// Properties of the reference track
    pub info: BTreeMap<String, u32>,
}

/// Everything the coalescer accepts
#[derive(Debug, Clone, PartialEq)]
pub enum CoalesceInput {
    Track(TrackFragment),
    Caption(Caption),
    Metadata(MetadataCue),
}

/// Joins per-track fragments into one segment per epoch.
///
/// Captions and metadata wait for the next emitted segment, whichever track
/// completes it.
pub struct SegmentCoalescer {
    /// Tracks expected per segment
    number_of_tracks: usize,

    /// Wait for all expected tracks before emitting
    remux_tracks: bool,

    dispatch_type: String,
    timescale: u32,
    generator: Rc<dyn FragmentGenerator>,

    pending_tracks: Vec<TrackFragment>,
    video_track: Option<TrackInfo>,
    audio_track: Option<TrackInfo>,
    pending_captions: Vec<Caption>,
    pending_metadata: Vec<MetadataCue>,
    pending_bytes: usize,

    /// Tracks satisfied since the last done
    emitted_tracks: usize,

    events: EventStream<CombinedSegment>,
}

impl SegmentCoalescer {
    pub fn new(remux: bool, dispatch_type: impl Into<String>, generator: Rc<dyn FragmentGenerator>) -> Self {
        SegmentCoalescer {
            number_of_tracks: 0,
            remux_tracks: remux,
            dispatch_type: dispatch_type.into(),
            timescale: MPEG_CLOCK_HZ,
            generator,
            pending_tracks: Vec::new(),
            video_track: None,
            audio_track: None,
            pending_captions: Vec::new(),
            pending_metadata: Vec::new(),
            pending_bytes: 0,
            emitted_tracks: 0,
            events: EventStream::new(),
        }
    }

    /// Set the clock that caption and metadata timestamps are in
    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale;
        self
    }

    /// Expected tracks per segment, from the container header flags
    pub fn set_number_of_tracks(&mut self, count: usize) {
        self.number_of_tracks = count;
    }

    pub fn number_of_tracks(&self) -> usize {
        self.number_of_tracks
    }

    pub fn pending_tracks(&self) -> usize {
        self.pending_tracks.len()
    }

    /// Abandon buffered state and drop subscribers
    pub fn dispose(&mut self) {
        self.reset_epoch();
        self.emitted_tracks = 0;
        self.events.dispose();
    }

    fn reset_epoch(&mut self) {
        self.pending_tracks.clear();
        self.video_track = None;
        self.audio_track = None;
        self.pending_captions.clear();
        self.pending_metadata.clear();
        self.pending_bytes = 0;
    }

    fn emit_done_if_satisfied(&mut self, source: FlushSource) -> Result<()> {
        if self.emitted_tracks >= self.number_of_tracks {
            self.emitted_tracks = 0;
            self.events.emit_done(source)?;
        }
        Ok(())
    }

    fn emit_pending(&mut self) -> Result<()> {
        self.emitted_tracks += self.pending_tracks.len();
        let segment = self.build_segment()?;
        self.reset_epoch();

        debug!(
            "{} segment: {} bytes, {} captions, {} metadata cues",
            segment.segment_type,
            segment.data.len(),
            segment.captions.len(),
            segment.metadata.cues.len()
        );
        self.events.emit_data(&segment)
    }

    fn build_segment(&mut self) -> Result<CombinedSegment> {
        let (timeline_start_pts, info) = match (&self.video_track, &self.audio_track) {
            (Some(track), _) | (None, Some(track)) => {
                (track.timeline_start_pts.unwrap_or_default(), track.properties.clone())
            }
            (None, None) => (0, BTreeMap::new()),
        };

        let segment_type = match self.pending_tracks.as_slice() {
            [only] => SegmentType::from(only.track.kind),
            _ => SegmentType::Combined,
        };

        let tracks: Vec<TrackInfo> = self.pending_tracks.iter().map(|f| f.track.clone()).collect();
        let init_segment = self.generator.init_segment(&tracks)?;

        let mut data = BytesMut::with_capacity(init_segment.len() + self.pending_bytes);
        data.put_slice(&init_segment);
        for fragment in &self.pending_tracks {
            data.put_slice(&fragment.data);
        }

        let timescale = self.timescale;
        let captions = self
            .pending_captions
            .drain(..)
            .map(|caption| CaptionCue {
                start_time: rebase_to_seconds(caption.start_pts, timeline_start_pts, timescale),
                end_time: rebase_to_seconds(caption.end_pts, timeline_start_pts, timescale),
                caption,
            })
            .collect();
        let cues = self
            .pending_metadata
            .drain(..)
            .map(|cue| TimedMetadata {
                cue_time: rebase_to_seconds(cue.pts, timeline_start_pts, timescale),
                cue,
            })
            .collect();

        Ok(CombinedSegment {
            segment_type,
            data: data.freeze(),
            captions,
            metadata: SegmentMetadata {
                dispatch_type: self.dispatch_type.clone(),
                cues,
            },
            info,
        })
    }
}

impl Stage for SegmentCoalescer {
    type Input = CoalesceInput;
    type Output = CombinedSegment;

    fn events(&mut self) -> &mut EventStream<CombinedSegment> {
        &mut self.events
    }

    fn accept(&mut self, input: CoalesceInput) -> Result<()> {
        match input {
            CoalesceInput::Caption(caption) => self.pending_captions.push(caption),
            CoalesceInput::Metadata(cue) => self.pending_metadata.push(cue),
            CoalesceInput::Track(fragment) => {
                let kind = fragment.track.kind;
                if self.pending_tracks.iter().any(|f| f.track.kind == kind) {
                    // an announced track never delivered; close the epoch without it
                    warn!(
                        "{} fragment while one is pending, flushing {} of {} tracks",
                        kind,
                        self.pending_tracks.len(),
                        self.number_of_tracks
                    );
                    self.emit_pending()?;
                    self.emitted_tracks = 0;
                    self.events.emit_done(kind.flush_source())?;
                }
                match kind {
                    TrackKind::Video => self.video_track = Some(fragment.track.clone()),
                    TrackKind::Audio => self.audio_track = Some(fragment.track.clone()),
                }
                self.pending_bytes += fragment.data.len();
                self.pending_tracks.push(fragment);
            }
        }
        Ok(())
    }

    fn finalize(&mut self, source: FlushSource) -> Result<()> {
        if self.pending_tracks.len() < self.number_of_tracks {
            // captions and metadata alone never complete an epoch
            if !source.is_data_producer() || self.remux_tracks {
                return Ok(());
            }
            if self.pending_tracks.is_empty() {
                self.emitted_tracks += 1;
                return self.emit_done_if_satisfied(source);
            }
        }

        if self.pending_tracks.is_empty() {
            return self.emit_done_if_satisfied(source);
        }

        self.emit_pending()?;
        self.emit_done_if_satisfied(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use crate::transmux::fragment::tests::SizedGenerator;

    struct Recorder {
        segments: Rc<RefCell<Vec<CombinedSegment>>>,
        dones: Rc<RefCell<usize>>,
    }

    fn coalescer(remux: bool, tracks: usize) -> (SegmentCoalescer, Recorder) {
        let mut coalescer = SegmentCoalescer::new(remux, "15", Rc::new(SizedGenerator));
        coalescer.set_number_of_tracks(tracks);

        let segments = Rc::new(RefCell::new(Vec::new()));
        let dones = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&segments);
        coalescer.events().on_data(move |segment: &CombinedSegment| {
            sink.borrow_mut().push(segment.clone());
            Ok(())
        });
        let counter = Rc::clone(&dones);
        coalescer.events().on_done(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        (coalescer, Recorder { segments, dones })
    }

    fn fragment(kind: TrackKind, start_pts: i64, len: usize) -> CoalesceInput {
        let mut track = TrackInfo::new(kind, if kind == TrackKind::Audio { 100 } else { 101 });
        track.timeline_start_pts = Some(start_pts);
        track.properties.insert(format!("{}prop", kind), 1);
        CoalesceInput::Track(TrackFragment {
            track,
            data: Bytes::from(vec![0x11; len]),
        })
    }

    fn caption(start_pts: i64, end_pts: i64) -> CoalesceInput {
        CoalesceInput::Caption(Caption {
            start_pts,
            end_pts,
            text: "hello".to_string(),
        })
    }

    #[test]
    fn test_remux_waits_for_both_tracks() {
        let (mut coalescer, recorder) = coalescer(true, 2);

        coalescer.accept(fragment(TrackKind::Video, 90_000, 300)).unwrap();
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        assert!(recorder.segments.borrow().is_empty());
        assert_eq!(coalescer.pending_tracks(), 1);

        coalescer.accept(caption(180_000, 270_000)).unwrap();
        coalescer.accept(fragment(TrackKind::Audio, 45_000, 120)).unwrap();
        coalescer.finalize(FlushSource::AudioSegment).unwrap();

        let segments = recorder.segments.borrow();
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];
        assert_eq!(segment.segment_type, SegmentType::Combined);
        assert_eq!(segment.data.len(), 16 + 300 + 120);
        assert_eq!(segment.captions.len(), 1);
        assert_eq!(segment.captions[0].start_time, 1.0);
        assert_eq!(segment.captions[0].end_time, 2.0);
        assert_eq!(segment.info.get("videoprop"), Some(&1));
        assert_eq!(segment.metadata.dispatch_type, "15");
        assert_eq!(*recorder.dones.borrow(), 1);
        assert_eq!(coalescer.pending_tracks(), 0);
    }

    #[test]
    fn test_sidecar_flush_defers() {
        let (mut coalescer, recorder) = coalescer(false, 2);
        coalescer.accept(fragment(TrackKind::Video, 0, 10)).unwrap();
        coalescer.finalize(FlushSource::Caption).unwrap();
        coalescer.finalize(FlushSource::Metadata).unwrap();
        assert!(recorder.segments.borrow().is_empty());
        assert_eq!(*recorder.dones.borrow(), 0);
    }

    #[test]
    fn test_independent_tracks_emit_alone() {
        let (mut coalescer, recorder) = coalescer(false, 2);

        coalescer.accept(fragment(TrackKind::Audio, 9_000, 50)).unwrap();
        coalescer
            .accept(CoalesceInput::Metadata(MetadataCue {
                pts: 18_000,
                dts: 18_000,
                data: Bytes::from_static(b"id3"),
                value: None,
            }))
            .unwrap();
        coalescer.finalize(FlushSource::AudioSegment).unwrap();

        {
            let segments = recorder.segments.borrow();
            assert_eq!(segments.len(), 1);
            assert_eq!(segments[0].segment_type, SegmentType::Audio);
            assert_eq!(segments[0].data.len(), 8 + 50);
            assert_eq!(segments[0].metadata.cues[0].cue_time, 0.1);
            assert_eq!(segments[0].info.get("audioprop"), Some(&1));
        }
        // one of two tracks satisfied
        assert_eq!(*recorder.dones.borrow(), 0);

        // empty video flush completes the epoch without data
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        assert_eq!(recorder.segments.borrow().len(), 1);
        assert_eq!(*recorder.dones.borrow(), 1);
    }

    #[test]
    fn test_empty_epochs_count_toward_done() {
        let (mut coalescer, recorder) = coalescer(false, 2);
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        assert_eq!(*recorder.dones.borrow(), 0);
        coalescer.finalize(FlushSource::AudioSegment).unwrap();
        assert_eq!(*recorder.dones.borrow(), 1);
        assert!(recorder.segments.borrow().is_empty());
    }

    #[test]
    fn test_remux_empty_epoch_defers() {
        let (mut coalescer, recorder) = coalescer(true, 2);
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        coalescer.finalize(FlushSource::AudioSegment).unwrap();
        assert_eq!(*recorder.dones.borrow(), 0);
        assert!(recorder.segments.borrow().is_empty());
    }

    #[test]
    fn test_single_track_stream() {
        let (mut coalescer, recorder) = coalescer(true, 1);
        coalescer.accept(fragment(TrackKind::Video, 0, 64)).unwrap();
        coalescer.finalize(FlushSource::VideoSegment).unwrap();

        let segments = recorder.segments.borrow();
        assert_eq!(segments[0].segment_type, SegmentType::Video);
        assert_eq!(segments[0].data.len(), 8 + 64);
        assert_eq!(*recorder.dones.borrow(), 1);
    }

    #[test]
    fn test_missing_track_closes_epoch() {
        let (mut coalescer, recorder) = coalescer(true, 2);
        coalescer.accept(fragment(TrackKind::Video, 0, 64)).unwrap();
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        coalescer.finalize(FlushSource::AudioSegment).unwrap();
        assert!(recorder.segments.borrow().is_empty());

        coalescer.accept(fragment(TrackKind::Video, 0, 32)).unwrap();
        {
            let segments = recorder.segments.borrow();
            assert_eq!(segments.len(), 1);
            assert_eq!(segments[0].segment_type, SegmentType::Video);
            assert_eq!(segments[0].data.len(), 8 + 64);
        }
        assert_eq!(*recorder.dones.borrow(), 1);
        assert_eq!(coalescer.pending_tracks(), 1);
    }

    #[test]
    fn test_dispose() {
        let (mut coalescer, recorder) = coalescer(true, 1);
        coalescer.accept(fragment(TrackKind::Video, 0, 64)).unwrap();
        coalescer.dispose();
        assert_eq!(coalescer.pending_tracks(), 0);
        assert_eq!(coalescer.events().listener_count(), 0);

        coalescer.accept(fragment(TrackKind::Video, 0, 64)).unwrap();
        coalescer.finalize(FlushSource::VideoSegment).unwrap();
        assert!(recorder.segments.borrow().is_empty());
    }
}
