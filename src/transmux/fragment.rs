use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use bytes::Bytes;
use log::trace;
use crate::{Error, EventStream, FlushSource, Result, Stage};
use crate::stream::CoalesceInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn name(&self) -> &str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    /// Elementary bitstream carried by the track
    pub fn codec(&self) -> &'static str {
        match self {
            TrackKind::Audio => "adts",
            TrackKind::Video => "avc",
        }
    }

    pub(crate) fn flush_source(&self) -> FlushSource {
        match self {
            TrackKind::Audio => FlushSource::AudioSegment,
            TrackKind::Video => FlushSource::VideoSegment,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One ADTS unit or Annex-B access unit, timestamps in the output clock
#[derive(Debug, Clone, PartialEq)]
pub struct ElementarySample {
    pub kind: TrackKind,
    pub track_id: u32,
    pub dts: i64,
    pub pts: i64,
    pub keyframe: bool,
    pub data: Bytes,
}

/// Track descriptor handed to the fragment generator
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub track_id: u32,
    pub codec: &'static str,

    /// pts of the first sample of the session
    pub timeline_start_pts: Option<i64>,

    /// Codec properties, keyed like the segment `info` map
    pub properties: BTreeMap<String, u32>,
}

impl TrackInfo {
    pub fn new(kind: TrackKind, track_id: u32) -> Self {
        TrackInfo {
            kind,
            track_id,
            codec: kind.codec(),
            timeline_start_pts: None,
            properties: BTreeMap::new(),
        }
    }
}

/// One track's fragment bytes and the descriptor they were built for
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFragment {
    pub track: TrackInfo,
    pub data: Bytes,
}

/// Builds box-structured output from elementary samples.
pub trait FragmentGenerator {
    /// Initialization segment covering `tracks`
    fn init_segment(&self, tracks: &[TrackInfo]) -> Result<Bytes>;

    /// Media fragment for one track's samples
    fn media_segment(&self, track: &TrackInfo, samples: &[ElementarySample]) -> Result<Bytes>;
}

/// Collects one track's samples and turns them into a fragment on flush.
pub struct SegmentStage {
    track: TrackInfo,
    samples: Vec<ElementarySample>,
    generator: Rc<dyn FragmentGenerator>,
    events: EventStream<CoalesceInput>,
}

impl SegmentStage {
    pub fn new(kind: TrackKind, track_id: u32, generator: Rc<dyn FragmentGenerator>) -> Self {
        SegmentStage {
            track: TrackInfo::new(kind, track_id),
            samples: Vec::new(),
            generator,
            events: EventStream::new(),
        }
    }

    /// Replace the codec properties reported with every fragment
    pub fn set_properties(&mut self, properties: BTreeMap<String, u32>) {
        self.track.properties = properties;
    }

    pub fn track(&self) -> &TrackInfo {
        &self.track
    }

    /// Samples waiting for the next flush
    pub fn pending(&self) -> usize {
        self.samples.len()
    }

    pub fn dispose(&mut self) {
        self.samples.clear();
        self.events.dispose();
    }
}

impl Stage for SegmentStage {
    type Input = ElementarySample;
    type Output = CoalesceInput;

    fn events(&mut self) -> &mut EventStream<CoalesceInput> {
        &mut self.events
    }

    fn accept(&mut self, sample: ElementarySample) -> Result<()> {
        if sample.kind != self.track.kind {
            return Err(Error::invalid_state(format!(
                "{} sample sent to the {} segment stage",
                sample.kind, self.track.kind
            )));
        }
        if self.track.timeline_start_pts.is_none() {
            self.track.timeline_start_pts = Some(sample.pts);
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Flushes report this stage as their source, whoever triggered them.
    fn finalize(&mut self, _source: FlushSource) -> Result<()> {
        let source = self.track.kind.flush_source();
        if !self.samples.is_empty() {
            let data = self.generator.media_segment(&self.track, &self.samples)?;
            trace!(
                "{} fragment: {} samples, {} bytes",
                self.track.kind,
                self.samples.len(),
                data.len()
            );
            self.samples.clear();

            let fragment = TrackFragment {
                track: self.track.clone(),
                data,
            };
            self.events.emit_data(&CoalesceInput::Track(fragment))?;
        }
        self.events.emit_done(source)
    }
}
