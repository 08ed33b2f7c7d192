use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use log::{debug, info, trace, warn};
use uuid::Uuid;
use crate::{
    scale_timestamp, time_delta_ms, Caption, CodecNormalizer, CoalesceInput, CombinedSegment,
    ContainerHeader, ContainerReader, ElementarySample, Error, FlushSource, FragmentGenerator,
    Frame, FrameKind, GopBuffer, ListenerId, MetadataCue, PassThrough, Result, SegmentCoalescer,
    SegmentStage, Stage, StreamMetadata, TrackKind, TransmuxConfig,
};

/// Drives container bytes through the whole pipeline:
/// reader, codec normalizer, GOP buffer, segment stages, coalescer.
pub struct Transmuxer {
    /// Session ID, for log lines
    id: String,

    config: TransmuxConfig,
    reader: ContainerReader,
    normalizer: CodecNormalizer,
    gop: GopBuffer,

    // elementary inputs of the segment stages
    audio_input: PassThrough<ElementarySample>,
    video_input: PassThrough<ElementarySample>,

    // sidecar inputs of the coalescer
    caption_input: PassThrough<CoalesceInput>,
    metadata_input: PassThrough<CoalesceInput>,

    audio_segment: Rc<RefCell<SegmentStage>>,
    video_segment: Rc<RefCell<SegmentStage>>,
    coalescer: Rc<RefCell<SegmentCoalescer>>,

    /// Segments emitted during the current `transmux` call
    produced: Rc<RefCell<Vec<CombinedSegment>>>,

    header_applied: bool,
    disposed: bool,
}

impl Transmuxer {
    pub fn new(config: TransmuxConfig, generator: Rc<dyn FragmentGenerator>) -> Result<Self> {
        config.validate()?;

        let audio_segment = Rc::new(RefCell::new(SegmentStage::new(
            TrackKind::Audio,
            config.audio_track_id,
            Rc::clone(&generator),
        )));
        let video_segment = Rc::new(RefCell::new(SegmentStage::new(
            TrackKind::Video,
            config.video_track_id,
            Rc::clone(&generator),
        )));
        let coalescer = Rc::new(RefCell::new(
            SegmentCoalescer::new(config.remux, config.metadata_dispatch_type.clone(), generator)
                .with_timescale(config.timescale),
        ));

        let mut audio_input = PassThrough::new();
        let mut video_input = PassThrough::new();
        let mut caption_input = PassThrough::new();
        let mut metadata_input = PassThrough::new();

        video_input
            .events()
            .connect(&video_segment)
            .borrow_mut()
            .events()
            .connect(&coalescer);
        audio_input
            .events()
            .connect(&audio_segment)
            .borrow_mut()
            .events()
            .connect(&coalescer);
        caption_input.events().connect(&coalescer);
        metadata_input.events().connect(&coalescer);

        let produced = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&produced);
        coalescer
            .borrow_mut()
            .events()
            .on_data(move |segment: &CombinedSegment| {
                sink.borrow_mut().push(segment.clone());
                Ok(())
            });

        let id = Uuid::new_v4().to_string();
        debug!("[{}] transmuxer created, remux={}", id, config.remux);

        Ok(Transmuxer {
            id,
            reader: ContainerReader::with_max_backlog(config.max_backlog_bytes),
            gop: GopBuffer::with_max_bytes(config.max_backlog_bytes),
            config,
            normalizer: CodecNormalizer::new(),
            audio_input,
            video_input,
            caption_input,
            metadata_input,
            audio_segment,
            video_segment,
            coalescer,
            produced,
            header_applied: false,
            disposed: false,
        })
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &TransmuxConfig {
        &self.config
    }

    /// Container header, once parsed
    pub fn header(&self) -> Option<ContainerHeader> {
        self.reader.header()
    }

    /// Last `onMetaData` seen in the stream
    pub fn stream_metadata(&self) -> Option<&StreamMetadata> {
        self.normalizer.stream_metadata()
    }

    pub fn normalizer(&self) -> &CodecNormalizer {
        &self.normalizer
    }

    /// Subscribe to combined segments
    pub fn on_segment(&mut self, handler: impl FnMut(&CombinedSegment) -> Result<()> + 'static) -> ListenerId {
        self.coalescer.borrow_mut().events().on_data(handler)
    }

    /// Subscribe to completion of all expected tracks
    pub fn on_done(&mut self, handler: impl FnMut(FlushSource) -> Result<()> + 'static) -> ListenerId {
        self.coalescer.borrow_mut().events().on_done(handler)
    }

    /// Remove a segment or done subscription
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.coalescer.borrow_mut().events().off(id)
    }

    /// Feed container bytes; returns the segments completed by them.
    ///
    /// Any error is fatal for the session.
    pub fn transmux(&mut self, bytes: &[u8]) -> Result<Vec<CombinedSegment>> {
        self.ensure_live()?;
        self.reader.append(bytes)?;

        while let Some(frame) = self.reader.try_read_frame()? {
            self.apply_header();
            self.process_frame(frame)?;
        }
        self.apply_header();

        Ok(std::mem::take(&mut *self.produced.borrow_mut()))
    }

    /// Hand a caption cue to the coalescer; it rides with the next segment.
    pub fn push_caption(&mut self, caption: Caption) -> Result<()> {
        self.ensure_live()?;
        self.caption_input.accept(CoalesceInput::Caption(caption))
    }

    /// Drop all subscribers and abandon buffered state
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.audio_input.events().dispose();
        self.video_input.events().dispose();
        self.caption_input.events().dispose();
        self.metadata_input.events().dispose();
        self.audio_segment.borrow_mut().dispose();
        self.video_segment.borrow_mut().dispose();
        self.coalescer.borrow_mut().dispose();
        self.gop.clear();
        self.produced.borrow_mut().clear();

        debug!("[{}] transmuxer disposed", self.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::invalid_state(format!("transmuxer {} disposed", self.id)));
        }
        Ok(())
    }

    fn apply_header(&mut self) {
        if self.header_applied {
            return;
        }
        if let Some(header) = self.reader.header() {
            self.coalescer
                .borrow_mut()
                .set_number_of_tracks(header.track_count());
            self.header_applied = true;
            info!(
                "[{}] stream: audio={}, video={}, tracks={}",
                self.id,
                header.has_audio,
                header.has_video,
                header.track_count()
            );
        }
    }

    fn process_frame(&mut self, mut frame: Frame) -> Result<()> {
        if frame.is_script_data() {
            return self.process_script_data(frame);
        }

        if frame.is_sequence_header() {
            self.normalizer.normalize(&mut frame)?;
            self.update_track_properties();
            return Ok(());
        }

        self.gop.push(frame)?;
        while let Some(frames) = self.gop.pop() {
            self.consume_gop(frames)?;
        }
        Ok(())
    }

    fn process_script_data(&mut self, frame: Frame) -> Result<()> {
        let value = match self.normalizer.script_data(&frame) {
            Ok(data) => {
                debug!("[{}] script data {} at dts={}", self.id, data.name, frame.dts);
                Some(data)
            }
            Err(e) => {
                warn!("[{}] undecodable script data at dts={}: {}", self.id, frame.dts, e);
                None
            }
        };

        let cue = MetadataCue {
            pts: scale_timestamp(frame.pts, self.config.timescale),
            dts: scale_timestamp(frame.dts, self.config.timescale),
            data: frame.payload,
            value,
        };
        self.metadata_input.accept(CoalesceInput::Metadata(cue))
    }

    fn consume_gop(&mut self, frames: Vec<Frame>) -> Result<()> {
        if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
            debug!(
                "[{}] gop of {} frames, dts=[{}, {}], duration={}ms",
                self.id,
                frames.len(),
                first.dts,
                last.dts,
                time_delta_ms(first.dts, last.dts)
            );
        }

        for mut frame in frames {
            let keyframe = frame.is_keyframe();
            let Some(data) = self.normalizer.normalize(&mut frame)? else {
                continue;
            };

            let (kind, track_id) = match frame.kind {
                FrameKind::Audio => (TrackKind::Audio, self.config.audio_track_id),
                FrameKind::Video => (TrackKind::Video, self.config.video_track_id),
                FrameKind::Metadata => continue,
            };
            let sample = ElementarySample {
                kind,
                track_id,
                dts: scale_timestamp(frame.dts, self.config.timescale),
                pts: scale_timestamp(frame.pts, self.config.timescale),
                keyframe,
                data,
            };
            trace!("[{}] {} sample {} bytes, pts={}", self.id, kind, sample.data.len(), sample.pts);

            match kind {
                TrackKind::Audio => self.audio_input.accept(sample)?,
                TrackKind::Video => self.video_input.accept(sample)?,
            }
        }

        self.video_input.finalize(FlushSource::Transmuxer)?;
        self.audio_input.finalize(FlushSource::Transmuxer)
    }

    fn update_track_properties(&mut self) {
        if let Some(config) = self.normalizer.audio_config() {
            let mut properties = BTreeMap::new();
            properties.insert("audioobjecttype".to_string(), u32::from(config.object_type));
            properties.insert("channelcount".to_string(), u32::from(config.channel_config));
            if let Some(rate) = config.sample_rate() {
                properties.insert("samplerate".to_string(), rate);
            }
            properties.insert("samplingfrequencyindex".to_string(), u32::from(config.sampling_index));
            properties.insert("samplesize".to_string(), u32::from(config.sample_size));
            self.audio_segment.borrow_mut().set_properties(properties);
        }

        if let Some(config) = self.normalizer.video_config() {
            let mut properties = BTreeMap::new();
            if let Some(sps) = config.sps_info {
                properties.insert("width".to_string(), sps.width);
                properties.insert("height".to_string(), sps.height);
            }
            properties.insert("profileIdc".to_string(), u32::from(config.profile));
            properties.insert("levelIdc".to_string(), u32::from(config.level));
            properties.insert("profileCompatibility".to_string(), u32::from(config.profile_compat));
            self.video_segment.borrow_mut().set_properties(properties);
        }
    }
}
