use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use crate::{Error, Result};

/// Handle returned by a subscription, used to unsubscribe
pub type ListenerId = usize;

/// Which stage raised a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSource {
    VideoSegment,
    AudioSegment,
    Caption,
    Metadata,
    Transmuxer,
}

impl FlushSource {
    /// Segment stages produce track data; the others only forward flushes
    pub fn is_data_producer(&self) -> bool {
        matches!(self, FlushSource::VideoSegment | FlushSource::AudioSegment)
    }

    pub fn name(&self) -> &str {
        match self {
            FlushSource::VideoSegment => "VideoSegmentStream",
            FlushSource::AudioSegment => "AudioSegmentStream",
            FlushSource::Caption => "CaptionStream",
            FlushSource::Metadata => "MetadataStream",
            FlushSource::Transmuxer => "Transmuxer",
        }
    }
}

impl fmt::Display for FlushSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-erased handlers
type DataHandler<T> = Box<dyn FnMut(&T) -> Result<()>>;
type DoneHandler = Box<dyn FnMut(FlushSource) -> Result<()>>;

/// Synchronous publish/subscribe for one stage's output.
///
/// Handlers run in registration order inside the emitting call; the first
/// handler error stops delivery and is returned to the emitter.
pub struct EventStream<T> {
    next_id: ListenerId,

    /// "data" subscribers
    data_handlers: Vec<(ListenerId, DataHandler<T>)>,

    /// "done" subscribers
    done_handlers: Vec<(ListenerId, DoneHandler)>,
}

impl<T: 'static> EventStream<T> {
    pub fn new() -> Self {
        EventStream {
            next_id: 0,
            data_handlers: Vec::new(),
            done_handlers: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }

    /// Subscribe to data events
    pub fn on_data(&mut self, handler: impl FnMut(&T) -> Result<()> + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.data_handlers.push((id, Box::new(handler)));
        id
    }

    /// Subscribe to the terminal flush event
    pub fn on_done(&mut self, handler: impl FnMut(FlushSource) -> Result<()> + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.done_handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a subscription; false if it was not registered
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.data_handlers.len() + self.done_handlers.len();
        self.data_handlers.retain(|(handler_id, _)| *handler_id != id);
        self.done_handlers.retain(|(handler_id, _)| *handler_id != id);
        before != self.data_handlers.len() + self.done_handlers.len()
    }

    pub fn emit_data(&mut self, data: &T) -> Result<()> {
        for (_, handler) in self.data_handlers.iter_mut() {
            handler(data)?;
        }
        Ok(())
    }

    pub fn emit_done(&mut self, source: FlushSource) -> Result<()> {
        for (_, handler) in self.done_handlers.iter_mut() {
            handler(source)?;
        }
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.data_handlers.len() + self.done_handlers.len()
    }

    /// Drop every subscription
    pub fn dispose(&mut self) {
        self.data_handlers.clear();
        self.done_handlers.clear();
    }
}

impl<T: Clone + 'static> EventStream<T> {
    /// Route data into `dest.accept` and flushes into `dest.finalize`.
    ///
    /// Returns `dest` so connections can be chained.
    pub fn connect<D>(&mut self, dest: &Rc<RefCell<D>>) -> Rc<RefCell<D>>
    where
        D: Stage<Input = T> + 'static,
    {
        let data_dest = Rc::clone(dest);
        self.on_data(move |data: &T| {
            data_dest
                .try_borrow_mut()
                .map_err(|_| Error::invalid_state("stage re-entered while accepting data"))?
                .accept(data.clone())
        });

        let done_dest = Rc::clone(dest);
        self.on_done(move |source| {
            done_dest
                .try_borrow_mut()
                .map_err(|_| Error::invalid_state("stage re-entered while finalizing"))?
                .finalize(source)
        });

        Rc::clone(dest)
    }
}

impl<T: 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline stage: consumes `Input`, publishes `Output`.
///
/// Stages that only forward flushes keep the default `finalize`.
pub trait Stage {
    type Input;
    type Output: 'static;

    fn events(&mut self) -> &mut EventStream<Self::Output>;

    fn accept(&mut self, input: Self::Input) -> Result<()>;

    fn finalize(&mut self, source: FlushSource) -> Result<()> {
        self.events().emit_done(source)
    }
}

/// Re-emits whatever it accepts
pub struct PassThrough<T> {
    events: EventStream<T>,
}

impl<T: 'static> PassThrough<T> {
    pub fn new() -> Self {
        PassThrough {
            events: EventStream::new(),
        }
    }
}

impl<T: 'static> Default for PassThrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Stage for PassThrough<T> {
    type Input = T;
    type Output = T;

    fn events(&mut self) -> &mut EventStream<T> {
        &mut self.events
    }

    fn accept(&mut self, input: T) -> Result<()> {
        self.events.emit_data(&input)
    }
}
