mod event;
mod gop_buffer;
mod coalesce;

pub use event::*;
pub use gop_buffer::*;
pub use coalesce::*;
