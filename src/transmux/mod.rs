mod config;
pub(crate) mod fragment;
mod transmuxer;

pub use config::*;
pub use fragment::*;
pub use transmuxer::*;
