mod constants;
mod tag;

pub use constants::*;
pub use tag::*;
