mod utils;
mod protocol;
mod container;
mod processing;
mod stream;
mod transmux;

// Re-export commonly used types at crate root
pub use utils::*;
pub use protocol::*;
pub use container::*;

// Codec exports
pub use processing::*;

// Pipeline exports
pub use stream::*;
pub use transmux::*;
