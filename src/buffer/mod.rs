mod output;
mod ring;

pub use output::{OutputBuffer, OutputKind, OutputLine};
pub use ring::RingBuffer;
