//! Page acquisition and assembly

mod assembler;
mod range;
mod rip;

pub use assembler::{assemble, background_dimensions, AssembledPages};
pub use range::{PageRange, PageSpec};
pub use rip::{RipOutcome, RipRequest, Ripper};
