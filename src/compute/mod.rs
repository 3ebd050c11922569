//! Compute module - Transforms, the step rule and frame scheduling for the Life widget.

mod affine;
mod pointer;
pub mod rule;
mod scheduler;
mod stats;

pub mod gpu;

pub use affine::*;
pub use pointer::*;
pub use scheduler::*;
pub use stats::*;
