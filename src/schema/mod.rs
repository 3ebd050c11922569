//! Schema module - Configuration and seeding types for the Life widget.

mod config;
mod seed;

pub use config::*;
pub use seed::*;
