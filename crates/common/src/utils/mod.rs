//! Small helpers shared across crates.

pub mod chunk;
pub mod strings;
