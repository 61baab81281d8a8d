//! Image building: wrapping one artifact and a base runtime into an
//! immutable, tagged deployment unit.

pub mod builder;
pub mod reference;

pub use builder::{ImageBuilder, ImageError, ImageSpec};
pub use reference::{ImageRef, ImageRefError};
