//! Artifact building: compiling the source tree into a single deployable
//! build output, verified before any containerization happens.

pub mod builder;
pub mod select;

pub use builder::{Artifact, ArtifactBuilder, BuildError};
pub use select::{matching_files, select_artifact, SelectError};
