//! Tile pyramid generation into container files.

mod artifact;
mod generator;
mod options;

pub use artifact::PyramidArtifact;
pub use generator::PyramidGenerator;
pub use options::PyramidOptions;
