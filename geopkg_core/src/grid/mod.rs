//! Tiling grids: per-zoom resolution tables and the bbox-to-tile-index math
//! the pyramid generator is built on.

mod grid_set;
mod grid_subset;
mod registry;

pub use grid_set::{GridLevel, GridSet, OGC_PIXEL_SIZE_M};
pub use grid_subset::{GridSubset, TileRect};
pub use registry::{GridCriteria, GridProvider, GridRegistry};
