//! Value types shared by the container store and the pyramid generator.

mod bounds;
mod entry;
mod tile;
mod tile_matrix;

pub use bounds::Bounds;
pub use entry::*;
pub use tile::Tile;
pub use tile_matrix::{TileMatrix, matrix_for_zoom, validate_matrix_set};
