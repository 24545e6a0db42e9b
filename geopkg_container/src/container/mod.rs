//! The container store: one SQLite file holding a content catalog and its
//! feature, raster and tile datasets.

mod catalog;
mod features;
mod geopackage;
mod rasters;
mod tiles;

pub use features::{FeatureReader, FeatureStore, FeatureWriter, WriteMode};
pub use geopackage::GeoPackage;
pub use tiles::{TileCursor, TileQuery};
