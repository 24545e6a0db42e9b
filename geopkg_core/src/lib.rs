//! Core types for the geopkg container store.
//!
//! This crate holds everything that does not touch the database: the value
//! types of the content catalog (entries, bounds, tiles, tile matrices), the
//! error taxonomy, the tiling-grid math, and the narrow interfaces to the
//! external collaborators (CRS engine, schema model, raster codec, map
//! renderer, grid provider).
//!
//! The container itself and the pyramid generator live in
//! `geopkg_container`.

mod crs;
pub use crs::{Crs, CrsEngine, EpsgRegistry};

mod error;
pub use error::{GeoPackageError, Result};

mod grid;
pub use grid::*;

mod raster;
pub use raster::{DecodeHints, ImageCodec, RasterCodec, RasterFormat, RasterImage};

mod render;
pub use render::{MapRequest, RenderRequest, TileRenderer};

mod schema;
pub use schema::{
	Attribute, AttributeType, Feature, FeatureSource, Filter, MemoryFeatureSource, Schema, Value,
};

mod types;
pub use types::*;
