//! Single-file geospatial container store.
//!
//! A container is one SQLite file with a content catalog describing every
//! dataset it holds: vector feature tables, single-blob rasters, and tile
//! pyramids. [`GeoPackage`] is the handle to one container;
//! [`PyramidGenerator`] renders a source map into a fresh container, one
//! tile at a time.
//!
//! ```no_run
//! use geopkg_container::GeoPackage;
//! use geopkg_core::EpsgRegistry;
//! use std::{path::Path, sync::Arc};
//!
//! let geopkg = GeoPackage::create(Path::new("map.gpkg"), Arc::new(EpsgRegistry::new()))?;
//! for entry in geopkg.contents()? {
//!     println!("{}: {:?}", entry.table_name, entry.data_type());
//! }
//! # Ok::<(), geopkg_core::GeoPackageError>(())
//! ```

mod container;
pub use container::{FeatureReader, FeatureStore, FeatureWriter, GeoPackage, TileCursor, TileQuery, WriteMode};

mod pyramid;
pub use pyramid::{PyramidArtifact, PyramidGenerator, PyramidOptions};
