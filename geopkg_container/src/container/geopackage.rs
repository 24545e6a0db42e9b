//! The container handle: owns the connection pool and the lazily created
//! feature store.

use crate::container::features::FeatureStore;
use geopkg_core::{CrsEngine, GeoPackageError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::{
	path::{Path, PathBuf},
	sync::{Arc, OnceLock},
};

/// SQL that creates the shared metadata tables. Idempotent, so reopening an
/// existing container and re-running it is safe.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS content_catalog (
	table_name TEXT NOT NULL PRIMARY KEY,
	data_type TEXT NOT NULL,
	identifier TEXT NOT NULL,
	description TEXT NOT NULL DEFAULT '',
	last_change TEXT NOT NULL,
	min_x DOUBLE NOT NULL,
	min_y DOUBLE NOT NULL,
	max_x DOUBLE NOT NULL,
	max_y DOUBLE NOT NULL,
	srid INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS geometry_columns (
	f_table_name TEXT NOT NULL,
	f_geometry_column TEXT NOT NULL,
	type TEXT NOT NULL,
	coord_dimension INTEGER NOT NULL,
	srid INTEGER NOT NULL,
	PRIMARY KEY (f_table_name, f_geometry_column)
);
CREATE TABLE IF NOT EXISTS raster_columns (
	r_table_name TEXT NOT NULL,
	r_raster_column TEXT NOT NULL,
	compr_qual_factor DOUBLE NOT NULL,
	georectification INTEGER NOT NULL,
	srid INTEGER NOT NULL,
	PRIMARY KEY (r_table_name, r_raster_column)
);
CREATE TABLE IF NOT EXISTS tile_table_metadata (
	t_table_name TEXT NOT NULL PRIMARY KEY,
	is_times_two_zoom INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tile_matrix_metadata (
	t_table_name TEXT NOT NULL,
	zoom_level INTEGER NOT NULL,
	matrix_width INTEGER NOT NULL,
	matrix_height INTEGER NOT NULL,
	tile_width INTEGER NOT NULL,
	tile_height INTEGER NOT NULL,
	pixel_x_size DOUBLE NOT NULL,
	pixel_y_size DOUBLE NOT NULL,
	PRIMARY KEY (t_table_name, zoom_level)
);
";

/// Handle to one container file.
///
/// The handle owns a pooled connection set to the underlying SQLite file.
/// One container is assumed to have a single writer; concurrent readers are
/// fine while no writer transaction is open. Dropping (or [`close`]ing) the
/// handle releases the pool; the persisted datasets survive in the file.
///
/// [`close`]: GeoPackage::close
pub struct GeoPackage {
	path: PathBuf,
	pool: Pool<SqliteConnectionManager>,
	crs_engine: Arc<dyn CrsEngine>,
	feature_store: OnceLock<FeatureStore>,
}

impl GeoPackage {
	/// Creates a new, empty container file and initializes its metadata
	/// schema. Fails if the file already exists.
	pub fn create(path: &Path, crs_engine: Arc<dyn CrsEngine>) -> Result<GeoPackage> {
		log::debug!("create {path:?}");
		if path.exists() {
			return Err(GeoPackageError::validation(format!(
				"container file {} already exists",
				path.display()
			)));
		}
		let geopkg = GeoPackage::from_file(path, crs_engine)?;
		geopkg.init_schema()?;
		Ok(geopkg)
	}

	/// Opens an existing container file.
	pub fn open(path: &Path, crs_engine: Arc<dyn CrsEngine>) -> Result<GeoPackage> {
		log::debug!("open {path:?}");
		if !path.exists() {
			return Err(GeoPackageError::validation(format!(
				"container file {} does not exist",
				path.display()
			)));
		}
		GeoPackage::from_file(path, crs_engine)
	}

	fn from_file(path: &Path, crs_engine: Arc<dyn CrsEngine>) -> Result<GeoPackage> {
		let manager = SqliteConnectionManager::file(path);
		let pool = Pool::builder().max_size(10).build(manager)?;
		Ok(GeoPackage {
			path: path.to_path_buf(),
			pool,
			crs_engine,
			feature_store: OnceLock::new(),
		})
	}

	/// Creates the metadata tables. Idempotent; [`create`] calls this
	/// automatically, reopened containers may call it again.
	///
	/// [`create`]: GeoPackage::create
	pub fn init_schema(&self) -> Result<()> {
		self.pool.get()?.execute_batch(SCHEMA_SQL)?;
		Ok(())
	}

	/// The underlying container file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	pub(crate) fn pool(&self) -> &Pool<SqliteConnectionManager> {
		&self.pool
	}

	pub(crate) fn crs_engine(&self) -> &Arc<dyn CrsEngine> {
		&self.crs_engine
	}

	/// The vector dataset manager, created on first use.
	///
	/// Initialization happens at most once even under concurrent first
	/// access; later callers share the same store.
	pub fn feature_store(&self) -> &FeatureStore {
		self
			.feature_store
			.get_or_init(|| FeatureStore::new(self.pool.clone(), Arc::clone(&self.crs_engine)))
	}

	/// Releases the connection pool. Equivalent to dropping the handle; the
	/// file and all registered datasets remain.
	pub fn close(self) {
		log::debug!("close {:?}", self.path);
		drop(self);
	}
}

impl std::fmt::Debug for GeoPackage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GeoPackage").field("path", &self.path).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use geopkg_core::EpsgRegistry;
	use tempfile::TempDir;

	fn engine() -> Arc<dyn CrsEngine> {
		Arc::new(EpsgRegistry::new())
	}

	#[test]
	fn create_then_reopen() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("test.gpkg");

		let geopkg = GeoPackage::create(&path, engine())?;
		assert_eq!(geopkg.contents()?.len(), 0);
		geopkg.close();

		let reopened = GeoPackage::open(&path, engine())?;
		reopened.init_schema()?; // idempotent
		assert_eq!(reopened.contents()?.len(), 0);
		Ok(())
	}

	#[test]
	fn create_refuses_existing_file() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("test.gpkg");
		GeoPackage::create(&path, engine())?.close();

		assert!(matches!(
			GeoPackage::create(&path, engine()),
			Err(GeoPackageError::Validation(_))
		));
		Ok(())
	}

	#[test]
	fn open_requires_existing_file() {
		let result = GeoPackage::open(Path::new("/nonexistent/no.gpkg"), engine());
		assert!(matches!(result, Err(GeoPackageError::Validation(_))));
	}

	#[test]
	fn feature_store_is_initialized_once() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = GeoPackage::create(&dir.path().join("test.gpkg"), engine())?;
		let first = geopkg.feature_store();
		let second = geopkg.feature_store();
		assert!(std::ptr::eq(first, second));
		Ok(())
	}
}
