//! Single-blob raster datasets: one table, one row, one encoded image.

use crate::container::GeoPackage;
use crate::container::catalog::{self, quote_ident};
use geopkg_core::{
	DatasetKind, DecodeHints, Entry, GeoPackageError, RasterCodec, RasterEntrySpec, RasterFormat, RasterImage,
	RasterMeta, Result,
};
use r2d2_sqlite::rusqlite::{OptionalExtension, params};
use time::OffsetDateTime;

impl GeoPackage {
	/// Encodes `raster` and stores it as a new single-row raster dataset.
	///
	/// Unset spec fields are derived from the image: table name from its
	/// name, bounds and reference system from its georeferencing. Table
	/// creation, the blob insert and catalog registration commit together.
	pub fn add_raster(
		&self,
		spec: RasterEntrySpec,
		raster: &RasterImage,
		format: RasterFormat,
		codec: &dyn RasterCodec,
	) -> Result<Entry> {
		let table_name = spec
			.table_name
			.or_else(|| raster.name.clone())
			.ok_or_else(|| GeoPackageError::validation("raster entry needs a table name, none given and the image is unnamed"))?;
		catalog::validate_table_name(&table_name)?;

		let bounds = spec.bounds.or(raster.bounds).ok_or_else(|| {
			GeoPackageError::validation(format!("raster entry '{table_name}' must have bounds"))
		})?;
		let srid = match spec.srid {
			Some(srid) => srid,
			None => raster
				.crs
				.as_ref()
				.and_then(|crs| self.crs_engine().resolve_srid(crs))
				.ok_or_else(|| {
					GeoPackageError::validation(format!(
						"no srid given and none could be resolved for raster entry '{table_name}'"
					))
				})?,
		};
		let crs = self.crs_engine().decode(srid)?;
		let meta = RasterMeta {
			raster_column: spec.raster_column.unwrap_or_else(|| String::from("raster")),
			..RasterMeta::default()
		};

		let blob = codec.encode(raster, format)?;
		log::debug!("storing raster '{table_name}' as {} ({} bytes)", format.as_str(), blob.len());

		let mut conn = self.pool().get()?;
		let tx = conn.transaction()?;
		catalog::ensure_unregistered(&tx, &table_name)?;
		tx.execute(
			&format!(
				"CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {} BLOB NOT NULL)",
				quote_ident(&table_name),
				quote_ident(&meta.raster_column)
			),
			[],
		)?;
		tx.execute(
			&format!(
				"INSERT INTO {} ({}) VALUES (?1)",
				quote_ident(&table_name),
				quote_ident(&meta.raster_column)
			),
			params![blob],
		)?;

		let entry = Entry {
			identifier: spec.identifier.unwrap_or_else(|| table_name.clone()),
			description: spec.description.unwrap_or_default(),
			table_name,
			bounds,
			srid,
			crs,
			last_change: OffsetDateTime::now_utc(),
			kind: DatasetKind::Raster(meta),
		};
		catalog::register(&tx, &entry)?;
		tx.commit()?;
		Ok(entry)
	}

	/// Reads a stored raster back, decoding it with the entry's bounds as
	/// georeferencing hint. Returns `None` when the table has no row.
	pub fn read_raster(
		&self,
		entry: &Entry,
		format: RasterFormat,
		codec: &dyn RasterCodec,
	) -> Result<Option<RasterImage>> {
		let meta = entry
			.raster_meta()
			.ok_or_else(|| GeoPackageError::validation(format!("entry '{}' is not a raster dataset", entry.table_name)))?;
		catalog::validate_table_name(&entry.table_name)?;

		let conn = self.pool().get()?;
		let blob: Option<Vec<u8>> = conn
			.query_row(
				&format!(
					"SELECT {} FROM {} ORDER BY id LIMIT 1",
					quote_ident(&meta.raster_column),
					quote_ident(&entry.table_name)
				),
				[],
				|row| row.get(0),
			)
			.optional()?;

		match blob {
			None => Ok(None),
			Some(blob) => {
				let hints = DecodeHints {
					bounds: Some(entry.bounds),
				};
				let mut raster = codec.decode(&blob, format, &hints)?;
				raster.name = Some(entry.identifier.clone());
				raster.crs = Some(entry.crs.clone());
				Ok(Some(raster))
			}
		}
	}
}
