//! Content catalog: the shared envelope every dataset registers in, plus the
//! type-specific sidecar tables it is joined with on read.

use crate::container::GeoPackage;
use geopkg_core::{
	Bounds, DataType, DatasetKind, Entry, FeatureMeta, GeoPackageError, Georectification, GeometryType, RasterMeta,
	Result, TileMatrix, TileMeta, ensure_valid, validate_matrix_set,
};
use r2d2_sqlite::rusqlite::{Connection, OptionalExtension, params};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Table names reserved for the container's own metadata; user datasets may
/// not collide with them.
pub(crate) const METADATA_TABLES: [&str; 5] = [
	"content_catalog",
	"geometry_columns",
	"raster_columns",
	"tile_table_metadata",
	"tile_matrix_metadata",
];

/// Rejects dataset table names that would be unsafe to splice into DDL or
/// that shadow a metadata table. Names are restricted to ASCII alphanumerics
/// and underscores, not starting with a digit.
pub(crate) fn validate_table_name(name: &str) -> Result<()> {
	ensure_valid!(!name.is_empty(), "dataset table name must not be empty");
	ensure_valid!(
		name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
		"dataset table name '{name}' may only contain ASCII alphanumerics and underscores"
	);
	ensure_valid!(
		!name.chars().next().is_some_and(|c| c.is_ascii_digit()),
		"dataset table name '{name}' must not start with a digit"
	);
	ensure_valid!(
		!METADATA_TABLES.contains(&name),
		"'{name}' is a reserved metadata table name"
	);
	Ok(())
}

/// Quotes an already-validated identifier for use in dynamic SQL.
pub(crate) fn quote_ident(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn now_rfc3339() -> String {
	OffsetDateTime::now_utc()
		.replace_nanosecond(0)
		.unwrap_or_else(|_| OffsetDateTime::now_utc())
		.format(&Rfc3339)
		.unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Fails with a [`GeoPackageError::Validation`] when `table_name` is already
/// registered. Create operations call this before running any DDL so a
/// duplicate name never surfaces as a storage error.
pub(crate) fn ensure_unregistered(conn: &Connection, table_name: &str) -> Result<()> {
	let exists: bool = conn
		.query_row(
			"SELECT 1 FROM content_catalog WHERE table_name = ?1",
			params![table_name],
			|_| Ok(true),
		)
		.optional()?
		.unwrap_or(false);
	if exists {
		return Err(GeoPackageError::validation(format!(
			"an entry named '{table_name}' is already registered"
		)));
	}
	Ok(())
}

/// Inserts the catalog row and the type-specific sidecar rows for `entry`.
///
/// Runs on the caller's connection so dataset creation stays a single
/// transaction; a duplicate table name fails before anything is written.
pub(crate) fn register(conn: &Connection, entry: &Entry) -> Result<()> {
	validate_table_name(&entry.table_name)?;
	ensure_unregistered(conn, &entry.table_name)?;

	let last_change = entry
		.last_change
		.format(&Rfc3339)
		.map_err(|e| GeoPackageError::validation(format!("unformattable last_change timestamp: {e}")))?;
	conn.execute(
		"INSERT INTO content_catalog (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srid)
		 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
		params![
			entry.table_name,
			entry.data_type().as_str(),
			entry.identifier,
			entry.description,
			last_change,
			entry.bounds.min_x,
			entry.bounds.min_y,
			entry.bounds.max_x,
			entry.bounds.max_y,
			entry.srid,
		],
	)?;

	match &entry.kind {
		DatasetKind::Feature(meta) => {
			conn.execute(
				"INSERT INTO geometry_columns (f_table_name, f_geometry_column, type, coord_dimension, srid)
				 VALUES (?1, ?2, ?3, ?4, ?5)",
				params![
					entry.table_name,
					meta.geometry_column,
					meta.geometry_type.as_str(),
					meta.coord_dimension,
					entry.srid,
				],
			)?;
		}
		DatasetKind::Raster(meta) => {
			conn.execute(
				"INSERT INTO raster_columns (r_table_name, r_raster_column, compr_qual_factor, georectification, srid)
				 VALUES (?1, ?2, ?3, ?4, ?5)",
				params![
					entry.table_name,
					meta.raster_column,
					meta.compression_quality,
					meta.georectification.code(),
					entry.srid,
				],
			)?;
		}
		DatasetKind::Tile(meta) => {
			conn.execute(
				"INSERT INTO tile_table_metadata (t_table_name, is_times_two_zoom) VALUES (?1, ?2)",
				params![entry.table_name, meta.times_two_zoom],
			)?;
			for m in &meta.matrices {
				conn.execute(
					"INSERT INTO tile_matrix_metadata (t_table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height, pixel_x_size, pixel_y_size)
					 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
					params![
						entry.table_name,
						m.zoom_level,
						m.matrix_width,
						m.matrix_height,
						m.tile_width,
						m.tile_height,
						m.pixel_x_size,
						m.pixel_y_size,
					],
				)?;
			}
		}
	}
	Ok(())
}

impl GeoPackage {
	/// All registered entries, ordered by table name.
	pub fn contents(&self) -> Result<Vec<Entry>> {
		self.query_entries(None, None)
	}

	/// All entries of one data type.
	pub fn list(&self, data_type: DataType) -> Result<Vec<Entry>> {
		self.query_entries(Some(data_type), None)
	}

	/// The entry registered under `table_name`, if any.
	pub fn find(&self, table_name: &str) -> Result<Option<Entry>> {
		Ok(self.query_entries(None, Some(table_name))?.into_iter().next())
	}

	/// Updates the `last_change` timestamp of an entry to now.
	pub(crate) fn touch(conn: &Connection, table_name: &str) -> Result<()> {
		conn.execute(
			"UPDATE content_catalog SET last_change = ?1 WHERE table_name = ?2",
			params![now_rfc3339(), table_name],
		)?;
		Ok(())
	}

	fn query_entries(&self, data_type: Option<DataType>, table_name: Option<&str>) -> Result<Vec<Entry>> {
		let conn = self.pool().get()?;
		let mut sql = String::from(
			"SELECT table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srid
			 FROM content_catalog",
		);
		let mut clauses = Vec::new();
		let mut bindings: Vec<String> = Vec::new();
		if let Some(dt) = data_type {
			bindings.push(String::from(dt.as_str()));
			clauses.push(format!("data_type = ?{}", bindings.len()));
		}
		if let Some(name) = table_name {
			bindings.push(String::from(name));
			clauses.push(format!("table_name = ?{}", bindings.len()));
		}
		if !clauses.is_empty() {
			sql.push_str(" WHERE ");
			sql.push_str(&clauses.join(" AND "));
		}
		sql.push_str(" ORDER BY table_name");

		let mut statement = conn.prepare(&sql)?;
		let rows = statement.query_map(
			r2d2_sqlite::rusqlite::params_from_iter(bindings.iter()),
			|row| {
				Ok(CatalogRow {
					table_name: row.get(0)?,
					data_type: row.get(1)?,
					identifier: row.get(2)?,
					description: row.get(3)?,
					last_change: row.get(4)?,
					min_x: row.get(5)?,
					min_y: row.get(6)?,
					max_x: row.get(7)?,
					max_y: row.get(8)?,
					srid: row.get(9)?,
				})
			},
		)?;

		let mut entries = Vec::new();
		for row in rows {
			entries.push(self.hydrate(&conn, row?)?);
		}
		Ok(entries)
	}

	/// Turns one catalog row into a fully-populated [`Entry`]: resolves the
	/// reference system, parses the timestamp, and joins the type-specific
	/// sidecar tables.
	fn hydrate(&self, conn: &Connection, row: CatalogRow) -> Result<Entry> {
		let crs = self.crs_engine().decode(row.srid)?;
		let last_change = OffsetDateTime::parse(&row.last_change, &Rfc3339).map_err(|e| {
			GeoPackageError::validation(format!(
				"entry '{}' has an unparsable last_change '{}': {e}",
				row.table_name, row.last_change
			))
		})?;
		let bounds = Bounds::new(row.min_x, row.min_y, row.max_x, row.max_y)?;

		let kind = match DataType::parse(&row.data_type)? {
			DataType::Feature => {
				let meta = conn.query_row(
					"SELECT f_geometry_column, type, coord_dimension FROM geometry_columns WHERE f_table_name = ?1",
					params![row.table_name],
					|r| {
						Ok((
							r.get::<_, String>(0)?,
							r.get::<_, String>(1)?,
							r.get::<_, u8>(2)?,
						))
					},
				)?;
				DatasetKind::Feature(FeatureMeta {
					geometry_column: meta.0,
					geometry_type: GeometryType::parse(&meta.1)?,
					coord_dimension: meta.2,
				})
			}
			DataType::Raster => {
				let meta = conn.query_row(
					"SELECT r_raster_column, compr_qual_factor, georectification FROM raster_columns WHERE r_table_name = ?1",
					params![row.table_name],
					|r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?, r.get::<_, i32>(2)?)),
				)?;
				DatasetKind::Raster(RasterMeta {
					raster_column: meta.0,
					compression_quality: meta.1,
					georectification: Georectification::from_code(meta.2)?,
				})
			}
			DataType::Tile => {
				let times_two_zoom: bool = conn.query_row(
					"SELECT is_times_two_zoom FROM tile_table_metadata WHERE t_table_name = ?1",
					params![row.table_name],
					|r| r.get(0),
				)?;
				let mut statement = conn.prepare(
					"SELECT zoom_level, matrix_width, matrix_height, tile_width, tile_height, pixel_x_size, pixel_y_size
					 FROM tile_matrix_metadata WHERE t_table_name = ?1 ORDER BY zoom_level",
				)?;
				let matrices = statement
					.query_map(params![row.table_name], |r| {
						Ok((
							r.get::<_, u8>(0)?,
							r.get::<_, u32>(1)?,
							r.get::<_, u32>(2)?,
							r.get::<_, u32>(3)?,
							r.get::<_, u32>(4)?,
							r.get::<_, f64>(5)?,
							r.get::<_, f64>(6)?,
						))
					})?
					.map(|r| {
						let (zoom, mw, mh, tw, th, px, py) = r?;
						TileMatrix::new(zoom, mw, mh, tw, th, px, py)
					})
					.collect::<Result<Vec<_>>>()?;
				validate_matrix_set(&matrices)?;
				DatasetKind::Tile(TileMeta {
					times_two_zoom,
					matrices,
				})
			}
		};

		Ok(Entry {
			table_name: row.table_name,
			identifier: row.identifier,
			description: row.description,
			bounds,
			srid: row.srid,
			crs,
			last_change,
			kind,
		})
	}
}

struct CatalogRow {
	table_name: String,
	data_type: String,
	identifier: String,
	description: String,
	last_change: String,
	min_x: f64,
	min_y: f64,
	max_x: f64,
	max_y: f64,
	srid: i32,
}
