//! Tile pyramid datasets: per-zoom tile matrices plus one indexed tile
//! table.

use crate::container::GeoPackage;
use crate::container::catalog::{self, quote_ident};
use geopkg_core::{
	DatasetKind, Entry, GeoPackageError, Result, Tile, TileEntrySpec, TileMeta, ensure_valid, matrix_for_zoom,
	validate_matrix_set,
};
use r2d2::PooledConnection;
use r2d2_sqlite::{SqliteConnectionManager, rusqlite::params};
use std::{collections::VecDeque, ops::RangeInclusive};
use time::OffsetDateTime;

const TILE_BATCH_SIZE: usize = 64;

impl GeoPackage {
	/// Creates an empty tile pyramid: the tile table with its uniqueness
	/// index, the per-zoom matrix rows, and the catalog entry, all in one
	/// transaction.
	///
	/// `table_name` defaults to `tiles` and `times_two_zoom` to true; bounds,
	/// srid and at least one tile matrix are required.
	pub fn create_tiles(&self, spec: TileEntrySpec) -> Result<Entry> {
		let table_name = spec.table_name.unwrap_or_else(|| String::from("tiles"));
		catalog::validate_table_name(&table_name)?;

		let bounds = spec
			.bounds
			.ok_or_else(|| GeoPackageError::validation(format!("tile entry '{table_name}' must have bounds")))?;
		let srid = spec
			.srid
			.ok_or_else(|| GeoPackageError::validation(format!("tile entry '{table_name}' must have an srid")))?;
		let crs = self.crs_engine().decode(srid)?;
		validate_matrix_set(&spec.matrices)?;

		let mut conn = self.pool().get()?;
		let tx = conn.transaction()?;
		catalog::ensure_unregistered(&tx, &table_name)?;
		tx.execute_batch(&format!(
			"CREATE TABLE {table} (
				id INTEGER PRIMARY KEY AUTOINCREMENT,
				zoom_level INTEGER NOT NULL,
				tile_column INTEGER NOT NULL,
				tile_row INTEGER NOT NULL,
				tile_data BLOB NOT NULL
			);
			CREATE UNIQUE INDEX {index} ON {table} (zoom_level, tile_column, tile_row);",
			table = quote_ident(&table_name),
			index = quote_ident(&format!("{table_name}_tile_index")),
		))?;

		let entry = Entry {
			identifier: spec.identifier.unwrap_or_else(|| table_name.clone()),
			description: spec.description.unwrap_or_default(),
			table_name,
			bounds,
			srid,
			crs,
			last_change: OffsetDateTime::now_utc(),
			kind: DatasetKind::Tile(TileMeta {
				times_two_zoom: spec.times_two_zoom.unwrap_or(true),
				matrices: spec.matrices,
			}),
		};
		catalog::register(&tx, &entry)?;
		tx.commit()?;
		Ok(entry)
	}

	/// Stores one tile, replacing any tile already at its address, and
	/// refreshes the entry's `last_change`. The tile address must fit the
	/// entry's matrix for that zoom level.
	pub fn add_tile(&self, entry: &Entry, tile: &Tile) -> Result<()> {
		let meta = entry
			.tile_meta()
			.ok_or_else(|| GeoPackageError::validation(format!("entry '{}' is not a tile dataset", entry.table_name)))?;
		catalog::validate_table_name(&entry.table_name)?;

		let matrix = matrix_for_zoom(&meta.matrices, tile.zoom)?;
		ensure_valid!(
			tile.column < matrix.matrix_width && tile.row < matrix.matrix_height,
			"tile ({}, {}) is outside the {}x{} matrix at zoom {}",
			tile.column,
			tile.row,
			matrix.matrix_width,
			matrix.matrix_height,
			tile.zoom
		);

		let mut conn = self.pool().get()?;
		let tx = conn.transaction()?;
		tx.execute(
			&format!(
				"INSERT OR REPLACE INTO {} (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
				quote_ident(&entry.table_name)
			),
			params![tile.zoom, tile.column, tile.row, tile.data],
		)?;
		GeoPackage::touch(&tx, &entry.table_name)?;
		tx.commit()?;
		Ok(())
	}

	/// Opens a cursor over the stored tiles of a pyramid, restricted by the
	/// query's optional inclusive ranges.
	///
	/// The cursor owns its pooled connection and pages through the table in
	/// rowid order; dropping it mid-iteration releases the connection
	/// without reading the rest.
	pub fn tile_reader(&self, entry: &Entry, query: TileQuery) -> Result<TileCursor> {
		entry
			.tile_meta()
			.ok_or_else(|| GeoPackageError::validation(format!("entry '{}' is not a tile dataset", entry.table_name)))?;
		catalog::validate_table_name(&entry.table_name)?;

		let mut clauses = vec![String::from("id > ?1")];
		let mut bindings: Vec<i64> = Vec::new();
		let mut range_clause = |column: &str, range: Option<(i64, i64)>| {
			if let Some((low, high)) = range {
				bindings.push(low);
				clauses.push(format!("{column} >= ?{}", bindings.len() + 1));
				bindings.push(high);
				clauses.push(format!("{column} <= ?{}", bindings.len() + 1));
			}
		};
		range_clause(
			"zoom_level",
			query.zoom.map(|r| (i64::from(*r.start()), i64::from(*r.end()))),
		);
		range_clause(
			"tile_column",
			query.column.map(|r| (i64::from(*r.start()), i64::from(*r.end()))),
		);
		range_clause(
			"tile_row",
			query.row.map(|r| (i64::from(*r.start()), i64::from(*r.end()))),
		);

		let sql = format!(
			"SELECT id, zoom_level, tile_column, tile_row, tile_data FROM {} WHERE {} ORDER BY id LIMIT {TILE_BATCH_SIZE}",
			quote_ident(&entry.table_name),
			clauses.join(" AND ")
		);

		Ok(TileCursor {
			conn: self.pool().get()?,
			sql,
			bindings,
			last_rowid: 0,
			batch: VecDeque::new(),
			exhausted: false,
		})
	}
}

/// Optional inclusive range restrictions for [`GeoPackage::tile_reader`];
/// the given ranges are combined with AND.
#[derive(Clone, Debug, Default)]
pub struct TileQuery {
	pub zoom: Option<RangeInclusive<u8>>,
	pub column: Option<RangeInclusive<u32>>,
	pub row: Option<RangeInclusive<u32>>,
}

impl TileQuery {
	/// Restricts to a single zoom level.
	pub fn at_zoom(zoom: u8) -> TileQuery {
		TileQuery {
			zoom: Some(zoom..=zoom),
			..TileQuery::default()
		}
	}
}

/// Paging cursor over stored tiles.
pub struct TileCursor {
	conn: PooledConnection<SqliteConnectionManager>,
	sql: String,
	bindings: Vec<i64>,
	last_rowid: i64,
	batch: VecDeque<Tile>,
	exhausted: bool,
}

impl TileCursor {
	fn fetch_batch(&mut self) -> Result<()> {
		let mut statement = self.conn.prepare_cached(&self.sql)?;
		let params = std::iter::once(self.last_rowid).chain(self.bindings.iter().copied());
		let mut rows = statement.query(r2d2_sqlite::rusqlite::params_from_iter(params))?;
		let mut fetched = 0usize;
		while let Some(row) = rows.next()? {
			self.last_rowid = row.get(0)?;
			self.batch.push_back(Tile::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?));
			fetched += 1;
		}
		if fetched < TILE_BATCH_SIZE {
			self.exhausted = true;
		}
		Ok(())
	}
}

impl Iterator for TileCursor {
	type Item = Result<Tile>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.batch.is_empty() && !self.exhausted {
			if let Err(e) = self.fetch_batch() {
				self.exhausted = true;
				return Some(Err(e));
			}
		}
		self.batch.pop_front().map(Ok)
	}
}
