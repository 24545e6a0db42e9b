//! Vector dataset manager: feature table creation, bulk copy, and row-level
//! read/write access.

use crate::container::catalog::{self, quote_ident};
use geopkg_core::{
	Attribute, AttributeType, CrsEngine, DatasetKind, Entry, Feature, FeatureEntrySpec, FeatureMeta, FeatureSource,
	Filter, GeoPackageError, Result, Schema, Value, ensure_valid,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::{
	SqliteConnectionManager,
	rusqlite::{
		Connection, params, params_from_iter,
		types::{Value as SqlValue, ValueRef},
	},
};
use std::{collections::VecDeque, sync::Arc};
use time::OffsetDateTime;

const READ_BATCH_SIZE: usize = 256;

/// Manager for vector feature datasets. Obtained lazily from the container
/// handle; all methods go through the shared connection pool.
pub struct FeatureStore {
	pool: Pool<SqliteConnectionManager>,
	crs_engine: Arc<dyn CrsEngine>,
}

impl FeatureStore {
	pub(crate) fn new(pool: Pool<SqliteConnectionManager>, crs_engine: Arc<dyn CrsEngine>) -> FeatureStore {
		FeatureStore { pool, crs_engine }
	}

	/// Creates an empty feature table and registers it in the catalog, in
	/// one transaction. Validation runs first, so a failed call leaves no
	/// table and no catalog row behind.
	pub fn create(&self, spec: FeatureEntrySpec, schema: &Schema) -> Result<Entry> {
		let mut conn = self.pool.get()?;
		let tx = conn.transaction()?;
		let entry = self.create_on(&tx, spec, schema)?;
		tx.commit()?;
		Ok(entry)
	}

	/// Creates the dataset described by `spec` and copies every feature from
	/// `source` (optionally filtered) into it. Table creation, catalog
	/// registration and the row copy commit together; any failure rolls the
	/// whole dataset back.
	pub fn add(
		&self,
		mut spec: FeatureEntrySpec,
		source: &dyn FeatureSource,
		filter: Option<&Filter>,
	) -> Result<Entry> {
		if spec.bounds.is_none() {
			spec.bounds = source.bounds();
		}
		let schema = source.schema();

		let mut conn = self.pool.get()?;
		let tx = conn.transaction()?;
		let entry = self.create_on(&tx, spec, schema)?;

		let insert_sql = insert_sql(&entry.table_name, schema);
		let mut count = 0u64;
		{
			let mut statement = tx.prepare(&insert_sql)?;
			for feature in source.features(filter) {
				let feature = feature?;
				ensure_valid!(
					feature.values.len() == schema.attributes().len(),
					"feature has {} values but schema '{}' has {} attributes",
					feature.values.len(),
					schema.name(),
					schema.attributes().len()
				);
				statement.execute(params_from_iter(feature.values.iter().map(value_to_sql)))?;
				count += 1;
			}
		}
		tx.commit()?;
		log::debug!("copied {count} features into '{}'", entry.table_name);
		Ok(entry)
	}

	fn create_on(&self, conn: &Connection, spec: FeatureEntrySpec, schema: &Schema) -> Result<Entry> {
		let table_name = spec.table_name.unwrap_or_else(|| String::from(schema.name()));
		catalog::validate_table_name(&table_name)?;
		catalog::ensure_unregistered(conn, &table_name)?;

		let geometry = match &spec.geometry_column {
			Some(name) => schema.attribute(name).ok_or_else(|| {
				GeoPackageError::validation(format!(
					"schema '{}' has no attribute '{name}' to use as geometry column",
					schema.name()
				))
			})?,
			None => schema.geometry_attribute().ok_or_else(|| {
				GeoPackageError::validation(format!(
					"schema '{}' has no geometry attribute; feature datasets need one",
					schema.name()
				))
			})?,
		};
		let AttributeType::Geometry(geometry_type, coord_dimension) = &geometry.attr_type else {
			return Err(GeoPackageError::validation(format!(
				"attribute '{}' of schema '{}' is not a geometry column",
				geometry.name,
				schema.name()
			)));
		};

		let srid = match spec.srid {
			Some(srid) => srid,
			None => schema
				.crs()
				.and_then(|crs| self.crs_engine.resolve_srid(crs))
				.ok_or_else(|| {
					GeoPackageError::validation(format!(
						"no srid given and none could be resolved for schema '{}'",
						schema.name()
					))
				})?,
		};
		let crs = self.crs_engine.decode(srid)?;
		let bounds = spec.bounds.ok_or_else(|| {
			GeoPackageError::validation(format!("feature entry '{table_name}' must have bounds"))
		})?;

		let columns: Vec<String> = schema
			.attributes()
			.iter()
			.map(|a| format!("{} {}", quote_ident(&a.name), a.attr_type.sql_type()))
			.collect();
		conn.execute(
			&format!(
				"CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
				quote_ident(&table_name),
				columns.join(", ")
			),
			[],
		)?;

		let entry = Entry {
			identifier: spec.identifier.unwrap_or_else(|| table_name.clone()),
			description: spec.description.unwrap_or_default(),
			table_name,
			bounds,
			srid,
			crs,
			last_change: OffsetDateTime::now_utc(),
			kind: DatasetKind::Feature(FeatureMeta {
				geometry_column: geometry.name.clone(),
				geometry_type: *geometry_type,
				coord_dimension: *coord_dimension,
			}),
		};
		catalog::register(conn, &entry)?;
		Ok(entry)
	}

	/// Reconstructs the schema of a stored feature dataset from the table's
	/// columns and the geometry metadata.
	pub fn schema_of(&self, entry: &Entry) -> Result<Schema> {
		let meta = entry
			.feature_meta()
			.ok_or_else(|| GeoPackageError::validation(format!("entry '{}' is not a feature dataset", entry.table_name)))?;
		catalog::validate_table_name(&entry.table_name)?;

		let conn = self.pool.get()?;
		let mut statement = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&entry.table_name)))?;
		let columns = statement
			.query_map([], |row| {
				Ok((
					row.get::<_, String>(1)?,
					row.get::<_, String>(2)?,
					row.get::<_, i32>(5)?,
				))
			})?
			.collect::<std::result::Result<Vec<_>, _>>()?;

		let mut attributes = Vec::new();
		for (name, sql_type, pk) in columns {
			if pk != 0 {
				continue;
			}
			let attr_type = if name == meta.geometry_column {
				AttributeType::Geometry(meta.geometry_type, meta.coord_dimension)
			} else {
				match sql_type.to_ascii_uppercase().as_str() {
					"INTEGER" => AttributeType::Integer,
					"REAL" | "DOUBLE" | "FLOAT" => AttributeType::Real,
					"BLOB" => AttributeType::Blob,
					_ => AttributeType::Text,
				}
			};
			attributes.push(Attribute { name, attr_type });
		}
		Schema::new(entry.table_name.clone(), attributes, Some(entry.crs.clone()))
	}

	/// Opens a row writer on the dataset. The writer holds one pooled
	/// connection with an open transaction; nothing is visible to readers
	/// until [`FeatureWriter::finish`] commits.
	pub fn writer(&self, entry: &Entry, mode: WriteMode) -> Result<FeatureWriter> {
		let schema = self.schema_of(entry)?;
		let conn = self.pool.get()?;
		conn.execute_batch("BEGIN")?;
		Ok(FeatureWriter {
			conn,
			table_name: entry.table_name.clone(),
			schema,
			mode,
			open: true,
		})
	}

	/// Streams the features of a dataset, optionally filtered.
	///
	/// The returned reader owns its pooled connection and pages through the
	/// table in rowid order, so arbitrarily large datasets never load fully
	/// into memory. Dropping the reader releases the connection back to the
	/// pool.
	pub fn reader(&self, entry: &Entry, filter: Option<&Filter>) -> Result<FeatureReader> {
		let schema = self.schema_of(entry)?;
		let meta = entry
			.feature_meta()
			.ok_or_else(|| GeoPackageError::validation(format!("entry '{}' is not a feature dataset", entry.table_name)))?;

		let column_list = schema
			.attributes()
			.iter()
			.map(|a| quote_ident(&a.name))
			.collect::<Vec<_>>()
			.join(", ");
		let (filter_sql, filter_value) = match filter {
			Some(Filter::Equals(name, value)) => {
				ensure_valid!(
					schema.attribute(name).is_some(),
					"filter references unknown attribute '{name}'"
				);
				(format!(" AND {} = ?2", quote_ident(name)), Some(value_to_sql(value)))
			}
			None => (String::new(), None),
		};
		let sql = format!(
			"SELECT id, {column_list} FROM {} WHERE id > ?1{filter_sql} ORDER BY id LIMIT {READ_BATCH_SIZE}",
			quote_ident(&entry.table_name)
		);

		Ok(FeatureReader {
			conn: self.pool.get()?,
			sql,
			filter_value,
			geometry_index: schema
				.attributes()
				.iter()
				.position(|a| a.name == meta.geometry_column),
			last_rowid: 0,
			batch: VecDeque::new(),
			exhausted: false,
		})
	}
}

/// What a [`FeatureWriter`] is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
	/// Only [`FeatureWriter::write`] (inserts).
	Append,
	/// Only [`FeatureWriter::update_where`] and [`FeatureWriter::delete_where`].
	Update,
}

/// Transactional row writer for one feature dataset.
///
/// All writes go into a single transaction opened when the writer is
/// created. [`finish`] commits it and refreshes the entry's `last_change`
/// timestamp; dropping the writer without finishing rolls everything back.
///
/// [`finish`]: FeatureWriter::finish
pub struct FeatureWriter {
	conn: PooledConnection<SqliteConnectionManager>,
	table_name: String,
	schema: Schema,
	mode: WriteMode,
	open: bool,
}

impl FeatureWriter {
	/// Inserts one feature. Fails in [`WriteMode::Update`].
	pub fn write(&mut self, feature: &Feature) -> Result<()> {
		ensure_valid!(
			self.mode == WriteMode::Append,
			"writer on '{}' is not in append mode",
			self.table_name
		);
		ensure_valid!(
			feature.values.len() == self.schema.attributes().len(),
			"feature has {} values but '{}' has {} attributes",
			feature.values.len(),
			self.table_name,
			self.schema.attributes().len()
		);
		self
			.conn
			.execute(&insert_sql(&self.table_name, &self.schema), params_from_iter(feature.values.iter().map(value_to_sql)))?;
		Ok(())
	}

	/// Sets one attribute on every row matching the filter. Fails in
	/// [`WriteMode::Append`].
	pub fn update_where(&mut self, filter: &Filter, attribute: &str, value: &Value) -> Result<usize> {
		ensure_valid!(
			self.mode == WriteMode::Update,
			"writer on '{}' is not in update mode",
			self.table_name
		);
		ensure_valid!(
			self.schema.attribute(attribute).is_some(),
			"'{}' has no attribute '{attribute}'",
			self.table_name
		);
		let Filter::Equals(name, expected) = filter;
		ensure_valid!(
			self.schema.attribute(name).is_some(),
			"filter references unknown attribute '{name}'"
		);
		let changed = self.conn.execute(
			&format!(
				"UPDATE {} SET {} = ?1 WHERE {} = ?2",
				quote_ident(&self.table_name),
				quote_ident(attribute),
				quote_ident(name)
			),
			params![value_to_sql(value), value_to_sql(expected)],
		)?;
		Ok(changed)
	}

	/// Deletes every row matching the filter. Fails in [`WriteMode::Append`].
	pub fn delete_where(&mut self, filter: &Filter) -> Result<usize> {
		ensure_valid!(
			self.mode == WriteMode::Update,
			"writer on '{}' is not in update mode",
			self.table_name
		);
		let Filter::Equals(name, expected) = filter;
		ensure_valid!(
			self.schema.attribute(name).is_some(),
			"filter references unknown attribute '{name}'"
		);
		let deleted = self.conn.execute(
			&format!(
				"DELETE FROM {} WHERE {} = ?1",
				quote_ident(&self.table_name),
				quote_ident(name)
			),
			params![value_to_sql(expected)],
		)?;
		Ok(deleted)
	}

	/// Commits the transaction and bumps the entry's `last_change`.
	pub fn finish(mut self) -> Result<()> {
		crate::container::GeoPackage::touch(&self.conn, &self.table_name)?;
		self.conn.execute_batch("COMMIT")?;
		self.open = false;
		Ok(())
	}
}

impl Drop for FeatureWriter {
	fn drop(&mut self) {
		if self.open {
			log::warn!("feature writer on '{}' dropped without finish, rolling back", self.table_name);
			if let Err(e) = self.conn.execute_batch("ROLLBACK") {
				log::warn!("rollback of '{}' failed: {e}", self.table_name);
			}
		}
	}
}

/// Paging iterator over the rows of a feature dataset.
pub struct FeatureReader {
	conn: PooledConnection<SqliteConnectionManager>,
	sql: String,
	filter_value: Option<SqlValue>,
	geometry_index: Option<usize>,
	last_rowid: i64,
	batch: VecDeque<Feature>,
	exhausted: bool,
}

impl FeatureReader {
	fn fetch_batch(&mut self) -> Result<()> {
		let mut statement = self.conn.prepare_cached(&self.sql)?;
		let rows = match &self.filter_value {
			Some(value) => statement.query(params![self.last_rowid, value]),
			None => statement.query(params![self.last_rowid]),
		};
		let mut rows = rows?;
		let mut fetched = 0usize;
		while let Some(row) = rows.next()? {
			self.last_rowid = row.get(0)?;
			let mut values = Vec::new();
			let mut index = 1;
			loop {
				let value = match row.get_ref(index) {
					Ok(value) => value,
					Err(r2d2_sqlite::rusqlite::Error::InvalidColumnIndex(_)) => break,
					Err(e) => return Err(e.into()),
				};
				values.push(sql_to_value(value, self.geometry_index == Some(index - 1)));
				index += 1;
			}
			self.batch.push_back(Feature::new(values));
			fetched += 1;
		}
		if fetched < READ_BATCH_SIZE {
			self.exhausted = true;
		}
		Ok(())
	}
}

impl Iterator for FeatureReader {
	type Item = Result<Feature>;

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

fn insert_sql(table_name: &str, schema: &Schema) -> String {
	let columns = schema
		.attributes()
		.iter()
		.map(|a| quote_ident(&a.name))
		.collect::<Vec<_>>()
		.join(", ");
	let placeholders = (1..=schema.attributes().len())
		.map(|i| format!("?{i}"))
		.collect::<Vec<_>>()
		.join(", ");
	format!("INSERT INTO {} ({columns}) VALUES ({placeholders})", quote_ident(table_name))
}

fn value_to_sql(value: &Value) -> SqlValue {
	match value {
		Value::Null => SqlValue::Null,
		Value::Integer(i) => SqlValue::Integer(*i),
		Value::Real(r) => SqlValue::Real(*r),
		Value::Text(t) => SqlValue::Text(t.clone()),
		Value::Blob(b) | Value::Geometry(b) => SqlValue::Blob(b.clone()),
	}
}

fn sql_to_value(value: ValueRef<'_>, is_geometry: bool) -> Value {
	match value {
		ValueRef::Null => Value::Null,
		ValueRef::Integer(i) => Value::Integer(i),
		ValueRef::Real(r) => Value::Real(r),
		ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
		ValueRef::Blob(b) if is_geometry => Value::Geometry(b.to_vec()),
		ValueRef::Blob(b) => Value::Blob(b.to_vec()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::container::GeoPackage;
	use geopkg_core::{Bounds, Crs, EpsgRegistry, GeometryType, MemoryFeatureSource};
	use tempfile::TempDir;

	fn open_new(dir: &TempDir) -> GeoPackage {
		let engine: Arc<dyn CrsEngine> = Arc::new(EpsgRegistry::new());
		GeoPackage::create(&dir.path().join("features.gpkg"), engine).unwrap()
	}

	fn roads_schema() -> Schema {
		Schema::new(
			"roads",
			vec![
				Attribute {
					name: String::from("name"),
					attr_type: AttributeType::Text,
				},
				Attribute {
					name: String::from("lanes"),
					attr_type: AttributeType::Integer,
				},
				Attribute {
					name: String::from("geom"),
					attr_type: AttributeType::Geometry(GeometryType::LineString, 2),
				},
			],
			Some(Crs::new(4326, "WGS 84")),
		)
		.unwrap()
	}

	fn road(name: &str, lanes: i64, wkb: Vec<u8>) -> Feature {
		Feature::new(vec![
			Value::Text(String::from(name)),
			Value::Integer(lanes),
			Value::Geometry(wkb),
		])
	}

	fn spec_with_bounds() -> FeatureEntrySpec {
		FeatureEntrySpec {
			bounds: Some(Bounds::new(-10.0, -10.0, 10.0, 10.0).unwrap()),
			..FeatureEntrySpec::default()
		}
	}

	#[test]
	fn create_derives_metadata_from_schema() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let entry = geopkg.feature_store().create(spec_with_bounds(), &roads_schema())?;

		assert_eq!(entry.table_name, "roads");
		assert_eq!(entry.srid, 4326);
		let meta = entry.feature_meta().unwrap();
		assert_eq!(meta.geometry_column, "geom");
		assert_eq!(meta.geometry_type, GeometryType::LineString);
		assert_eq!(meta.coord_dimension, 2);

		// round trip through the catalog
		let found = geopkg.find("roads")?.unwrap();
		assert_eq!(found.feature_meta(), entry.feature_meta());
		Ok(())
	}

	#[test]
	fn create_without_bounds_leaves_nothing_behind() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();

		let result = store.create(FeatureEntrySpec::default(), &roads_schema());
		assert!(matches!(result, Err(GeoPackageError::Validation(_))));
		assert_eq!(geopkg.contents()?.len(), 0);

		// the failed attempt must not block a corrected retry
		store.create(spec_with_bounds(), &roads_schema())?;
		assert_eq!(geopkg.contents()?.len(), 1);
		Ok(())
	}

	#[test]
	fn duplicate_table_name_is_a_validation_error() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();
		store.create(spec_with_bounds(), &roads_schema())?;

		let result = store.create(spec_with_bounds(), &roads_schema());
		assert!(matches!(result, Err(GeoPackageError::Validation(_))));
		assert_eq!(geopkg.contents()?.len(), 1);
		Ok(())
	}

	#[test]
	fn write_and_read_round_trip() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();
		let entry = store.create(spec_with_bounds(), &roads_schema())?;

		let mut writer = store.writer(&entry, WriteMode::Append)?;
		for i in 0..300i64 {
			writer.write(&road(&format!("road {i}"), i % 5, vec![i as u8, 1, 2]))?;
		}
		writer.finish()?;

		let features: Vec<Feature> = store.reader(&entry, None)?.collect::<Result<_>>()?;
		assert_eq!(features.len(), 300);
		assert_eq!(features[0].values[0], Value::Text(String::from("road 0")));
		assert_eq!(features[299].values[2], Value::Geometry(vec![43, 1, 2]));
		Ok(())
	}

	#[test]
	fn dropped_writer_rolls_back() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();
		let entry = store.create(spec_with_bounds(), &roads_schema())?;

		{
			let mut writer = store.writer(&entry, WriteMode::Append)?;
			writer.write(&road("lost", 1, vec![0]))?;
			// dropped without finish
		}
		assert_eq!(store.reader(&entry, None)?.count(), 0);
		Ok(())
	}

	#[test]
	fn update_and_delete_by_filter() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();
		let entry = store.create(spec_with_bounds(), &roads_schema())?;

		let mut writer = store.writer(&entry, WriteMode::Append)?;
		writer.write(&road("a", 2, vec![0]))?;
		writer.write(&road("b", 2, vec![1]))?;
		writer.write(&road("c", 4, vec![2]))?;
		writer.finish()?;

		let mut writer = store.writer(&entry, WriteMode::Update)?;
		let two_lanes = Filter::Equals(String::from("lanes"), Value::Integer(2));
		assert_eq!(writer.update_where(&two_lanes, "lanes", &Value::Integer(3))?, 2);
		assert_eq!(
			writer.delete_where(&Filter::Equals(String::from("name"), Value::Text(String::from("c"))))?,
			1
		);
		writer.finish()?;

		let remaining: Vec<Feature> = store.reader(&entry, None)?.collect::<Result<_>>()?;
		assert_eq!(remaining.len(), 2);
		assert!(remaining.iter().all(|f| f.values[1] == Value::Integer(3)));

		// append-mode calls are rejected on an update writer and vice versa
		let mut writer = store.writer(&entry, WriteMode::Append)?;
		assert!(writer.delete_where(&two_lanes).is_err());
		Ok(())
	}

	#[test]
	fn bulk_copy_from_source_with_filter() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let source = MemoryFeatureSource::new(
			roads_schema(),
			Some(Bounds::new(0.0, 0.0, 5.0, 5.0)?),
			vec![road("a", 2, vec![0]), road("b", 4, vec![1]), road("c", 2, vec![2])],
		)?;

		let filter = Filter::Equals(String::from("lanes"), Value::Integer(2));
		let entry = geopkg
			.feature_store()
			.add(FeatureEntrySpec::default(), &source, Some(&filter))?;

		assert!(entry.bounds.approx_eq(&Bounds::new(0.0, 0.0, 5.0, 5.0)?, 1e-9));
		let copied: Vec<Feature> = geopkg.feature_store().reader(&entry, None)?.collect::<Result<_>>()?;
		assert_eq!(copied.len(), 2);
		Ok(())
	}

	#[test]
	fn reader_filter_pushes_down() -> Result<()> {
		let dir = TempDir::new()?;
		let geopkg = open_new(&dir);
		let store = geopkg.feature_store();
		let entry = store.create(spec_with_bounds(), &roads_schema())?;

		let mut writer = store.writer(&entry, WriteMode::Append)?;
		writer.write(&road("a", 2, vec![0]))?;
		writer.write(&road("b", 4, vec![1]))?;
		writer.finish()?;

		let filter = Filter::Equals(String::from("lanes"), Value::Integer(4));
		let matched: Vec<Feature> = store.reader(&entry, Some(&filter))?.collect::<Result<_>>()?;
		assert_eq!(matched.len(), 1);
		assert_eq!(matched[0].values[0], Value::Text(String::from("b")));
		Ok(())
	}
}
