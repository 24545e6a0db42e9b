use crate::{Bounds, Crs, GeoPackageError, Result, TileMatrix};
use time::OffsetDateTime;

/// Kind discriminator stored in the `data_type` column of the content
/// catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
	Feature,
	Raster,
	Tile,
}

impl DataType {
	/// The stable string code persisted in the catalog.
	pub fn as_str(&self) -> &'static str {
		match self {
			DataType::Feature => "features",
			DataType::Raster => "rasters",
			DataType::Tile => "tiles",
		}
	}

	pub fn parse(value: &str) -> Result<DataType> {
		match value {
			"features" => Ok(DataType::Feature),
			"rasters" => Ok(DataType::Raster),
			"tiles" => Ok(DataType::Tile),
			_ => Err(GeoPackageError::validation(format!("unknown data type '{value}'"))),
		}
	}
}

/// Geometry type of a feature table's geometry column, as reported by the
/// external schema model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryType {
	Geometry,
	Point,
	LineString,
	Polygon,
	MultiPoint,
	MultiLineString,
	MultiPolygon,
	GeometryCollection,
}

impl GeometryType {
	pub fn as_str(&self) -> &'static str {
		match self {
			GeometryType::Geometry => "GEOMETRY",
			GeometryType::Point => "POINT",
			GeometryType::LineString => "LINESTRING",
			GeometryType::Polygon => "POLYGON",
			GeometryType::MultiPoint => "MULTIPOINT",
			GeometryType::MultiLineString => "MULTILINESTRING",
			GeometryType::MultiPolygon => "MULTIPOLYGON",
			GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
		}
	}

	pub fn parse(value: &str) -> Result<GeometryType> {
		match value.to_ascii_uppercase().as_str() {
			"GEOMETRY" => Ok(GeometryType::Geometry),
			"POINT" => Ok(GeometryType::Point),
			"LINESTRING" => Ok(GeometryType::LineString),
			"POLYGON" => Ok(GeometryType::Polygon),
			"MULTIPOINT" => Ok(GeometryType::MultiPoint),
			"MULTILINESTRING" => Ok(GeometryType::MultiLineString),
			"MULTIPOLYGON" => Ok(GeometryType::MultiPolygon),
			"GEOMETRYCOLLECTION" => Ok(GeometryType::GeometryCollection),
			_ => Err(GeoPackageError::validation(format!("unknown geometry type '{value}'"))),
		}
	}
}

/// Whether a stored raster is pinned to ground coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Georectification {
	Unrectified,
	Image,
	Geo,
}

impl Georectification {
	pub fn code(&self) -> i32 {
		match self {
			Georectification::Unrectified => 0,
			Georectification::Image => 1,
			Georectification::Geo => 2,
		}
	}

	pub fn from_code(code: i32) -> Result<Georectification> {
		match code {
			0 => Ok(Georectification::Unrectified),
			1 => Ok(Georectification::Image),
			2 => Ok(Georectification::Geo),
			_ => Err(GeoPackageError::validation(format!(
				"unknown georectification code {code}"
			))),
		}
	}
}

/// Metadata specific to a vector feature table.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMeta {
	pub geometry_column: String,
	pub geometry_type: GeometryType,
	pub coord_dimension: u8,
}

/// Metadata specific to a single-blob raster table.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterMeta {
	pub raster_column: String,
	pub compression_quality: f64,
	pub georectification: Georectification,
}

impl Default for RasterMeta {
	fn default() -> Self {
		RasterMeta {
			raster_column: String::from("raster"),
			compression_quality: 1.0,
			georectification: Georectification::Geo,
		}
	}
}

/// Metadata specific to a tiled raster pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMeta {
	pub times_two_zoom: bool,
	pub matrices: Vec<TileMatrix>,
}

/// The type-specific half of a catalog entry.
///
/// The original design modeled this as an inheritance hierarchy; here it is
/// a closed tagged union over one shared envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum DatasetKind {
	Feature(FeatureMeta),
	Raster(RasterMeta),
	Tile(TileMeta),
}

impl DatasetKind {
	pub fn data_type(&self) -> DataType {
		match self {
			DatasetKind::Feature(_) => DataType::Feature,
			DatasetKind::Raster(_) => DataType::Raster,
			DatasetKind::Tile(_) => DataType::Tile,
		}
	}
}

/// One fully-populated content catalog row plus its type-specific metadata.
///
/// An `Entry` never exists with unresolved bounds or srid; the dataset
/// managers validate before anything is written.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
	pub table_name: String,
	pub identifier: String,
	pub description: String,
	pub bounds: Bounds,
	pub srid: i32,
	pub crs: Crs,
	pub last_change: OffsetDateTime,
	pub kind: DatasetKind,
}

impl Entry {
	pub fn data_type(&self) -> DataType {
		self.kind.data_type()
	}

	/// The tile metadata, when this entry describes a pyramid.
	pub fn tile_meta(&self) -> Option<&TileMeta> {
		match &self.kind {
			DatasetKind::Tile(meta) => Some(meta),
			_ => None,
		}
	}

	/// The raster metadata, when this entry describes a raster blob table.
	pub fn raster_meta(&self) -> Option<&RasterMeta> {
		match &self.kind {
			DatasetKind::Raster(meta) => Some(meta),
			_ => None,
		}
	}

	/// The feature metadata, when this entry describes a feature table.
	pub fn feature_meta(&self) -> Option<&FeatureMeta> {
		match &self.kind {
			DatasetKind::Feature(meta) => Some(meta),
			_ => None,
		}
	}
}

/// Caller-supplied description of a feature dataset to create. Unset fields
/// are derived from the schema by the vector dataset manager.
#[derive(Clone, Debug, Default)]
pub struct FeatureEntrySpec {
	pub table_name: Option<String>,
	pub identifier: Option<String>,
	pub description: Option<String>,
	pub bounds: Option<Bounds>,
	pub srid: Option<i32>,
	pub geometry_column: Option<String>,
}

/// Caller-supplied description of a raster dataset to add. Unset fields are
/// derived from the raster image.
#[derive(Clone, Debug, Default)]
pub struct RasterEntrySpec {
	pub table_name: Option<String>,
	pub identifier: Option<String>,
	pub description: Option<String>,
	pub bounds: Option<Bounds>,
	pub srid: Option<i32>,
	pub raster_column: Option<String>,
}

/// Caller-supplied description of a tile pyramid to create. Bounds are
/// mandatory; everything else has documented defaults.
#[derive(Clone, Debug, Default)]
pub struct TileEntrySpec {
	pub table_name: Option<String>,
	pub identifier: Option<String>,
	pub description: Option<String>,
	pub bounds: Option<Bounds>,
	pub srid: Option<i32>,
	pub times_two_zoom: Option<bool>,
	pub matrices: Vec<TileMatrix>,
}
