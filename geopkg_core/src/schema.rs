//! Narrow feature-type model consumed from the external schema engine.
//!
//! Only what the container needs crosses this seam: named, typed attributes,
//! at most one geometry-bearing attribute, and an optional reference system.
//! Geometry payloads stay opaque encoded bytes; the external geometry engine
//! owns their wire format.

use crate::{Bounds, Crs, GeoPackageError, GeometryType, Result, ensure_valid};

/// Type of a feature attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeType {
	Integer,
	Real,
	Text,
	Blob,
	/// A geometry column; carries the geometry type and coordinate
	/// dimension (2 or 3) reported by the schema engine.
	Geometry(GeometryType, u8),
}

impl AttributeType {
	/// SQL column type used when the backing table is created.
	pub fn sql_type(&self) -> &'static str {
		match self {
			AttributeType::Integer => "INTEGER",
			AttributeType::Real => "REAL",
			AttributeType::Text => "TEXT",
			AttributeType::Blob | AttributeType::Geometry(..) => "BLOB",
		}
	}

	pub fn is_geometry(&self) -> bool {
		matches!(self, AttributeType::Geometry(..))
	}
}

/// One named, typed attribute of a feature type.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
	pub name: String,
	pub attr_type: AttributeType,
}

/// A feature type: a name, ordered attributes, and an optional reference
/// system for its geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
	name: String,
	attributes: Vec<Attribute>,
	crs: Option<Crs>,
}

impl Schema {
	/// Builds a schema, rejecting duplicate attribute names and more than
	/// one geometry attribute.
	pub fn new(name: impl Into<String>, attributes: Vec<Attribute>, crs: Option<Crs>) -> Result<Schema> {
		let name = name.into();
		ensure_valid!(!name.is_empty(), "schema name must not be empty");
		ensure_valid!(!attributes.is_empty(), "schema '{name}' must have at least one attribute");

		for (i, a) in attributes.iter().enumerate() {
			ensure_valid!(
				!attributes[..i].iter().any(|b| b.name == a.name),
				"schema '{name}' has duplicate attribute '{}'",
				a.name
			);
		}
		let geometry_count = attributes.iter().filter(|a| a.attr_type.is_geometry()).count();
		ensure_valid!(
			geometry_count <= 1,
			"schema '{name}' has {geometry_count} geometry attributes, at most one is supported"
		);

		Ok(Schema { name, attributes, crs })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	pub fn crs(&self) -> Option<&Crs> {
		self.crs.as_ref()
	}

	pub fn attribute(&self, name: &str) -> Option<&Attribute> {
		self.attributes.iter().find(|a| a.name == name)
	}

	/// The first geometry-typed attribute, if the schema has one.
	pub fn geometry_attribute(&self) -> Option<&Attribute> {
		self.attributes.iter().find(|a| a.attr_type.is_geometry())
	}
}

/// A single attribute value, in schema order inside a [`Feature`].
///
/// Geometry values are the external engine's encoded bytes (e.g. WKB) and
/// round-trip through the store untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Null,
	Integer(i64),
	Real(f64),
	Text(String),
	Blob(Vec<u8>),
	Geometry(Vec<u8>),
}

/// One record of a feature dataset; values are positional, aligned with the
/// schema's attribute order.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
	pub values: Vec<Value>,
}

impl Feature {
	pub fn new(values: Vec<Value>) -> Feature {
		Feature { values }
	}

	/// Looks up a value by attribute name.
	pub fn value(&self, schema: &Schema, name: &str) -> Option<&Value> {
		let index = schema.attributes().iter().position(|a| a.name == name)?;
		self.values.get(index)
	}
}

/// Minimal structured predicate over feature attributes. The full filter
/// engine stays external; this covers the subset the copy operations need.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
	/// Matches rows whose named attribute equals the given value.
	Equals(String, Value),
}

impl Filter {
	/// Evaluates the predicate against one feature.
	pub fn matches(&self, schema: &Schema, feature: &Feature) -> bool {
		match self {
			Filter::Equals(name, expected) => feature.value(schema, name) == Some(expected),
		}
	}
}

/// A readable source of features, used by the bulk-copy operation.
pub trait FeatureSource {
	fn schema(&self) -> &Schema;

	/// Overall extent of the source, when known.
	fn bounds(&self) -> Option<Bounds>;

	/// Iterates all features matching the filter, in source order.
	fn features<'a>(&'a self, filter: Option<&'a Filter>) -> Box<dyn Iterator<Item = Result<Feature>> + 'a>;
}

/// In-memory [`FeatureSource`], mainly for tests and small imports.
pub struct MemoryFeatureSource {
	schema: Schema,
	bounds: Option<Bounds>,
	features: Vec<Feature>,
}

impl MemoryFeatureSource {
	pub fn new(schema: Schema, bounds: Option<Bounds>, features: Vec<Feature>) -> Result<MemoryFeatureSource> {
		for (i, f) in features.iter().enumerate() {
			if f.values.len() != schema.attributes().len() {
				return Err(GeoPackageError::validation(format!(
					"feature {i} has {} values but schema '{}' has {} attributes",
					f.values.len(),
					schema.name(),
					schema.attributes().len()
				)));
			}
		}
		Ok(MemoryFeatureSource {
			schema,
			bounds,
			features,
		})
	}
}

impl FeatureSource for MemoryFeatureSource {
	fn schema(&self) -> &Schema {
		&self.schema
	}

	fn bounds(&self) -> Option<Bounds> {
		self.bounds
	}

	fn features<'a>(&'a self, filter: Option<&'a Filter>) -> Box<dyn Iterator<Item = Result<Feature>> + 'a> {
		Box::new(
			self
				.features
				.iter()
				.filter(move |f| filter.is_none_or(|fl| fl.matches(&self.schema, f)))
				.map(|f| Ok(f.clone())),
		)
	}
}
