//! Narrow interface to the external coordinate-reference-system engine.
//!
//! The container never interprets coordinates itself; it only records which
//! reference system a dataset lives in. Everything beyond the srid/handle
//! mapping (WKT parsing, transforms) stays in the external geometry engine.

use crate::{GeoPackageError, Result};
use std::collections::BTreeMap;

/// Lightweight handle for a resolved coordinate reference system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crs {
	pub srid: i32,
	pub name: String,
}

impl Crs {
	pub fn new(srid: i32, name: impl Into<String>) -> Crs {
		Crs {
			srid,
			name: name.into(),
		}
	}
}

/// The part of the geometry engine the container depends on.
///
/// `decode` must fail for unknown srids; catalog hydration turns that
/// failure into a validation error instead of silently dropping it.
pub trait CrsEngine: Send + Sync {
	/// Returns the srid for a reference-system handle, if one is known.
	fn resolve_srid(&self, crs: &Crs) -> Option<i32>;

	/// Resolves an srid back to a reference-system handle.
	fn decode(&self, srid: i32) -> Result<Crs>;
}

/// Registry-backed [`CrsEngine`] seeded with the EPSG codes the default
/// tiling grids use. Real deployments plug in a full engine instead.
#[derive(Debug, Clone)]
pub struct EpsgRegistry {
	codes: BTreeMap<i32, String>,
}

impl EpsgRegistry {
	pub fn new() -> EpsgRegistry {
		let mut codes = BTreeMap::new();
		codes.insert(4326, String::from("WGS 84"));
		codes.insert(3857, String::from("WGS 84 / Pseudo-Mercator"));
		codes.insert(900913, String::from("Google Maps Global Mercator"));
		EpsgRegistry { codes }
	}

	/// Registers an additional srid, replacing any previous name.
	pub fn register(&mut self, srid: i32, name: impl Into<String>) {
		self.codes.insert(srid, name.into());
	}
}

impl Default for EpsgRegistry {
	fn default() -> Self {
		EpsgRegistry::new()
	}
}

impl CrsEngine for EpsgRegistry {
	fn resolve_srid(&self, crs: &Crs) -> Option<i32> {
		self.codes.contains_key(&crs.srid).then_some(crs.srid)
	}

	fn decode(&self, srid: i32) -> Result<Crs> {
		self
			.codes
			.get(&srid)
			.map(|name| Crs::new(srid, name))
			.ok_or_else(|| GeoPackageError::validation(format!("srid {srid} can not be resolved to a reference system")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decode_known_and_unknown() {
		let engine = EpsgRegistry::new();
		assert_eq!(engine.decode(4326).unwrap().name, "WGS 84");
		assert!(engine.decode(999999).is_err());
	}

	#[test]
	fn register_custom_code() {
		let mut engine = EpsgRegistry::new();
		engine.register(31370, "Belge 1972 / Belgian Lambert 72");
		assert_eq!(engine.resolve_srid(&Crs::new(31370, "")), Some(31370));
	}
}
