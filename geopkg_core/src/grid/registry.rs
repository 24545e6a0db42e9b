use super::{GridSet, GridSubset};
use crate::{GeoPackageError, Result};
use std::collections::BTreeMap;

/// What the caller knows about the grid a pyramid should use.
///
/// Resolution preference: explicit `grid_name`, then a grid whose reference
/// system matches `srid`, then a grid every named layer is associated with.
#[derive(Clone, Debug, Default)]
pub struct GridCriteria {
	pub grid_name: Option<String>,
	pub srid: Option<i32>,
	pub layers: Vec<String>,
}

/// Resolves a [`GridSubset`] for pyramid generation.
pub trait GridProvider: Send + Sync {
	fn resolve(&self, criteria: &GridCriteria) -> Result<GridSubset>;
}

/// Named grid sets plus per-layer grid associations.
///
/// The default registry is seeded with the global geodetic and Web-Mercator
/// quad-tree grids (20 levels each).
#[derive(Clone, Debug)]
pub struct GridRegistry {
	grids: BTreeMap<String, GridSet>,
	layer_grids: BTreeMap<String, Vec<String>>,
}

impl GridRegistry {
	pub fn empty() -> GridRegistry {
		GridRegistry {
			grids: BTreeMap::new(),
			layer_grids: BTreeMap::new(),
		}
	}

	pub fn add(&mut self, grid: GridSet) {
		self.grids.insert(grid.name.clone(), grid);
	}

	pub fn get(&self, name: &str) -> Option<&GridSet> {
		self.grids.get(name)
	}

	pub fn find_by_srid(&self, srid: i32) -> Option<&GridSet> {
		self.grids.values().find(|g| g.srid == srid)
	}

	/// Declares that a layer can be tiled with the named grid.
	pub fn associate_layer(&mut self, layer: impl Into<String>, grid_name: impl Into<String>) {
		self
			.layer_grids
			.entry(layer.into())
			.or_default()
			.push(grid_name.into());
	}

	fn grids_for_layer(&self, layer: &str) -> &[String] {
		self.layer_grids.get(layer).map_or(&[], Vec::as_slice)
	}
}

impl Default for GridRegistry {
	fn default() -> Self {
		let mut registry = GridRegistry::empty();
		registry.add(GridSet::global_geodetic(20));
		registry.add(GridSet::global_mercator(20));
		registry
	}
}

impl GridProvider for GridRegistry {
	fn resolve(&self, criteria: &GridCriteria) -> Result<GridSubset> {
		// 1. explicit grid name
		if let Some(name) = &criteria.grid_name {
			return self
				.get(name)
				.map(|g| GridSubset::covering(g.clone()))
				.ok_or_else(|| GeoPackageError::configuration(format!("no grid set named '{name}'")));
		}

		// 2. grid matching the map's reference system
		if let Some(srid) = criteria.srid {
			if let Some(grid) = self.find_by_srid(srid) {
				return Ok(GridSubset::covering(grid.clone()));
			}
		}

		// 3. grid every requested layer is associated with
		let mut candidates: Vec<&String> = Vec::new();
		for (i, layer) in criteria.layers.iter().enumerate() {
			let layer_grids = self.grids_for_layer(layer);
			if i == 0 {
				candidates = layer_grids.iter().collect();
			} else {
				candidates.retain(|name| layer_grids.contains(name));
			}
			if candidates.is_empty() {
				break;
			}
		}

		if candidates.len() > 1 {
			log::warn!(
				"found multiple grid subsets ({}), choosing first",
				candidates
					.iter()
					.map(|s| s.as_str())
					.collect::<Vec<_>>()
					.join(", ")
			);
		}

		candidates
			.first()
			.and_then(|name| self.get(name))
			.map(|g| GridSubset::covering(g.clone()))
			.ok_or_else(|| {
				GeoPackageError::configuration(format!(
					"no grid subset matches the request (srid {:?}, layers {:?})",
					criteria.srid, criteria.layers
				))
			})
	}
}
