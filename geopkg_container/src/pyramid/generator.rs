//! Tile pyramid generation: renders a source map into a tile-pyramid
//! container, one zoom level at a time.

use crate::{
	container::GeoPackage,
	pyramid::{PyramidArtifact, PyramidOptions},
};
use geopkg_core::{
	CrsEngine, GeoPackageError, GridCriteria, GridProvider, GridSubset, MapRequest, RenderRequest, Result, Tile,
	TileEntrySpec, TileRenderer,
};
use std::{path::Path, sync::Arc};

/// Ceiling for the cumulative tile count when the top zoom level is
/// auto-resolved.
const AUTO_ZOOM_TILE_CEILING: u64 = 256;

/// Worst-case decoded size of one pixel (RGBA).
const BYTES_PER_PIXEL: usize = 4;

/// Renders tile pyramids into new container files.
///
/// The generator is synchronous: [`generate`] blocks the calling thread
/// until every tile is rendered and stored, and any single render failure
/// aborts the run. A partially written destination file is the caller's to
/// discard.
///
/// [`generate`]: PyramidGenerator::generate
pub struct PyramidGenerator<R: TileRenderer> {
	renderer: R,
	grids: Arc<dyn GridProvider>,
	crs_engine: Arc<dyn CrsEngine>,
	options: PyramidOptions,
}

impl<R: TileRenderer> PyramidGenerator<R> {
	pub fn new(renderer: R, grids: Arc<dyn GridProvider>, crs_engine: Arc<dyn CrsEngine>, options: PyramidOptions) -> PyramidGenerator<R> {
		PyramidGenerator {
			renderer,
			grids,
			crs_engine,
			options,
		}
	}

	/// Generates the pyramid for `request` into a new container at `path`
	/// and hands the finished file back as a streamable artifact.
	pub fn generate(&self, request: &MapRequest, path: &Path) -> Result<PyramidArtifact> {
		let subset = self.grids.resolve(&GridCriteria {
			grid_name: self.options.grid_name.clone(),
			srid: Some(request.crs.srid),
			layers: request.layers.clone(),
		})?;
		let (min_zoom, max_zoom) = self.resolve_zoom_range(&subset, request)?;
		let crs = self.crs_engine.decode(subset.srid())?;
		log::debug!(
			"generating pyramid for '{}' on grid '{}', zoom {min_zoom}..={max_zoom}",
			request.title,
			subset.name()
		);

		let geopkg = GeoPackage::create(path, Arc::clone(&self.crs_engine))?;
		let entry = geopkg.create_tiles(TileEntrySpec {
			table_name: self.options.table_name.clone(),
			identifier: Some(request.title.clone()),
			bounds: Some(request.bounds),
			srid: Some(subset.srid()),
			matrices: subset.matrices(min_zoom, max_zoom)?,
			..TileEntrySpec::default()
		})?;

		let tiles_between_cleanups = self.tiles_between_cleanups(&subset);
		let mut rendered = 0u64;
		for zoom in min_zoom..=max_zoom {
			let Some(rect) = subset.coverage_intersection(zoom, &request.bounds)? else {
				continue;
			};
			let tiles_high = subset.tiles_high(zoom)?;
			log::debug!("zoom {zoom}: {} tiles", rect.count());

			for (column, row) in rect.iter() {
				let data = self.renderer.render(&RenderRequest {
					bounds: subset.tile_bounds(zoom, column, row)?,
					width: subset.tile_width(),
					height: subset.tile_height(),
					crs: crs.clone(),
					format: self.options.format,
				})?;

				let stored_row = if self.options.flip_y { tiles_high - 1 - row } else { row };
				geopkg.add_tile(&entry, &Tile::new(zoom, column, stored_row, data))?;

				rendered += 1;
				if rendered % tiles_between_cleanups == 0 {
					self.renderer.reclaim();
				}
			}
		}
		log::debug!("pyramid '{}' finished, {rendered} tiles", request.title);

		geopkg.close();
		Ok(PyramidArtifact::new(path.to_path_buf()))
	}

	/// Resolves the effective zoom range per the configured options and the
	/// request scale. An inverted explicit range or a min zoom beyond the
	/// grid depth is a configuration error; a max zoom beyond the grid depth
	/// is clamped with a warning.
	fn resolve_zoom_range(&self, subset: &GridSubset, request: &MapRequest) -> Result<(u8, u8)> {
		let deepest = subset.num_levels() - 1;
		let min_zoom = match self.options.min_zoom {
			Some(zoom) => zoom,
			None => find_closest_zoom(subset, request.scale_denominator(subset.grid_set().meters_per_unit)),
		};
		if min_zoom > deepest {
			return Err(GeoPackageError::configuration(format!(
				"min zoom {min_zoom} exceeds grid '{}' depth {deepest}",
				subset.name()
			)));
		}

		let mut max_zoom = match (self.options.max_zoom, self.options.num_zooms) {
			(Some(zoom), _) => zoom,
			(None, Some(num)) => min_zoom.saturating_add(num),
			(None, None) => find_max_zoom_auto(subset, min_zoom, request)?,
		};
		if max_zoom < min_zoom {
			return Err(GeoPackageError::configuration(format!(
				"max zoom {max_zoom} is below min zoom {min_zoom}"
			)));
		}
		if max_zoom > deepest {
			log::warn!("max zoom {max_zoom} exceeds grid '{}' depth, clamping to {deepest}", subset.name());
			max_zoom = deepest;
		}
		Ok((min_zoom, max_zoom))
	}

	/// How many tiles to render between renderer reclamation calls: a
	/// quarter of the memory budget divided by the worst-case decoded tile
	/// size, at least one.
	fn tiles_between_cleanups(&self, subset: &GridSubset) -> u64 {
		let tile_bytes = subset.tile_width() as usize * subset.tile_height() as usize * BYTES_PER_PIXEL;
		((self.options.memory_budget / 4) / tile_bytes).max(1) as u64
	}
}

/// The zoom level whose nominal scale is closest to `target_scale`.
///
/// The scan is greedy: levels are ordered coarse to fine, so the error
/// shrinks monotonically until the closest level is passed; the scan stops
/// at the first level whose error grows again. An exact tie goes to the
/// finer level.
fn find_closest_zoom(subset: &GridSubset, target_scale: f64) -> u8 {
	let levels = &subset.grid_set().levels;
	let mut best = 0u8;
	let mut best_error = (levels[0].scale_denominator - target_scale).abs();
	for (zoom, level) in levels.iter().enumerate().skip(1) {
		let error = (level.scale_denominator - target_scale).abs();
		if error > best_error {
			break;
		}
		best = zoom as u8;
		best_error = error;
	}
	best
}

/// Walks zoom levels upward from `min_zoom` while the cumulative tile count
/// over the request bounds stays within [`AUTO_ZOOM_TILE_CEILING`]. Returns
/// the deepest level that does not push the cumulative count over the
/// ceiling, or the grid's last level when the ceiling is never reached.
fn find_max_zoom_auto(subset: &GridSubset, min_zoom: u8, request: &MapRequest) -> Result<u8> {
	let mut cumulative = 0u64;
	let mut max_zoom = min_zoom;
	for zoom in min_zoom..subset.num_levels() {
		let count = subset
			.coverage_intersection(zoom, &request.bounds)?
			.map_or(0, |rect| rect.count());
		cumulative += count;
		if zoom > min_zoom && cumulative > AUTO_ZOOM_TILE_CEILING {
			break;
		}
		max_zoom = zoom;
	}
	Ok(max_zoom)
}

#[cfg(test)]
mod tests {
	use super::*;
	use geopkg_core::{Bounds, Crs, DataType, EpsgRegistry, GridRegistry, GridSet};
	use std::sync::atomic::{AtomicU64, Ordering};
	use tempfile::TempDir;

	/// Renderer that returns a marker payload and counts calls.
	#[derive(Default)]
	struct CountingRenderer {
		rendered: AtomicU64,
		reclaimed: AtomicU64,
		fail_after: Option<u64>,
	}

	impl TileRenderer for CountingRenderer {
		fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
			let n = self.rendered.fetch_add(1, Ordering::SeqCst);
			if self.fail_after.is_some_and(|limit| n >= limit) {
				return Err(GeoPackageError::render(std::io::Error::other("render backend down")));
			}
			Ok(format!("{:?}", request.bounds).into_bytes())
		}

		fn reclaim(&self) {
			self.reclaimed.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn generator(options: PyramidOptions) -> PyramidGenerator<CountingRenderer> {
		PyramidGenerator::new(
			CountingRenderer::default(),
			Arc::new(GridRegistry::default()),
			Arc::new(EpsgRegistry::new()),
			options,
		)
	}

	fn world_request() -> MapRequest {
		let e = 20_037_508.342_789_244;
		MapRequest {
			title: String::from("world"),
			layers: vec![],
			bounds: Bounds::new(-e, -e, e, e).unwrap(),
			crs: Crs::new(3857, "WGS 84 / Pseudo-Mercator"),
			width: 256,
			height: 256,
		}
	}

	#[test]
	fn closest_zoom_prefers_smallest_absolute_error() {
		let _ = env_logger::builder().is_test(true).try_init();
		let mut subset = GridSet::global_mercator(4);
		subset.levels[0].scale_denominator = 100_000.0;
		subset.levels[1].scale_denominator = 50_000.0;
		subset.levels[2].scale_denominator = 25_000.0;
		subset.levels[3].scale_denominator = 12_500.0;
		let subset = GridSubset::covering(subset);

		// 48000 is closer to 50000 than to 25000
		assert_eq!(find_closest_zoom(&subset, 48_000.0), 1);
		assert_eq!(find_closest_zoom(&subset, 1_000_000.0), 0);
		assert_eq!(find_closest_zoom(&subset, 1.0), 3);
		// exactly between 50000 and 25000: the finer level wins
		assert_eq!(find_closest_zoom(&subset, 37_500.0), 2);
	}

	#[test]
	fn auto_max_zoom_respects_cumulative_ceiling() -> Result<()> {
		let subset = GridSubset::covering(GridSet::global_mercator(12));
		let request = world_request();

		let max_zoom = find_max_zoom_auto(&subset, 0, &request)?;
		let mut cumulative = 0u64;
		for zoom in 0..=max_zoom {
			cumulative += subset.coverage_intersection(zoom, &request.bounds)?.unwrap().count();
		}
		assert!(cumulative <= AUTO_ZOOM_TILE_CEILING);

		// the next level would have pushed it over
		let next = subset.coverage_intersection(max_zoom + 1, &request.bounds)?.unwrap().count();
		assert!(cumulative + next > AUTO_ZOOM_TILE_CEILING);
		Ok(())
	}

	#[test]
	fn auto_max_zoom_stops_at_grid_depth() -> Result<()> {
		let subset = GridSubset::covering(GridSet::global_mercator(3));
		// 1 + 4 + 16 tiles never reach the ceiling
		assert_eq!(find_max_zoom_auto(&subset, 0, &world_request())?, 2);
		Ok(())
	}

	#[test]
	fn inverted_range_is_a_configuration_error() {
		let generator = generator(PyramidOptions {
			min_zoom: Some(5),
			max_zoom: Some(2),
			..PyramidOptions::default()
		});
		let dir = TempDir::new().unwrap();
		let result = generator.generate(&world_request(), &dir.path().join("bad.gpkg"));
		assert!(matches!(result, Err(GeoPackageError::Configuration(_))));
	}

	#[test]
	fn min_zoom_beyond_grid_depth_is_a_configuration_error() {
		let generator = generator(PyramidOptions {
			min_zoom: Some(99),
			max_zoom: Some(99),
			..PyramidOptions::default()
		});
		let dir = TempDir::new().unwrap();
		let result = generator.generate(&world_request(), &dir.path().join("deep.gpkg"));
		assert!(matches!(result, Err(GeoPackageError::Configuration(_))));
	}

	#[test]
	fn end_to_end_quad_tree_counts() -> Result<()> {
		let _ = env_logger::builder().is_test(true).try_init();
		let dir = TempDir::new()?;
		let path = dir.path().join("world.gpkg");
		let generator = generator(PyramidOptions {
			min_zoom: Some(0),
			num_zooms: Some(2),
			..PyramidOptions::default()
		});

		let artifact = generator.generate(&world_request(), &path)?;
		assert_eq!(artifact.path(), path);

		let geopkg = GeoPackage::open(&path, Arc::new(EpsgRegistry::new()))?;
		let tile_entries = geopkg.list(DataType::Tile)?;
		assert_eq!(geopkg.contents()?.len(), 1);
		assert_eq!(tile_entries.len(), 1);

		let entry = &tile_entries[0];
		assert_eq!(entry.identifier, "world");
		assert_eq!(entry.tile_meta().unwrap().matrices.len(), 3);
		for (zoom, expected) in [(0u8, 1usize), (1, 4), (2, 16)] {
			let count = geopkg
				.tile_reader(entry, crate::container::TileQuery::at_zoom(zoom))?
				.count();
			assert_eq!(count, expected, "zoom {zoom}");
		}
		Ok(())
	}

	#[test]
	fn flip_y_inverts_row_indices() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("flipped.gpkg");
		let generator = generator(PyramidOptions {
			min_zoom: Some(1),
			max_zoom: Some(1),
			flip_y: true,
			..PyramidOptions::default()
		});

		// southern half of the world: grid rows 0, flipped to row 1
		let e = 20_037_508.342_789_244;
		let request = MapRequest {
			bounds: Bounds::new(-e, -e, e, -1.0)?,
			..world_request()
		};
		generator.generate(&request, &path)?;

		let geopkg = GeoPackage::open(&path, Arc::new(EpsgRegistry::new()))?;
		let entry = geopkg.list(DataType::Tile)?.remove(0);
		let rows: Vec<u32> = geopkg
			.tile_reader(&entry, crate::container::TileQuery::default())?
			.map(|t| t.map(|t| t.row))
			.collect::<Result<_>>()?;
		assert_eq!(rows, vec![1, 1]);
		Ok(())
	}

	#[test]
	fn render_failure_aborts_the_run() {
		let dir = TempDir::new().unwrap();
		let generator = PyramidGenerator::new(
			CountingRenderer {
				fail_after: Some(3),
				..CountingRenderer::default()
			},
			Arc::new(GridRegistry::default()),
			Arc::new(EpsgRegistry::new()),
			PyramidOptions {
				min_zoom: Some(2),
				max_zoom: Some(2),
				..PyramidOptions::default()
			},
		);

		let result = generator.generate(&world_request(), &dir.path().join("aborted.gpkg"));
		assert!(matches!(result, Err(GeoPackageError::Render(_))));
	}

	#[test]
	fn reclamation_runs_on_the_configured_interval() -> Result<()> {
		let dir = TempDir::new()?;
		// budget of 4 MiB -> 1 MiB / 256 KiB = 4 tiles between cleanups
		let generator = generator(PyramidOptions {
			min_zoom: Some(0),
			max_zoom: Some(2),
			memory_budget: 4 * 1024 * 1024,
			..PyramidOptions::default()
		});
		generator.generate(&world_request(), &dir.path().join("cleanup.gpkg"))?;

		// 21 tiles at interval 4 -> 5 reclamation calls
		assert_eq!(generator.renderer.reclaimed.load(Ordering::SeqCst), 5);
		Ok(())
	}

}
