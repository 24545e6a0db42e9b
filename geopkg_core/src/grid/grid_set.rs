use crate::{Bounds, GeoPackageError, Result, ensure_valid};

/// One resolution level of a tiling grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLevel {
	pub scale_denominator: f64,
	/// Ground units covered by one pixel at this level.
	pub pixel_size: f64,
	pub matrix_width: u32,
	pub matrix_height: u32,
}

/// A multi-resolution tiling grid: a CRS-bound extent divided into tile
/// matrices of increasing resolution.
///
/// Rows are indexed from the bottom edge of the extent (southern origin);
/// consumers that need a top-origin row index flip it per level.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSet {
	pub name: String,
	pub srid: i32,
	pub extent: Bounds,
	pub tile_width: u32,
	pub tile_height: u32,
	/// Conversion factor from the grid's CRS units to meters, used for
	/// scale-denominator math.
	pub meters_per_unit: f64,
	pub levels: Vec<GridLevel>,
}

/// OGC standardized rendering pixel size: 0.28 mm.
pub const OGC_PIXEL_SIZE_M: f64 = 0.000_28;

impl GridSet {
	/// Builds a times-two-zoom (quad tree) grid: every level doubles the
	/// tile counts and halves the pixel size.
	///
	/// `top_width` and `top_height` are the matrix dimensions of level 0
	/// (1x1 for square extents, 2x1 for the world in plate carree).
	pub fn quad_tree(
		name: impl Into<String>,
		srid: i32,
		extent: Bounds,
		tile_size: u32,
		meters_per_unit: f64,
		top_width: u32,
		top_height: u32,
		num_levels: u8,
	) -> Result<GridSet> {
		let name = name.into();
		ensure_valid!(tile_size > 0, "grid '{name}' must have a positive tile size");
		ensure_valid!(
			top_width > 0 && top_height > 0,
			"grid '{name}' must have a positive top-level matrix"
		);
		ensure_valid!(num_levels > 0, "grid '{name}' must have at least one level");
		ensure_valid!(
			meters_per_unit > 0.0,
			"grid '{name}' must have a positive meters-per-unit factor"
		);

		let mut levels = Vec::with_capacity(num_levels as usize);
		for z in 0..num_levels {
			let factor = 2u32.pow(u32::from(z));
			let matrix_width = top_width * factor;
			let matrix_height = top_height * factor;
			let pixel_size = extent.width() / f64::from(matrix_width) / f64::from(tile_size);
			levels.push(GridLevel {
				scale_denominator: pixel_size * meters_per_unit / OGC_PIXEL_SIZE_M,
				pixel_size,
				matrix_width,
				matrix_height,
			});
		}

		Ok(GridSet {
			name,
			srid,
			extent,
			tile_width: tile_size,
			tile_height: tile_size,
			meters_per_unit,
			levels,
		})
	}

	/// The global geographic grid (EPSG:4326, 2x1 top level).
	pub fn global_geodetic(num_levels: u8) -> GridSet {
		GridSet::quad_tree(
			"EPSG:4326",
			4326,
			Bounds::new(-180.0, -90.0, 180.0, 90.0).expect("static extent"),
			256,
			// one degree of longitude at the equator
			111_319.490_793_273_58,
			2,
			1,
			num_levels,
		)
		.expect("static grid")
	}

	/// The global Web-Mercator grid (EPSG:3857, 1x1 top level).
	pub fn global_mercator(num_levels: u8) -> GridSet {
		let e = 20_037_508.342_789_244;
		GridSet::quad_tree(
			"EPSG:3857",
			3857,
			Bounds::new(-e, -e, e, e).expect("static extent"),
			256,
			1.0,
			1,
			1,
			num_levels,
		)
		.expect("static grid")
	}

	pub fn num_levels(&self) -> u8 {
		self.levels.len() as u8
	}

	pub fn level(&self, zoom: u8) -> Result<&GridLevel> {
		self
			.levels
			.get(zoom as usize)
			.ok_or_else(|| GeoPackageError::configuration(format!("grid '{}' has no zoom level {zoom}", self.name)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quad_tree_doubles_and_halves() {
		let grid = GridSet::global_mercator(4);
		assert_eq!(grid.num_levels(), 4);
		for z in 1..4u8 {
			let prev = grid.level(z - 1).unwrap();
			let level = grid.level(z).unwrap();
			assert_eq!(level.matrix_width, prev.matrix_width * 2);
			assert!((level.pixel_size - prev.pixel_size / 2.0).abs() < 1e-9);
		}
	}

	#[test]
	fn geodetic_top_level_is_two_by_one() {
		let grid = GridSet::global_geodetic(2);
		let top = grid.level(0).unwrap();
		assert_eq!((top.matrix_width, top.matrix_height), (2, 1));
		// 360 degrees over 2 tiles of 256 pixels
		assert!((top.pixel_size - 360.0 / 512.0).abs() < 1e-12);
	}

	#[test]
	fn missing_level_is_a_configuration_error() {
		let grid = GridSet::global_mercator(2);
		assert!(matches!(
			grid.level(5),
			Err(GeoPackageError::Configuration(_))
		));
	}

	#[test]
	fn rejects_degenerate_parameters() {
		let extent = Bounds::new(0.0, 0.0, 1.0, 1.0).unwrap();
		assert!(GridSet::quad_tree("g", 0, extent, 0, 1.0, 1, 1, 1).is_err());
		assert!(GridSet::quad_tree("g", 0, extent, 256, 1.0, 0, 1, 1).is_err());
		assert!(GridSet::quad_tree("g", 0, extent, 256, 1.0, 1, 1, 0).is_err());
	}
}
