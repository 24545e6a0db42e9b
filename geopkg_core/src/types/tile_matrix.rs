use crate::{GeoPackageError, Result, ensure_valid};

/// Per-zoom-level description of a tile grid: how many tiles the level has,
/// how big each tile is in pixels, and how much ground one pixel covers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMatrix {
	pub zoom_level: u8,
	pub matrix_width: u32,
	pub matrix_height: u32,
	pub tile_width: u32,
	pub tile_height: u32,
	pub pixel_x_size: f64,
	pub pixel_y_size: f64,
}

impl TileMatrix {
	pub fn new(
		zoom_level: u8,
		matrix_width: u32,
		matrix_height: u32,
		tile_width: u32,
		tile_height: u32,
		pixel_x_size: f64,
		pixel_y_size: f64,
	) -> Result<TileMatrix> {
		ensure_valid!(
			matrix_width > 0 && matrix_height > 0,
			"tile matrix at zoom {zoom_level} must have positive dimensions ({matrix_width}x{matrix_height})"
		);
		ensure_valid!(
			tile_width > 0 && tile_height > 0,
			"tile matrix at zoom {zoom_level} must have positive tile size ({tile_width}x{tile_height})"
		);
		ensure_valid!(
			pixel_x_size > 0.0 && pixel_y_size > 0.0,
			"tile matrix at zoom {zoom_level} must have positive pixel sizes"
		);
		Ok(TileMatrix {
			zoom_level,
			matrix_width,
			matrix_height,
			tile_width,
			tile_height,
			pixel_x_size,
			pixel_y_size,
		})
	}
}

/// Checks the cross-row invariant of a matrix set: strictly increasing zoom
/// levels, strictly decreasing pixel sizes, and one tile size across the
/// whole pyramid.
///
/// A set that violates this ordering is unusable for zoom resolution, so
/// consumers reject it outright instead of warning.
pub fn validate_matrix_set(matrices: &[TileMatrix]) -> Result<()> {
	ensure_valid!(!matrices.is_empty(), "tile entry must have at least one tile matrix");

	for pair in matrices.windows(2) {
		let (a, b) = (&pair[0], &pair[1]);
		ensure_valid!(
			b.zoom_level > a.zoom_level,
			"tile matrix zoom levels must be strictly increasing, got {} after {}",
			b.zoom_level,
			a.zoom_level
		);
		ensure_valid!(
			b.pixel_x_size < a.pixel_x_size && b.pixel_y_size < a.pixel_y_size,
			"tile matrix pixel sizes must strictly decrease with zoom, violated at zoom {}",
			b.zoom_level
		);
		ensure_valid!(
			b.tile_width == a.tile_width && b.tile_height == a.tile_height,
			"tile size must be constant across the pyramid, changed at zoom {}",
			b.zoom_level
		);
	}
	Ok(())
}

/// Finds the matrix for a zoom level in an ordered set.
pub fn matrix_for_zoom(matrices: &[TileMatrix], zoom: u8) -> Result<&TileMatrix> {
	matrices
		.iter()
		.find(|m| m.zoom_level == zoom)
		.ok_or_else(|| GeoPackageError::validation(format!("no tile matrix for zoom level {zoom}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn matrix(zoom: u8, size: u32, pixel: f64) -> TileMatrix {
		TileMatrix::new(zoom, size, size, 256, 256, pixel, pixel).unwrap()
	}

	#[test]
	fn valid_quad_tree_set() {
		let set = [matrix(0, 1, 1.0), matrix(1, 2, 0.5), matrix(2, 4, 0.25)];
		validate_matrix_set(&set).unwrap();
		assert_eq!(matrix_for_zoom(&set, 1).unwrap().matrix_width, 2);
		assert!(matrix_for_zoom(&set, 9).is_err());
	}

	#[test]
	fn rejects_unordered_zooms() {
		let set = [matrix(1, 2, 0.5), matrix(0, 1, 1.0)];
		assert!(validate_matrix_set(&set).is_err());
	}

	#[test]
	fn rejects_non_decreasing_pixel_size() {
		let set = [matrix(0, 1, 1.0), matrix(1, 2, 1.0)];
		assert!(validate_matrix_set(&set).is_err());
	}

	#[test]
	fn rejects_empty_set_and_bad_dimensions() {
		assert!(validate_matrix_set(&[]).is_err());
		assert!(TileMatrix::new(0, 0, 1, 256, 256, 1.0, 1.0).is_err());
		assert!(TileMatrix::new(0, 1, 1, 256, 256, 0.0, 1.0).is_err());
	}

	#[test]
	fn rejects_changing_tile_size() {
		let a = matrix(0, 1, 1.0);
		let b = TileMatrix::new(1, 2, 2, 512, 512, 0.5, 0.5).unwrap();
		assert!(validate_matrix_set(&[a, b]).is_err());
	}
}
